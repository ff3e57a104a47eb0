/// Term dictionary: string to term-id map with first-seen, monotonically
/// assigned ids. Ids are dense in [0, term_count) and permanent; there is
/// no deletion.
///
/// File format (dictionary):
/// [term_count: u32]
/// then per term, in id order: [len: u16][utf-8 bytes]

use crate::pool::{read_u32, write_u32};
use rustc_hash::FxHashMap;
use std::io::{self, Read, Write};

pub struct Dictionary {
    map: FxHashMap<String, u32>,
    terms: Vec<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            terms: Vec::new(),
        }
    }

    /// Return the id for `term`, assigning the next free id on first sight.
    pub fn intern(&mut self, term: &str) -> u32 {
        if let Some(&id) = self.map.get(term) {
            return id;
        }
        let id = self.terms.len() as u32;
        self.map.insert(term.to_string(), id);
        self.terms.push(term.to_string());
        id
    }

    pub fn lookup(&self, term: &str) -> Option<u32> {
        self.map.get(term).copied()
    }

    pub fn term(&self, id: u32) -> &str {
        &self.terms[id as usize]
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, self.terms.len() as u32)?;
        for term in &self.terms {
            let bytes = term.as_bytes();
            w.write_all(&(bytes.len() as u16).to_le_bytes())?;
            w.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Dictionary> {
        let count = read_u32(r)? as usize;
        let mut dict = Dictionary::new();
        for _ in 0..count {
            let mut len_buf = [0u8; 2];
            r.read_exact(&mut len_buf)?;
            let len = u16::from_le_bytes(len_buf) as usize;
            let mut bytes = vec![0u8; len];
            r.read_exact(&mut bytes)?;
            let term = String::from_utf8(bytes).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("bad term in dictionary: {}", e))
            })?;
            dict.intern(&term);
        }
        Ok(dict)
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_first_seen_monotonic_ids() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.intern("zebra"), 0);
        assert_eq!(dict.intern("apple"), 1);
        assert_eq!(dict.intern("zebra"), 0);
        assert_eq!(dict.intern("mango"), 2);
        assert_eq!(dict.term_count(), 3);
        assert_eq!(dict.term(0), "zebra");
        assert_eq!(dict.term(2), "mango");
    }

    #[test]
    fn test_lookup() {
        let mut dict = Dictionary::new();
        dict.intern("hello");
        assert_eq!(dict.lookup("hello"), Some(0));
        assert_eq!(dict.lookup("missing"), None);
    }

    #[test]
    fn test_roundtrip_preserves_ids() {
        let mut dict = Dictionary::new();
        for term in ["the", "quick", "brown", "fox", "the", "lazy"] {
            dict.intern(term);
        }
        let mut bytes = Vec::new();
        dict.write(&mut bytes).unwrap();
        let reread = Dictionary::read(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(reread.term_count(), dict.term_count());
        for id in 0..dict.term_count() as u32 {
            assert_eq!(reread.term(id), dict.term(id));
            assert_eq!(reread.lookup(dict.term(id)), Some(id));
        }
    }
}
