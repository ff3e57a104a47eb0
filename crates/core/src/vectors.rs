/// Document vectors: an optional per-document stream of term ids, kept
/// compressed in sub-blocks of BLOCK_SIZE.
///
/// Per-document compressed layout (u32 words):
/// [number of sub-blocks] then per sub-block [len][compressed words].
///
/// File format (vectors):
/// [capacity: u32] then, for each stored document,
/// [docid: u32][word count: u32][words], terminated by a docid of
/// 0xFFFFFFFF.

use crate::codec::{self, BLOCK_SIZE};
use crate::pool::{read_u32, write_u32};
use std::io::{self, Read, Write};

const TERMINATOR: u32 = u32::MAX;

pub struct DocumentVectors {
    docs: Vec<Option<Vec<u32>>>,
}

impl DocumentVectors {
    pub fn new() -> Self {
        Self { docs: Vec::new() }
    }

    pub fn contains(&self, docid: u32) -> bool {
        self.docs
            .get(docid as usize)
            .map_or(false, |d| d.is_some())
    }

    /// Compress and store the term-id stream of a document. An empty stream
    /// stores an empty vector (zero sub-blocks).
    pub fn add(&mut self, docid: u32, term_ids: &[u32]) {
        let slot = docid as usize;
        if slot >= self.docs.len() {
            let target = (self.docs.len() * 2).max(slot + 1).max(16);
            self.docs.resize(target, None);
        }

        let mut words = vec![0u32];
        let mut blocks = 0u32;
        for chunk in term_ids.chunks(BLOCK_SIZE) {
            let compressed = codec::encode(chunk, false, false);
            words.push(compressed.len() as u32);
            words.extend_from_slice(&compressed);
            blocks += 1;
        }
        words[0] = blocks;
        self.docs[slot] = Some(words);
    }

    /// Reconstruct the first `doc_len` term ids of a stored document.
    pub fn decode(&self, docid: u32, doc_len: usize) -> Option<Vec<u32>> {
        let words = self.docs.get(docid as usize)?.as_ref()?;
        let blocks = words[0] as usize;
        let mut out = Vec::with_capacity(blocks * BLOCK_SIZE);
        let mut tmp = [0u32; BLOCK_SIZE];
        let mut pos = 1;
        for _ in 0..blocks {
            let len = words[pos] as usize;
            codec::decode(&words[pos + 1..pos + 1 + len], false, false, &mut tmp);
            out.extend_from_slice(&tmp);
            pos += len + 1;
        }
        out.truncate(doc_len);
        Some(out)
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, self.docs.len() as u32)?;
        for (docid, doc) in self.docs.iter().enumerate() {
            if let Some(words) = doc {
                write_u32(w, docid as u32)?;
                write_u32(w, words.len() as u32)?;
                for &word in words {
                    write_u32(w, word)?;
                }
            }
        }
        write_u32(w, TERMINATOR)
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<DocumentVectors> {
        let capacity = read_u32(r)? as usize;
        let mut docs = vec![None; capacity];
        loop {
            let docid = read_u32(r)?;
            if docid == TERMINATOR {
                break;
            }
            let len = read_u32(r)? as usize;
            let mut words = Vec::with_capacity(len);
            for _ in 0..len {
                words.push(read_u32(r)?);
            }
            let slot = docid as usize;
            if slot >= docs.len() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("document vector id {} beyond capacity {}", docid, capacity),
                ));
            }
            docs[slot] = Some(words);
        }
        Ok(DocumentVectors { docs })
    }
}

impl Default for DocumentVectors {
    fn default() -> Self {
        Self::new()
    }
}
