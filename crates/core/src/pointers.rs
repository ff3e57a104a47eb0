/// The pointer directory: per-term statistics and chain heads, plus
/// corpus-level totals.
///
/// Columns are dense arrays indexed by term id (df, cf, max-tf, the doc
/// length at that max-tf, head pointer) and by doc id (doc length). Reading
/// an id that was never touched yields zero (or UNDEFINED for heads);
/// columns grow by doubling when a new id is written.

use crate::pool::{read_u32, read_u64, write_u32, write_u64, SegmentPtr};
use std::io::{self, Read, Write};

pub struct Pointers {
    df: Vec<u32>,
    cf: Vec<u64>,
    max_tf: Vec<u32>,
    max_tf_doc_len: Vec<u32>,
    head: Vec<SegmentPtr>,
    doc_len: Vec<u32>,
    pub total_docs: u32,
    pub total_doc_len: u64,
}

fn grow<T: Clone>(column: &mut Vec<T>, id: usize, fill: T) {
    if id >= column.len() {
        let target = (column.len() * 2).max(id + 1).max(16);
        column.resize(target, fill);
    }
}

impl Pointers {
    pub fn new() -> Self {
        Self {
            df: Vec::new(),
            cf: Vec::new(),
            max_tf: Vec::new(),
            max_tf_doc_len: Vec::new(),
            head: Vec::new(),
            doc_len: Vec::new(),
            total_docs: 0,
            total_doc_len: 0,
        }
    }

    pub fn df(&self, term: usize) -> u32 {
        self.df.get(term).copied().unwrap_or(0)
    }

    pub fn add_df(&mut self, term: usize) {
        grow(&mut self.df, term, 0);
        self.df[term] += 1;
    }

    pub fn cf(&self, term: usize) -> u64 {
        self.cf.get(term).copied().unwrap_or(0)
    }

    pub fn add_cf(&mut self, term: usize) {
        grow(&mut self.cf, term, 0);
        self.cf[term] += 1;
    }

    pub fn head_ptr(&self, term: usize) -> SegmentPtr {
        self.head.get(term).copied().unwrap_or(SegmentPtr::UNDEFINED)
    }

    pub fn set_head_ptr(&mut self, term: usize, ptr: SegmentPtr) {
        grow(&mut self.head, term, SegmentPtr::UNDEFINED);
        self.head[term] = ptr;
    }

    pub fn max_tf(&self, term: usize) -> u32 {
        self.max_tf.get(term).copied().unwrap_or(0)
    }

    pub fn max_tf_doc_len(&self, term: usize) -> u32 {
        self.max_tf_doc_len.get(term).copied().unwrap_or(0)
    }

    pub fn set_max_tf(&mut self, term: usize, tf: u32, doc_len: u32) {
        grow(&mut self.max_tf, term, 0);
        grow(&mut self.max_tf_doc_len, term, 0);
        self.max_tf[term] = tf;
        self.max_tf_doc_len[term] = doc_len;
    }

    pub fn doc_len(&self, docid: usize) -> u32 {
        self.doc_len.get(docid).copied().unwrap_or(0)
    }

    pub fn set_doc_len(&mut self, docid: usize, len: u32) {
        grow(&mut self.doc_len, docid, 0);
        self.doc_len[docid] = len;
    }

    pub fn doc_lens(&self) -> &[u32] {
        &self.doc_len
    }

    /// Running average document length.
    pub fn avg_doc_len(&self) -> f32 {
        self.total_doc_len as f32 / self.total_docs.max(1) as f32
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, self.df.len() as u32)?;
        for &v in &self.df {
            write_u32(w, v)?;
        }
        write_u32(w, self.cf.len() as u32)?;
        for &v in &self.cf {
            write_u64(w, v)?;
        }
        write_u32(w, self.max_tf.len() as u32)?;
        for &v in &self.max_tf {
            write_u32(w, v)?;
        }
        write_u32(w, self.max_tf_doc_len.len() as u32)?;
        for &v in &self.max_tf_doc_len {
            write_u32(w, v)?;
        }
        write_u32(w, self.head.len() as u32)?;
        for &v in &self.head {
            write_u64(w, v.to_raw())?;
        }
        write_u32(w, self.doc_len.len() as u32)?;
        for &v in &self.doc_len {
            write_u32(w, v)?;
        }
        write_u32(w, self.total_docs)?;
        write_u64(w, self.total_doc_len)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Pointers> {
        fn read_u32_array<R: Read>(r: &mut R) -> io::Result<Vec<u32>> {
            let len = read_u32(r)? as usize;
            let mut out = Vec::with_capacity(len);
            for _ in 0..len {
                out.push(read_u32(r)?);
            }
            Ok(out)
        }

        let df = read_u32_array(r)?;
        let cf_len = read_u32(r)? as usize;
        let mut cf = Vec::with_capacity(cf_len);
        for _ in 0..cf_len {
            cf.push(read_u64(r)?);
        }
        let max_tf = read_u32_array(r)?;
        let max_tf_doc_len = read_u32_array(r)?;
        let head_len = read_u32(r)? as usize;
        let mut head = Vec::with_capacity(head_len);
        for _ in 0..head_len {
            head.push(SegmentPtr::from_raw(read_u64(r)?));
        }
        let doc_len = read_u32_array(r)?;
        let total_docs = read_u32(r)?;
        let total_doc_len = read_u64(r)?;
        Ok(Pointers {
            df,
            cf,
            max_tf,
            max_tf_doc_len,
            head,
            doc_len,
            total_docs,
            total_doc_len,
        })
    }
}

impl Default for Pointers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_absent_term_defaults() {
        let p = Pointers::new();
        assert_eq!(p.df(42), 0);
        assert_eq!(p.cf(42), 0);
        assert!(p.head_ptr(42).is_undefined());
        assert_eq!(p.max_tf(42), 0);
        assert_eq!(p.doc_len(42), 0);
    }

    #[test]
    fn test_counters_and_heads() {
        let mut p = Pointers::new();
        p.add_df(3);
        p.add_df(3);
        p.add_cf(3);
        p.set_head_ptr(3, SegmentPtr::new(1, 200));
        assert_eq!(p.df(3), 2);
        assert_eq!(p.cf(3), 1);
        assert_eq!(p.head_ptr(3), SegmentPtr::new(1, 200));
        // Neighbouring ids stay at their defaults after growth.
        assert_eq!(p.df(2), 0);
        assert!(p.head_ptr(4).is_undefined());
    }

    #[test]
    fn test_avg_doc_len() {
        let mut p = Pointers::new();
        p.set_doc_len(0, 10);
        p.set_doc_len(1, 30);
        p.total_docs = 2;
        p.total_doc_len = 40;
        assert!((p.avg_doc_len() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_roundtrip() {
        let mut p = Pointers::new();
        for t in 0..100usize {
            p.add_df(t);
            p.add_cf(t);
            p.add_cf(t);
            p.set_max_tf(t, t as u32 % 5 + 1, 40);
            p.set_head_ptr(t, SegmentPtr::new(0, t as u32 * 16));
        }
        p.set_head_ptr(7, SegmentPtr::UNDEFINED);
        for d in 0..500usize {
            p.set_doc_len(d, d as u32 % 90 + 1);
        }
        p.total_docs = 500;
        p.total_doc_len = 22_000;

        let mut bytes = Vec::new();
        p.write(&mut bytes).unwrap();
        let q = Pointers::read(&mut Cursor::new(&bytes)).unwrap();

        for t in 0..100usize {
            assert_eq!(q.df(t), p.df(t));
            assert_eq!(q.cf(t), p.cf(t));
            assert_eq!(q.max_tf(t), p.max_tf(t));
            assert_eq!(q.max_tf_doc_len(t), p.max_tf_doc_len(t));
            assert_eq!(q.head_ptr(t), p.head_ptr(t));
        }
        assert!(q.head_ptr(7).is_undefined());
        assert_eq!(q.doc_lens(), p.doc_lens());
        assert_eq!(q.total_docs, 500);
        assert_eq!(q.total_doc_len, 22_000);
    }
}
