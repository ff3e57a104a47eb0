/// Block-at-a-time cursor over a term's segment chain.
///
/// Decodes one docid block at a time and skips whole segments during
/// `advance` using the per-segment max docid, without decoding the skipped
/// blocks. The tf block of the current segment is decoded lazily on the
/// first `term_freq` call. In reverse mode the chain runs newest-first and
/// every comparison is mirrored; "advance to `target`" then means advance
/// to the first docid <= target.

use crate::codec::BLOCK_SIZE;
use crate::pool::{SegmentPool, SegmentPtr};

pub struct ChainCursor<'a> {
    pool: &'a SegmentPool,
    ptr: SegmentPtr,
    docids: [u32; BLOCK_SIZE],
    tfs: [u32; BLOCK_SIZE],
    count: usize,
    /// Next in-block posting to consume.
    next_pos: usize,
    cur_doc: u32,
    have_cur: bool,
    decoded: bool,
    tf_decoded: bool,
    exhausted: bool,
}

impl<'a> ChainCursor<'a> {
    pub fn new(pool: &'a SegmentPool, head: SegmentPtr) -> Self {
        Self {
            pool,
            ptr: head,
            docids: [0; BLOCK_SIZE],
            tfs: [0; BLOCK_SIZE],
            count: 0,
            next_pos: 0,
            cur_doc: 0,
            have_cur: false,
            decoded: false,
            tf_decoded: false,
            exhausted: head.is_undefined(),
        }
    }

    fn decode(&mut self) {
        self.count = self.pool.decode_docid_block(self.ptr, &mut self.docids);
        self.decoded = true;
        self.tf_decoded = false;
        self.next_pos = 0;
    }

    /// Move to the next segment without decoding it. False at chain end.
    fn advance_segment(&mut self) -> bool {
        self.ptr = self.pool.next(self.ptr);
        self.decoded = false;
        self.have_cur = false;
        if self.ptr.is_undefined() {
            self.exhausted = true;
            false
        } else {
            true
        }
    }

    /// Step to the next posting in chain order.
    pub fn next_doc(&mut self) -> Option<u32> {
        if self.exhausted {
            return None;
        }
        if !self.decoded {
            self.decode();
        }
        if self.next_pos >= self.count {
            if !self.advance_segment() {
                return None;
            }
            self.decode();
        }
        self.cur_doc = self.docids[self.next_pos];
        self.next_pos += 1;
        self.have_cur = true;
        Some(self.cur_doc)
    }

    /// Skip forward to the first posting at or past `target` in chain
    /// order, jumping over segments whose max docid cannot cover it.
    pub fn advance(&mut self, target: u32) -> Option<u32> {
        if self.exhausted {
            return None;
        }
        if self.have_cur && !self.pool.precedes(self.cur_doc, target) {
            return Some(self.cur_doc);
        }
        while self.pool.precedes(self.pool.max_doc(self.ptr), target) {
            if !self.advance_segment() {
                return None;
            }
        }
        if !self.decoded {
            self.decode();
        }
        let start = if self.have_cur { self.next_pos } else { 0 };
        for i in start..self.count {
            if !self.pool.precedes(self.docids[i], target) {
                self.cur_doc = self.docids[i];
                self.next_pos = i + 1;
                self.have_cur = true;
                return Some(self.cur_doc);
            }
        }
        // The segment's max docid covers target, so the scan above can only
        // fall through when the remaining postings all precede it; continue
        // in the next segment.
        if !self.advance_segment() {
            return None;
        }
        self.advance(target)
    }

    /// Current docid. Valid after `next_doc` or `advance` returned Some.
    pub fn doc(&self) -> u32 {
        self.cur_doc
    }

    /// Term frequency of the current posting. Decodes the segment's tf
    /// block on first use.
    pub fn term_freq(&mut self) -> u32 {
        if !self.tf_decoded {
            self.pool.decode_tf_block(self.ptr, &mut self.tfs);
            self.tf_decoded = true;
        }
        self.tfs[self.next_pos - 1]
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Max docid of the segment the cursor is positioned in.
    pub fn segment_max_doc(&self) -> u32 {
        self.pool.max_doc(self.ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_chain(pool: &mut SegmentPool, blocks: &[Vec<u32>]) -> SegmentPtr {
        let mut head = SegmentPtr::UNDEFINED;
        let mut tail = SegmentPtr::UNDEFINED;
        for block in blocks {
            tail = pool.append_nonpositional(block, tail);
            if head.is_undefined() || pool.reverse() {
                head = tail;
            }
        }
        head
    }

    #[test]
    fn test_next_doc_walks_whole_chain() {
        let mut pool = SegmentPool::with_limit(1 << 16, false, None);
        let first: Vec<u32> = (0..BLOCK_SIZE as u32).map(|i| i * 2 + 1).collect();
        let second: Vec<u32> = (0..30u32).map(|i| 400 + i).collect();
        let head = build_chain(&mut pool, &[first.clone(), second.clone()]);

        let mut cursor = ChainCursor::new(&pool, head);
        let mut all = Vec::new();
        while let Some(d) = cursor.next_doc() {
            all.push(d);
        }
        let mut expected = first;
        expected.extend_from_slice(&second);
        assert_eq!(all, expected);
        assert!(cursor.is_exhausted());
        assert!(cursor.next_doc().is_none());
    }

    #[test]
    fn test_advance_skips_segments() {
        let mut pool = SegmentPool::with_limit(1 << 18, false, None);
        let blocks: Vec<Vec<u32>> = (0..4u32)
            .map(|b| (0..BLOCK_SIZE as u32).map(|i| b * 1000 + i + 1).collect())
            .collect();
        let head = build_chain(&mut pool, &blocks);

        let mut cursor = ChainCursor::new(&pool, head);
        // Jump straight into the third segment.
        assert_eq!(cursor.advance(2050), Some(2050));
        assert_eq!(cursor.doc(), 2050);
        // An advance to a gap lands on the next posting.
        assert_eq!(cursor.advance(2500), Some(3001));
        // Advancing to a target already behind is a no-op.
        assert_eq!(cursor.advance(100), Some(3001));
        // Past everything: exhausted.
        assert_eq!(cursor.advance(100_000), None);
        assert!(cursor.is_exhausted());
    }

    #[test]
    fn test_term_freq_lazy_decode() {
        let mut pool = SegmentPool::with_limit(1 << 16, false, None);
        let docids: Vec<u32> = (1..=20u32).collect();
        let tfs: Vec<u32> = (1..=20u32).map(|i| i % 4 + 1).collect();
        let head = pool.append_tfonly(&docids, &tfs, SegmentPtr::UNDEFINED);

        let mut cursor = ChainCursor::new(&pool, head);
        while let Some(d) = cursor.next_doc() {
            assert_eq!(cursor.term_freq(), (d - 1) % 4 + 1);
        }
    }

    #[test]
    fn test_reverse_cursor_descends() {
        let mut pool = SegmentPool::with_limit(1 << 16, true, None);
        let older: Vec<u32> = (1..=40u32).collect();
        let newer: Vec<u32> = (100..140u32).collect();
        let head = build_chain(&mut pool, &[older, newer]);

        let mut cursor = ChainCursor::new(&pool, head);
        assert_eq!(cursor.next_doc(), Some(139));
        // Reverse advance: first docid <= target.
        assert_eq!(cursor.advance(120), Some(120));
        assert_eq!(cursor.advance(50), Some(40));
        assert_eq!(cursor.advance(0), None);
    }

    #[test]
    fn test_empty_chain() {
        let pool = SegmentPool::with_limit(1 << 10, false, None);
        let mut cursor = ChainCursor::new(&pool, SegmentPtr::UNDEFINED);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.next_doc(), None);
        assert_eq!(cursor.advance(5), None);
    }
}
