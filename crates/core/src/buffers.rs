/// Per-term staging buffers feeding the segment pool.
///
/// A term starts with a small docid buffer of `df_cutoff` slots. Once its
/// df crosses the cutoff the buffer is promoted to one full block
/// (preserving the initial postings) and, when expansion is enabled,
/// doubles after each flush up to `max_blocks` slots.
///
/// Position buffers hold per-block runs: slot 0 of each block records the
/// number of positions written for that block, the following slots hold the
/// gap-coded positions, and one trailing scratch slot keeps the raw last
/// position of the term in the current document (consumed when computing
/// the next gap, zeroed when the document ends).

use crate::codec::BLOCK_SIZE;
use crate::index::PostingsMode;
use crate::pool::SegmentPtr;

pub struct BufferMaps {
    pub mode: PostingsMode,
    pub df_cutoff: usize,
    /// Per-term docid buffers; a vector's length is the term's capacity.
    pub docid: Vec<Vec<u32>>,
    /// Per-term tf buffers (tf-bearing modes only).
    pub tf: Vec<Vec<u32>>,
    /// Per-term position buffers (positional mode only).
    pub position: Vec<Vec<u32>>,
    /// Write index into the docid/tf buffers.
    pub value_position: Vec<u32>,
    /// Write index into the position buffer.
    pub pvalue_position: Vec<u32>,
    /// Index of the current block's position-count slot.
    pub psum: Vec<u32>,
    /// Tail of the term's chain in the pool.
    pub tail: Vec<SegmentPtr>,
    /// Whether a term's buffers have been allocated.
    initialized: Vec<bool>,
}

impl BufferMaps {
    pub fn new(mode: PostingsMode, df_cutoff: usize) -> Self {
        Self {
            mode,
            df_cutoff,
            docid: Vec::new(),
            tf: Vec::new(),
            position: Vec::new(),
            value_position: Vec::new(),
            pvalue_position: Vec::new(),
            psum: Vec::new(),
            tail: Vec::new(),
            initialized: Vec::new(),
        }
    }

    /// Grow every column so `term` is addressable.
    pub fn ensure_term(&mut self, term: usize) {
        if term < self.docid.len() {
            return;
        }
        let target = (self.docid.len() * 2).max(term + 1).max(16);
        self.docid.resize_with(target, Vec::new);
        self.value_position.resize(target, 0);
        self.tail.resize(target, SegmentPtr::UNDEFINED);
        self.initialized.resize(target, false);
        if self.mode != PostingsMode::NonPositional {
            self.tf.resize_with(target, Vec::new);
        }
        if self.mode == PostingsMode::Positional {
            self.position.resize_with(target, Vec::new);
            self.pvalue_position.resize(target, 0);
            self.psum.resize(target, 0);
        }
    }

    /// First-touch allocation of a term's small buffers.
    pub fn init_term(&mut self, term: usize) {
        self.ensure_term(term);
        if self.initialized[term] {
            return;
        }
        self.initialized[term] = true;
        self.docid[term] = vec![0; self.df_cutoff];
        match self.mode {
            PostingsMode::NonPositional => {}
            PostingsMode::TfOnly => {
                self.tf[term] = vec![0; self.df_cutoff + 1];
            }
            PostingsMode::Positional => {
                self.tf[term] = vec![0; self.df_cutoff + 1];
                self.position[term] = vec![0; self.df_cutoff.max(2)];
                self.pvalue_position[term] = 1;
            }
        }
    }

    /// Grow a term's position buffer until it can hold index `needed`.
    pub fn grow_position(&mut self, term: usize, needed: usize) {
        let len = self.position[term].len();
        if len > needed {
            return;
        }
        let mut target = (len * 2).max(4);
        while target <= needed {
            target *= 2;
        }
        self.position[term].resize(target, 0);
    }

    /// Promote a term's buffers from the small df-cutoff capacity to one
    /// full block, preserving the buffered postings.
    pub fn promote_to_block(&mut self, term: usize) {
        self.docid[term].resize(BLOCK_SIZE, 0);
        if self.mode != PostingsMode::NonPositional {
            self.tf[term].resize(BLOCK_SIZE, 0);
        }
        if self.mode == PostingsMode::Positional {
            let len = self.position[term].len();
            let target = 2 * (len / BLOCK_SIZE + 1) * BLOCK_SIZE;
            self.position[term].resize(target, 0);
        }
    }

    /// Term capacity in postings.
    pub fn capacity(&self, term: usize) -> usize {
        self.docid[term].len()
    }

    /// Terms whose buffers were promoted to at least one block; these are
    /// the ones the shutdown flush visits.
    pub fn promoted_terms(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.docid.len()).filter(|&t| self.docid[t].len() >= BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_small_buffers() {
        let mut maps = BufferMaps::new(PostingsMode::TfOnly, 5);
        maps.init_term(3);
        assert_eq!(maps.docid[3].len(), 5);
        assert_eq!(maps.tf[3].len(), 6);
        assert_eq!(maps.value_position[3], 0);
        assert!(maps.tail[3].is_undefined());
    }

    #[test]
    fn test_promote_preserves_contents() {
        let mut maps = BufferMaps::new(PostingsMode::TfOnly, 3);
        maps.init_term(0);
        maps.docid[0][..3].copy_from_slice(&[7, 9, 12]);
        maps.tf[0][..3].copy_from_slice(&[1, 2, 1]);
        maps.promote_to_block(0);
        assert_eq!(maps.capacity(0), BLOCK_SIZE);
        assert_eq!(&maps.docid[0][..3], &[7, 9, 12]);
        assert_eq!(&maps.tf[0][..3], &[1, 2, 1]);
        assert!(maps.docid[0][3..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_position_growth() {
        let mut maps = BufferMaps::new(PostingsMode::Positional, 2);
        maps.init_term(0);
        let initial = maps.position[0].len();
        maps.grow_position(0, initial + 10);
        assert!(maps.position[0].len() > initial + 10);
        assert!(maps.position[0].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_promoted_terms_filter() {
        let mut maps = BufferMaps::new(PostingsMode::NonPositional, 4);
        maps.init_term(0);
        maps.init_term(1);
        maps.promote_to_block(1);
        let promoted: Vec<usize> = maps.promoted_terms().collect();
        assert_eq!(promoted, vec![1]);
    }
}
