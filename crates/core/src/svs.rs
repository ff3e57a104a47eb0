/// Conjunctive SvS intersection.
///
/// The rarest list drives: each of its docids is probed against the longer
/// lists with block-skipping `advance` calls. Matches come out in chain
/// order (ascending docids, descending in reverse mode), at most `hits` of
/// them.

use crate::pool::{SegmentPool, SegmentPtr};
use crate::postings::ChainCursor;

/// Intersect the chains headed by `heads`, which the caller has sorted by
/// ascending df.
pub fn intersect_svs(pool: &SegmentPool, heads: &[SegmentPtr], hits: usize) -> Vec<u32> {
    if heads.is_empty() || hits == 0 {
        return Vec::new();
    }
    let mut lead = ChainCursor::new(pool, heads[0]);
    let mut others: Vec<ChainCursor> = heads[1..]
        .iter()
        .map(|&h| ChainCursor::new(pool, h))
        .collect();

    let mut results = Vec::new();
    'candidates: while let Some(candidate) = lead.next_doc() {
        for cursor in others.iter_mut() {
            match cursor.advance(candidate) {
                // A probed list ran out: no further candidate can match.
                None => break 'candidates,
                Some(d) if d != candidate => continue 'candidates,
                Some(_) => {}
            }
        }
        results.push(candidate);
        if results.len() >= hits {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(pool: &mut SegmentPool, docids: &[u32]) -> SegmentPtr {
        let mut head = SegmentPtr::UNDEFINED;
        let mut tail = SegmentPtr::UNDEFINED;
        for block in docids.chunks(crate::codec::BLOCK_SIZE) {
            tail = pool.append_nonpositional(block, tail);
            if head.is_undefined() || pool.reverse() {
                head = tail;
            }
        }
        head
    }

    #[test]
    fn test_two_list_intersection() {
        let mut pool = SegmentPool::with_limit(1 << 16, false, None);
        let a = chain(&mut pool, &[2, 4, 9, 15, 30]);
        let b = chain(&mut pool, &[1, 4, 8, 15, 16, 29, 30, 77]);
        assert_eq!(intersect_svs(&pool, &[a, b], 100), vec![4, 15, 30]);
    }

    #[test]
    fn test_three_lists_and_hits_cap() {
        let mut pool = SegmentPool::with_limit(1 << 16, false, None);
        let a = chain(&mut pool, &[3, 5, 9, 11]);
        let b = chain(&mut pool, &[1, 3, 5, 9, 11, 13]);
        let c = chain(&mut pool, &[3, 4, 5, 9, 10, 11]);
        assert_eq!(intersect_svs(&pool, &[a, b, c], 100), vec![3, 5, 9, 11]);
        assert_eq!(intersect_svs(&pool, &[a, b, c], 2), vec![3, 5]);
    }

    #[test]
    fn test_disjoint_lists() {
        let mut pool = SegmentPool::with_limit(1 << 16, false, None);
        let a = chain(&mut pool, &[1, 3, 5]);
        let b = chain(&mut pool, &[2, 4, 6]);
        assert!(intersect_svs(&pool, &[a, b], 10).is_empty());
    }

    #[test]
    fn test_multi_block_intersection() {
        let mut pool = SegmentPool::with_limit(1 << 18, false, None);
        // 300 postings in one list, every third shared with the other.
        let long: Vec<u32> = (1..=300u32).collect();
        let short: Vec<u32> = (1..=100u32).map(|i| i * 3).collect();
        let a = chain(&mut pool, &long);
        let b = chain(&mut pool, &short);
        assert_eq!(intersect_svs(&pool, &[b, a], 1000), short);
    }

    #[test]
    fn test_reverse_mode_descending_results() {
        let mut pool = SegmentPool::with_limit(1 << 16, true, None);
        let a = chain(&mut pool, &[1, 2, 3]);
        let b = chain(&mut pool, &[1, 2, 3, 4]);
        assert_eq!(intersect_svs(&pool, &[a, b], 10), vec![3, 2, 1]);
    }

    #[test]
    fn test_empty_input() {
        let pool = SegmentPool::with_limit(1 << 10, false, None);
        assert!(intersect_svs(&pool, &[], 10).is_empty());
        assert!(intersect_svs(&pool, &[SegmentPtr::UNDEFINED], 0).is_empty());
    }
}
