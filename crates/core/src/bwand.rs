/// Bloom-chain retrieval: conjunctive BWAND_AND and approximate
/// disjunctive BWAND_OR.
///
/// Candidates come from the rarest term's real postings; every other term
/// answers through its Bloom-filter chain via `contains_docid`, so matches
/// are subject to the filters' false-positive rate but never miss a real
/// hit.

use crate::pool::{SegmentPool, SegmentPtr};
use crate::postings::ChainCursor;
use crate::wand::{ScoredDoc, TopK};

/// Conjunctive membership: docids of the rarest list that pass every other
/// term's Bloom chain, in chain order, at most `hits`.
pub fn bwand_and(pool: &SegmentPool, heads: &[SegmentPtr], hits: usize) -> Vec<u32> {
    if heads.is_empty() || hits == 0 {
        return Vec::new();
    }
    let mut lead = ChainCursor::new(pool, heads[0]);
    let mut chains: Vec<SegmentPtr> = heads[1..].to_vec();

    let mut results = Vec::new();
    'candidates: while let Some(candidate) = lead.next_doc() {
        for ptr in chains.iter_mut() {
            if !pool.contains_docid(candidate, ptr) {
                if ptr.is_undefined() {
                    // That chain ended before the candidate; later
                    // candidates sit even further along and cannot match.
                    break 'candidates;
                }
                continue 'candidates;
            }
        }
        results.push(candidate);
        if results.len() >= hits {
            break;
        }
    }
    results
}

/// Disjunctive approximation: each candidate docid of the rarest list is
/// scored by the idf weights of the query terms whose filters it passes.
pub fn bwand_or(
    pool: &SegmentPool,
    heads: &[SegmentPtr],
    weights: &[f32],
    hits: usize,
) -> Vec<ScoredDoc> {
    if heads.is_empty() || hits == 0 {
        return Vec::new();
    }
    let mut lead = ChainCursor::new(pool, heads[0]);
    let mut chains: Vec<SegmentPtr> = heads[1..].to_vec();

    let mut topk = TopK::new(hits);
    while let Some(candidate) = lead.next_doc() {
        let mut score = weights[0];
        for (i, ptr) in chains.iter_mut().enumerate() {
            if pool.contains_docid(candidate, ptr) {
                score += weights[i + 1];
            }
        }
        topk.push(candidate, score);
    }
    topk.into_sorted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BLOCK_SIZE;
    use crate::pool::BloomConfig;

    fn bloom_pool() -> SegmentPool {
        SegmentPool::with_limit(
            1 << 16,
            false,
            Some(BloomConfig {
                nb_hash: 4,
                bits_per_element: 10,
            }),
        )
    }

    fn chain(pool: &mut SegmentPool, docids: &[u32]) -> SegmentPtr {
        let mut head = SegmentPtr::UNDEFINED;
        let mut tail = SegmentPtr::UNDEFINED;
        for block in docids.chunks(BLOCK_SIZE) {
            tail = pool.append_nonpositional(block, tail);
            if head.is_undefined() {
                head = tail;
            }
        }
        head
    }

    #[test]
    fn test_bwand_and_intersection() {
        let mut pool = bloom_pool();
        let v = chain(&mut pool, &[7, 13, 40]);
        let u = chain(&mut pool, &[3, 7, 13, 21]);
        // 7 and 13 are real members; 40 lies past u's chain and is
        // rejected by the max-docid walk, filters notwithstanding.
        assert_eq!(bwand_and(&pool, &[v, u], 100), vec![7, 13]);
    }

    #[test]
    fn test_bwand_and_hits_cap() {
        let mut pool = bloom_pool();
        let a = chain(&mut pool, &[1, 2, 3, 4, 5]);
        let b = chain(&mut pool, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(bwand_and(&pool, &[a, b], 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_bwand_or_ranks_by_weight_sum() {
        let mut pool = bloom_pool();
        let lead = chain(&mut pool, &[9, 14, 20]);
        let other = chain(&mut pool, &[9, 14]);
        // 9 and 14 pass the other chain; 20 lies past it and matches only
        // the lead.
        let weights = [1.5f32, 2.0];
        let results = bwand_or(&pool, &[lead, other], &weights, 10);

        assert_eq!(results.len(), 3);
        let docids: Vec<u32> = results.iter().map(|r| r.docid).collect();
        assert_eq!(docids, vec![9, 14, 20]);
        assert!((results[0].score - 3.5).abs() < 1e-6);
        assert!((results[2].score - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_bwand_or_top_k_truncates() {
        let mut pool = bloom_pool();
        let lead = chain(&mut pool, &(10..=50u32).collect::<Vec<_>>());
        let other = chain(&mut pool, &[10, 11]);
        let results = bwand_or(&pool, &[lead, other], &[1.0, 5.0], 2);
        let docids: Vec<u32> = results.iter().map(|r| r.docid).collect();
        assert_eq!(docids, vec![10, 11]);
    }

    #[test]
    fn test_empty_inputs() {
        let pool = bloom_pool();
        assert!(bwand_and(&pool, &[], 10).is_empty());
        assert!(bwand_or(&pool, &[], &[], 10).is_empty());
    }
}
