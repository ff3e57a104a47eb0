/// WAND and MaxBlockWAND disjunctive top-k retrieval.
///
/// Terms keep a cursor over their chain; each round the terms are ordered
/// by current docid and a pivot is located — the first term at which the
/// accumulated upper bounds could still beat the top-k threshold. Terms
/// aligned on the pivot document get fully scored; otherwise the lagging
/// term skips ahead, jumping whole segments via their max docid.
///
/// WAND scores idf * bm25tf and bounds each term by its max-tf statistics;
/// MBWAND scores and bounds with the idf alone, which needs no stored term
/// frequencies.

use crate::pool::{SegmentPool, SegmentPtr};
use crate::postings::ChainCursor;
use crate::scorer;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scored retrieval result.
#[derive(Debug, Clone, Copy)]
pub struct ScoredDoc {
    pub docid: u32,
    pub score: f32,
}

/// Min-heap entry (inverted ordering for BinaryHeap, which is a max-heap).
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    docid: u32,
    score: f32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.docid == other.docid
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the heap pops its weakest entry: lowest score first,
        // and on score ties the higher docid, so the older (lower docid)
        // entry stays.
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then(self.docid.cmp(&other.docid))
    }
}

/// Fixed-capacity top-k collector over (docid, score) pairs.
pub struct TopK {
    heap: BinaryHeap<HeapEntry>,
    k: usize,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Score of the weakest kept entry; 0 until the collector fills.
    pub fn threshold(&self) -> f32 {
        if self.is_full() {
            self.heap.peek().map_or(0.0, |e| e.score)
        } else {
            0.0
        }
    }

    pub fn push(&mut self, docid: u32, score: f32) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(HeapEntry { docid, score });
        } else if score > self.heap.peek().map_or(0.0, |e| e.score) {
            self.heap.push(HeapEntry { docid, score });
            self.heap.pop();
        }
    }

    /// Results sorted by descending score, ascending docid on ties.
    pub fn into_sorted(self) -> Vec<ScoredDoc> {
        let mut results: Vec<ScoredDoc> = self
            .heap
            .into_iter()
            .map(|e| ScoredDoc {
                docid: e.docid,
                score: e.score,
            })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.docid.cmp(&b.docid))
        });
        results
    }
}

struct TermState<'a> {
    cursor: ChainCursor<'a>,
    upper_bound: f32,
    weight: f32,
    cur: u32,
}

/// Run WAND (or MBWAND with `idf_only`) over the chains headed by `heads`.
///
/// `upper_bounds[i]` bounds term i's contribution to any document;
/// `weights[i]` is its idf. `doc_lens` is the dense document-length table.
pub fn wand(
    pool: &SegmentPool,
    heads: &[SegmentPtr],
    upper_bounds: &[f32],
    weights: &[f32],
    doc_lens: &[u32],
    avg_doc_len: f32,
    hits: usize,
    idf_only: bool,
) -> Vec<ScoredDoc> {
    let mut terms: Vec<TermState> = Vec::with_capacity(heads.len());
    for (i, &head) in heads.iter().enumerate() {
        let mut cursor = ChainCursor::new(pool, head);
        if let Some(doc) = cursor.next_doc() {
            terms.push(TermState {
                cursor,
                upper_bound: upper_bounds[i],
                weight: weights[i],
                cur: doc,
            });
        }
    }

    let mut topk = TopK::new(hits);
    while !terms.is_empty() {
        terms.sort_by(|a, b| {
            if a.cur == b.cur {
                Ordering::Equal
            } else if pool.precedes(a.cur, b.cur) {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        });

        // Pivot: first term at which the accumulated bounds can still beat
        // the threshold. Until the collector fills, everything qualifies.
        let threshold = topk.threshold();
        let full = topk.is_full();
        let mut accumulated = 0.0f32;
        let mut pivot = None;
        for (i, term) in terms.iter().enumerate() {
            accumulated += term.upper_bound;
            if !full || accumulated > threshold {
                pivot = Some(i);
                break;
            }
        }
        let pivot = match pivot {
            Some(p) => p,
            None => break,
        };
        let pivot_doc = terms[pivot].cur;

        if terms[0].cur == pivot_doc {
            // All terms up to the pivot converge: score the document.
            let dl = doc_lens.get(pivot_doc as usize).copied().unwrap_or(1);
            let mut score = 0.0f32;
            for term in terms.iter_mut() {
                if term.cur == pivot_doc {
                    score += if idf_only {
                        term.weight
                    } else {
                        term.weight * scorer::bm25tf(term.cursor.term_freq(), dl, avg_doc_len)
                    };
                }
            }
            topk.push(pivot_doc, score);

            let mut i = 0;
            while i < terms.len() {
                if terms[i].cur == pivot_doc {
                    match terms[i].cursor.next_doc() {
                        Some(doc) => {
                            terms[i].cur = doc;
                            i += 1;
                        }
                        None => {
                            terms.remove(i);
                        }
                    }
                } else {
                    i += 1;
                }
            }
        } else {
            // The leading term lags the pivot: skip it ahead.
            match terms[0].cursor.advance(pivot_doc) {
                Some(doc) => terms[0].cur = doc,
                None => {
                    terms.remove(0);
                }
            }
        }
    }
    topk.into_sorted()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BLOCK_SIZE;

    fn chain(pool: &mut SegmentPool, postings: &[(u32, u32)]) -> SegmentPtr {
        let mut head = SegmentPtr::UNDEFINED;
        let mut tail = SegmentPtr::UNDEFINED;
        for block in postings.chunks(BLOCK_SIZE) {
            let docids: Vec<u32> = block.iter().map(|&(d, _)| d).collect();
            let tfs: Vec<u32> = block.iter().map(|&(_, t)| t).collect();
            tail = pool.append_tfonly(&docids, &tfs, tail);
            if head.is_undefined() {
                head = tail;
            }
        }
        head
    }

    #[test]
    fn test_topk_keeps_best_and_breaks_ties_low_docid() {
        let mut topk = TopK::new(2);
        topk.push(10, 1.0);
        topk.push(11, 3.0);
        topk.push(12, 2.0);
        // Equal to the current threshold: the older entry stays.
        topk.push(13, 2.0);
        let results = topk.into_sorted();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].docid, 11);
        assert_eq!(results[1].docid, 12);
    }

    #[test]
    fn test_single_term_wand() {
        let mut pool = SegmentPool::with_limit(1 << 16, false, None);
        let postings: Vec<(u32, u32)> = vec![(1, 1), (4, 3), (9, 2)];
        let head = chain(&mut pool, &postings);
        let doc_lens = vec![10u32; 16];

        let weight = scorer::idf(100, 3);
        let ub = weight * scorer::bm25tf(3, 10, 10.0);
        let results = wand(&pool, &[head], &[ub], &[weight], &doc_lens, 10.0, 10, false);

        assert_eq!(results.len(), 3);
        // Highest tf wins with uniform doc lengths.
        assert_eq!(results[0].docid, 4);
    }

    #[test]
    fn test_wand_matches_exhaustive_baseline() {
        let mut pool = SegmentPool::with_limit(1 << 18, false, None);
        // Three terms over 60 documents of uniform length 8.
        let total_docs = 60u32;
        let doc_lens = vec![8u32; total_docs as usize + 1];
        let avgdl = 8.0f32;

        let t1: Vec<(u32, u32)> = (1..=60u32).filter(|d| d % 2 == 0).map(|d| (d, d % 3 + 1)).collect();
        let t2: Vec<(u32, u32)> = (1..=60u32).filter(|d| d % 3 == 0).map(|d| (d, d % 4 + 1)).collect();
        let t3: Vec<(u32, u32)> = (1..=60u32).filter(|d| d % 5 == 0).map(|d| (d, 1)).collect();

        let lists = [&t1, &t2, &t3];
        let heads: Vec<SegmentPtr> = lists.iter().map(|l| chain(&mut pool, l)).collect();
        let weights: Vec<f32> = lists
            .iter()
            .map(|l| scorer::idf(total_docs, l.len() as u32))
            .collect();
        let ubs: Vec<f32> = lists
            .iter()
            .zip(&weights)
            .map(|(l, &w)| {
                let max_tf = l.iter().map(|&(_, t)| t).max().unwrap();
                w * scorer::bm25tf(max_tf, 8, avgdl)
            })
            .collect();

        // Exhaustive baseline: score every document directly.
        let mut baseline: Vec<ScoredDoc> = (1..=total_docs)
            .filter_map(|d| {
                let mut score = 0.0f32;
                let mut matched = false;
                for (list, &w) in lists.iter().zip(&weights) {
                    if let Some(&(_, tf)) = list.iter().find(|&&(doc, _)| doc == d) {
                        score += w * scorer::bm25tf(tf, 8, avgdl);
                        matched = true;
                    }
                }
                matched.then_some(ScoredDoc { docid: d, score })
            })
            .collect();
        baseline.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap()
                .then(a.docid.cmp(&b.docid))
        });

        for k in [1usize, 2, 5, 10] {
            let results = wand(&pool, &heads, &ubs, &weights, &doc_lens, avgdl, k, false);
            assert_eq!(results.len(), k.min(baseline.len()));
            // Every returned doc is a real match carrying its true score.
            for got in &results {
                let want = baseline
                    .iter()
                    .find(|b| b.docid == got.docid)
                    .expect("docid not in baseline");
                assert!((got.score - want.score).abs() < 1e-4);
            }
            // And the returned scores are exactly the k best true scores
            // (docid order may differ among ties).
            for (got, want) in results.iter().zip(baseline.iter()) {
                assert!((got.score - want.score).abs() < 1e-4, "top-{} mismatch", k);
            }
        }
    }

    #[test]
    fn test_mbwand_scores_idf_sums() {
        let mut pool = SegmentPool::with_limit(1 << 16, false, None);
        let t1 = chain(&mut pool, &[(2, 1), (5, 1), (9, 1)]);
        let t2 = chain(&mut pool, &[(5, 1), (9, 1), (30, 1)]);
        let w1 = scorer::idf(100, 3);
        let w2 = scorer::idf(100, 3);
        let doc_lens = vec![5u32; 40];

        let results = wand(
            &pool,
            &[t1, t2],
            &[w1, w2],
            &[w1, w2],
            &doc_lens,
            5.0,
            2,
            true,
        );
        // Docs 5 and 9 carry both terms and outrank single-term docs.
        let docids: Vec<u32> = results.iter().map(|r| r.docid).collect();
        assert_eq!(docids, vec![5, 9]);
        assert!((results[0].score - (w1 + w2)).abs() < 1e-5);
    }

    #[test]
    fn test_wand_empty_and_zero_k() {
        let pool = SegmentPool::with_limit(1 << 10, false, None);
        assert!(wand(&pool, &[], &[], &[], &[], 1.0, 10, false).is_empty());

        let mut pool = SegmentPool::with_limit(1 << 10, false, None);
        let head = chain(&mut pool, &[(1, 1)]);
        let doc_lens = vec![3u32; 4];
        assert!(wand(&pool, &[head], &[1.0], &[1.0], &doc_lens, 3.0, 0, false).is_empty());
    }
}
