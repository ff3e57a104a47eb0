/// Read-only query evaluation over a built index.
///
/// The searcher owns an `InvertedIndex` and never mutates it. Every
/// algorithm shares the same preamble: query terms missing from the
/// dictionary or with no posting chain are dropped, the rest are sorted by
/// ascending df, and their head pointers, dfs and upper bounds fetched.
/// Empty queries after dropping evaluate to no hits.

use crate::bwand;
use crate::index::InvertedIndex;
use crate::pool::SegmentPtr;
use crate::scorer;
use crate::svs;
use crate::wand;
use std::fs;
use std::io;
use std::path::Path;

/// Default result count for the disjunctive algorithms; the conjunctive
/// ones default to the smallest df in the query.
const DEFAULT_HITS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Svs,
    Wand,
    Mbwand,
    BwandOr,
    BwandAnd,
}

impl Algorithm {
    /// Parse a CLI algorithm name (case sensitive).
    pub fn parse(name: &str) -> Option<Algorithm> {
        match name {
            "SvS" => Some(Algorithm::Svs),
            "WAND" => Some(Algorithm::Wand),
            "MBWAND" => Some(Algorithm::Mbwand),
            "BWAND_OR" => Some(Algorithm::BwandOr),
            "BWAND_AND" => Some(Algorithm::BwandAnd),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Svs => "SvS",
            Algorithm::Wand => "WAND",
            Algorithm::Mbwand => "MBWAND",
            Algorithm::BwandOr => "BWAND_OR",
            Algorithm::BwandAnd => "BWAND_AND",
        }
    }
}

/// One ranked retrieval result.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit {
    pub docid: u32,
    pub score: f32,
}

pub struct Searcher {
    index: InvertedIndex,
}

impl Searcher {
    /// Load an index directory produced by the indexer.
    pub fn open(dir: &Path) -> io::Result<Self> {
        Ok(Self {
            index: InvertedIndex::read(dir)?,
        })
    }

    /// Wrap an already-built index.
    pub fn new(index: InvertedIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    /// Evaluate a bag-of-words query. `hits` falls back to the
    /// algorithm-specific default when not given.
    pub fn evaluate(
        &self,
        terms: &[String],
        algorithm: Algorithm,
        hits: Option<usize>,
    ) -> io::Result<Vec<SearchHit>> {
        let pointers = &self.index.pointers;
        let mut ids: Vec<usize> = terms
            .iter()
            .filter_map(|t| self.index.dictionary.lookup(t))
            .map(|id| id as usize)
            .filter(|&t| !pointers.head_ptr(t).is_undefined())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        ids.sort_by_key(|&t| pointers.df(t));

        let heads: Vec<SegmentPtr> = ids.iter().map(|&t| pointers.head_ptr(t)).collect();
        let dfs: Vec<u32> = ids.iter().map(|&t| pointers.df(t)).collect();
        let min_df = dfs[0] as usize;
        let total_docs = pointers.total_docs;
        let avg_doc_len = pointers.avg_doc_len();

        match algorithm {
            Algorithm::Svs => {
                let hits = hits.unwrap_or(min_df);
                let set = svs::intersect_svs(&self.index.pool, &heads, hits);
                Ok(rank_only_hits(set))
            }
            Algorithm::Wand | Algorithm::Mbwand => {
                if algorithm == Algorithm::Wand && !self.index.pool.has_tf() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "WAND needs an index with term frequencies; use MBWAND",
                    ));
                }
                let hits = hits.unwrap_or(DEFAULT_HITS);
                let weights: Vec<f32> =
                    dfs.iter().map(|&df| scorer::idf(total_docs, df)).collect();
                let upper_bounds: Vec<f32> = match algorithm {
                    Algorithm::Wand => ids
                        .iter()
                        .zip(&weights)
                        .map(|(&t, &w)| {
                            w * scorer::bm25tf(
                                pointers.max_tf(t),
                                pointers.max_tf_doc_len(t),
                                avg_doc_len,
                            )
                        })
                        .collect(),
                    _ => weights.clone(),
                };
                let results = wand::wand(
                    &self.index.pool,
                    &heads,
                    &upper_bounds,
                    &weights,
                    pointers.doc_lens(),
                    avg_doc_len,
                    hits,
                    algorithm == Algorithm::Mbwand,
                );
                Ok(results
                    .into_iter()
                    .map(|r| SearchHit {
                        docid: r.docid,
                        score: r.score,
                    })
                    .collect())
            }
            Algorithm::BwandOr => {
                self.require_bloom()?;
                let hits = hits.unwrap_or(DEFAULT_HITS);
                let weights: Vec<f32> =
                    dfs.iter().map(|&df| scorer::idf(total_docs, df)).collect();
                let results = bwand::bwand_or(&self.index.pool, &heads, &weights, hits);
                Ok(results
                    .into_iter()
                    .map(|r| SearchHit {
                        docid: r.docid,
                        score: r.score,
                    })
                    .collect())
            }
            Algorithm::BwandAnd => {
                self.require_bloom()?;
                let hits = hits.unwrap_or(min_df);
                let set = bwand::bwand_and(&self.index.pool, &heads, hits);
                Ok(rank_only_hits(set))
            }
        }
    }

    fn require_bloom(&self) -> io::Result<()> {
        if self.index.pool.bloom().is_none() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Bloom-chain algorithms need an index built with filters",
            ));
        }
        Ok(())
    }
}

/// Hits for set-valued algorithms: rank order is the set order, scores
/// descend so downstream consumers keep it.
fn rank_only_hits(set: Vec<u32>) -> Vec<SearchHit> {
    let n = set.len();
    set.into_iter()
        .enumerate()
        .map(|(rank, docid)| SearchHit {
            docid,
            score: (n - rank) as f32,
        })
        .collect()
}

/// Parse a query file: a query count line, then per query
/// `"<qid> <qlen> <tok1> ... <toklen>"`, whitespace separated.
pub fn read_queries(path: &Path) -> io::Result<Vec<(u32, Vec<String>)>> {
    let text = fs::read_to_string(path)?;
    let mut tokens = text.split_whitespace();
    let bad = |what: &str| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed query file: {}", what),
        )
    };

    let total: usize = tokens
        .next()
        .ok_or_else(|| bad("missing query count"))?
        .parse()
        .map_err(|_| bad("query count is not numeric"))?;

    let mut queries = Vec::with_capacity(total);
    for _ in 0..total {
        let qid: u32 = tokens
            .next()
            .ok_or_else(|| bad("missing query id"))?
            .parse()
            .map_err(|_| bad("query id is not numeric"))?;
        let qlen: usize = tokens
            .next()
            .ok_or_else(|| bad("missing query length"))?
            .parse()
            .map_err(|_| bad("query length is not numeric"))?;
        let mut terms = Vec::with_capacity(qlen);
        for _ in 0..qlen {
            terms.push(
                tokens
                    .next()
                    .ok_or_else(|| bad("query shorter than its declared length"))?
                    .to_string(),
            );
        }
        queries.push((qid, terms));
    }
    Ok(queries)
}
