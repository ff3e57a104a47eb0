/// The indexing driver: turns tokenised document lines into segment-pool
/// chains.
///
/// Input is one document per line, `"<docid>\t<tok1> <tok2> ..."`, with
/// positions starting at 1. Per document the driver interns tokens, bumps
/// collection frequencies and staging buffers, then walks the document's
/// unique terms: rare terms (df below the cutoff) accumulate in small
/// buffers, promoted terms append into block buffers that get compressed
/// into the pool whenever they fill. `finish` flushes what remains of the
/// promoted terms; sub-cutoff buffers are dropped, their df/cf statistics
/// stay.

use crate::buffers::BufferMaps;
use crate::codec::BLOCK_SIZE;
use crate::index::{InvertedIndex, PostingsMode, DF_CUTOFF, EXPANSION_RATE};
use crate::pool::{BloomConfig, MAX_INT_VALUE};
use crate::scorer;
use rustc_hash::FxHashSet;
use std::io;

/// Build parameters for an index run.
#[derive(Clone, Copy, Debug)]
pub struct WriterConfig {
    pub mode: PostingsMode,
    pub reverse: bool,
    pub bloom: Option<BloomConfig>,
    pub document_vectors: bool,
    pub df_cutoff: usize,
    /// Buffer ceiling per term, in postings. More than one block enables
    /// buffer doubling after each flush.
    pub max_blocks: usize,
    /// Per-pool slab capacity in words.
    pub pool_limit: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            mode: PostingsMode::NonPositional,
            reverse: false,
            bloom: None,
            document_vectors: false,
            df_cutoff: DF_CUTOFF,
            max_blocks: BLOCK_SIZE,
            pool_limit: MAX_INT_VALUE as usize,
        }
    }
}

pub struct IndexWriter {
    index: InvertedIndex,
    buffers: BufferMaps,
    /// Unique term ids of the current document, in first-seen order.
    unique_terms: Vec<u32>,
    seen: FxHashSet<u32>,
    doc_vector: Vec<u32>,
    expansion_enabled: bool,
    max_blocks: usize,
}

impl IndexWriter {
    pub fn new(config: WriterConfig) -> Self {
        assert!(
            config.df_cutoff < BLOCK_SIZE,
            "df cutoff must stay below the block size"
        );
        let index = InvertedIndex::with_pool_limit(
            config.pool_limit,
            config.mode,
            config.reverse,
            config.bloom,
            config.document_vectors,
        );
        Self {
            index,
            buffers: BufferMaps::new(config.mode, config.df_cutoff),
            unique_terms: Vec::new(),
            seen: FxHashSet::default(),
            doc_vector: Vec::new(),
            expansion_enabled: config.max_blocks > BLOCK_SIZE,
            max_blocks: config.max_blocks,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.index.pointers.total_docs
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub(crate) fn buffers(&self) -> &BufferMaps {
        &self.buffers
    }

    /// Parse and index one `"<docid>\t<tokens...>"` line. Malformed lines
    /// fail before any posting is applied.
    pub fn process_line(&mut self, line: &str) -> io::Result<()> {
        let (docid_str, body) = line.split_once('\t').ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("document line missing docid separator: {:?}", line),
            )
        })?;
        let docid: u32 = docid_str.trim().parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("document id is not numeric: {:?}", docid_str),
            )
        })?;
        self.process_document(docid, body.split_whitespace());
        Ok(())
    }

    /// Index one document given its id and token stream.
    pub fn process_document<'b>(&mut self, docid: u32, tokens: impl Iterator<Item = &'b str>) {
        let mode = self.index.mode;
        self.seen.clear();
        self.unique_terms.clear();
        self.doc_vector.clear();

        let mut position: u32 = 1;
        for token in tokens {
            let id = self.index.dictionary.intern(token);
            let t = id as usize;
            let first_occurrence = self.seen.insert(id);
            if first_occurrence {
                self.unique_terms.push(id);
            }
            self.index.pointers.add_cf(t);
            if self.index.vectors.is_some() {
                self.doc_vector.push(id);
            }

            match mode {
                PostingsMode::NonPositional => {}
                PostingsMode::TfOnly => {
                    self.buffers.init_term(t);
                    let vp = self.buffers.value_position[t] as usize;
                    self.buffers.tf[t][vp] += 1;
                }
                PostingsMode::Positional => {
                    self.buffers.init_term(t);
                    let vp = self.buffers.value_position[t] as usize;
                    self.buffers.tf[t][vp] += 1;

                    let pb = self.buffers.pvalue_position[t] as usize;
                    self.buffers.grow_position(t, pb + 1);
                    let buf = &mut self.buffers.position[t];
                    if first_occurrence {
                        buf[pb] = position;
                    } else {
                        // Replace the remembered raw position with the gap.
                        buf[pb] = position - buf[pb];
                    }
                    // Tentative raw position, consumed by the next gap.
                    buf[pb + 1] = position;
                    self.buffers.pvalue_position[t] += 1;
                    let ps = self.buffers.psum[t] as usize;
                    self.buffers.position[t][ps] += 1;
                }
            }
            position += 1;
        }

        let doc_len = position - 1;
        self.index.pointers.set_doc_len(docid as usize, doc_len);
        self.index.pointers.total_doc_len += doc_len as u64;
        self.index.pointers.total_docs += 1;
        if let Some(vectors) = &mut self.index.vectors {
            vectors.add(docid, &self.doc_vector);
        }

        let avg_doc_len = self.index.pointers.avg_doc_len();
        let unique = std::mem::take(&mut self.unique_terms);
        for &id in &unique {
            let t = id as usize;

            if mode != PostingsMode::NonPositional {
                let vp = self.buffers.value_position[t] as usize;
                let tf = self.buffers.tf[t][vp];
                let current = scorer::bm25tf(tf, doc_len, avg_doc_len);
                let recorded = scorer::bm25tf(
                    self.index.pointers.max_tf(t),
                    self.index.pointers.max_tf_doc_len(t),
                    avg_doc_len,
                );
                if current > recorded {
                    self.index.pointers.set_max_tf(t, tf, doc_len);
                }
            }
            if mode == PostingsMode::Positional {
                // Clear the trailing raw-position scratch slot.
                let pb = self.buffers.pvalue_position[t] as usize;
                self.buffers.position[t][pb] = 0;
            }

            let df = self.index.pointers.df(t) as usize;
            if df < self.buffers.df_cutoff {
                self.buffers.init_term(t);
                let vp = self.buffers.value_position[t] as usize;
                self.buffers.docid[t][vp] = docid;
                self.buffers.value_position[t] += 1;
                self.index.pointers.add_df(t);
                continue;
            }

            self.buffers.init_term(t);
            if self.buffers.capacity(t) < BLOCK_SIZE {
                self.buffers.promote_to_block(t);
            }
            let vp = self.buffers.value_position[t] as usize;
            self.buffers.docid[t][vp] = docid;
            self.buffers.value_position[t] += 1;
            self.index.pointers.add_df(t);

            if mode == PostingsMode::Positional
                && self.buffers.value_position[t] as usize % BLOCK_SIZE == 0
            {
                // The next position-count slot opens where the scratch sat.
                self.buffers.psum[t] = self.buffers.pvalue_position[t];
                self.buffers.pvalue_position[t] += 1;
            }

            if self.buffers.value_position[t] as usize >= self.buffers.capacity(t) {
                self.flush_term(t, self.buffers.capacity(t));
                self.reset_buffers(t);
            }
        }
        self.unique_terms = unique;
    }

    /// Compress `total` buffered postings of term `t` into the pool, one
    /// segment per block plus a final short block, updating the tail and
    /// (for a first write, or on every write in reverse mode) the head.
    fn flush_term(&mut self, t: usize, total: usize) {
        let mode = self.index.mode;
        let full_blocks = total / BLOCK_SIZE;
        let residue = total % BLOCK_SIZE;
        let mut pointer = self.buffers.tail[t];
        let mut ps = 0usize;

        for j in 0..=full_blocks {
            let (start, len) = if j < full_blocks {
                (j * BLOCK_SIZE, BLOCK_SIZE)
            } else {
                (full_blocks * BLOCK_SIZE, residue)
            };
            if len == 0 {
                break;
            }
            let docids = &self.buffers.docid[t][start..start + len];
            pointer = match mode {
                PostingsMode::NonPositional => {
                    self.index.pool.append_nonpositional(docids, pointer)
                }
                PostingsMode::TfOnly => self.index.pool.append_tfonly(
                    docids,
                    &self.buffers.tf[t][start..start + len],
                    pointer,
                ),
                PostingsMode::Positional => {
                    let count = self.buffers.position[t][ps] as usize;
                    let runs = &self.buffers.position[t][ps + 1..ps + 1 + count];
                    let new = self.index.pool.append_positional(
                        docids,
                        &self.buffers.tf[t][start..start + len],
                        runs,
                        pointer,
                    );
                    ps += count + 1;
                    new
                }
            };
            if self.index.pool.reverse() || self.index.pointers.head_ptr(t).is_undefined() {
                self.index.pointers.set_head_ptr(t, pointer);
            }
        }
        self.buffers.tail[t] = pointer;
    }

    /// Post-flush bookkeeping: optional capacity doubling, then zeroed
    /// buffers and reset write indices.
    fn reset_buffers(&mut self, t: usize) {
        let mode = self.index.mode;
        let capacity = self.buffers.capacity(t);
        if self.expansion_enabled && capacity < self.max_blocks {
            let target = capacity * EXPANSION_RATE;
            self.buffers.docid[t] = vec![0; target];
            if mode != PostingsMode::NonPositional {
                self.buffers.tf[t] = vec![0; target];
            }
        } else {
            self.buffers.docid[t].fill(0);
            if mode != PostingsMode::NonPositional {
                self.buffers.tf[t].fill(0);
            }
        }
        self.buffers.value_position[t] = 0;
        if mode == PostingsMode::Positional {
            self.buffers.position[t].fill(0);
            self.buffers.pvalue_position[t] = 1;
            self.buffers.psum[t] = 0;
        }
    }

    /// Flush the pending postings of every promoted term and hand over the
    /// built index.
    pub fn finish(mut self) -> InvertedIndex {
        let promoted: Vec<usize> = self.buffers.promoted_terms().collect();
        for t in promoted {
            let pending = self.buffers.value_position[t] as usize;
            if pending > 0 {
                self.flush_term(t, pending);
            }
        }
        self.index
    }
}
