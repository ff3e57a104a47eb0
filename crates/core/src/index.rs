/// Index aggregate and directory-level persistence.
///
/// An index directory contains:
/// - index       — the segment pool (pool header + slabs)
/// - pointers    — the pointer directory
/// - dictionary  — the term dictionary
/// - vectors     — document vectors, when enabled
/// - meta.json   — human-readable summary of the build parameters

use crate::dictionary::Dictionary;
use crate::pointers::Pointers;
use crate::pool::{BloomConfig, SegmentPool};
use crate::vectors::DocumentVectors;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Default df threshold below which postings stay in small buffers.
pub const DF_CUTOFF: usize = 9;
/// Buffer capacity multiplier applied after each flush.
pub const EXPANSION_RATE: usize = 2;

pub const INDEX_FILE: &str = "index";
pub const POINTER_FILE: &str = "pointers";
pub const DICTIONARY_FILE: &str = "dictionary";
pub const VECTOR_FILE: &str = "vectors";
pub const META_FILE: &str = "meta.json";

/// What a posting carries beyond its docid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostingsMode {
    NonPositional,
    TfOnly,
    Positional,
}

/// Build parameters and corpus totals, serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub mode: PostingsMode,
    pub reverse: bool,
    pub bloom_enabled: bool,
    pub nb_hash: u32,
    pub bits_per_element: u32,
    pub total_docs: u32,
    pub total_terms: u32,
    pub total_doc_len: u64,
}

/// File paths within an index directory.
#[derive(Debug)]
pub struct IndexFiles {
    pub index: PathBuf,
    pub pointers: PathBuf,
    pub dictionary: PathBuf,
    pub vectors: PathBuf,
    pub meta: PathBuf,
}

pub fn index_files(dir: &Path) -> IndexFiles {
    IndexFiles {
        index: dir.join(INDEX_FILE),
        pointers: dir.join(POINTER_FILE),
        dictionary: dir.join(DICTIONARY_FILE),
        vectors: dir.join(VECTOR_FILE),
        meta: dir.join(META_FILE),
    }
}

/// The built index: segment pool, pointer directory, dictionary and
/// optional document vectors. Mutated only by the indexing driver; the
/// searcher treats it as read-only.
pub struct InvertedIndex {
    pub pool: SegmentPool,
    pub pointers: Pointers,
    pub dictionary: Dictionary,
    pub vectors: Option<DocumentVectors>,
    pub mode: PostingsMode,
}

impl InvertedIndex {
    pub fn new(
        mode: PostingsMode,
        reverse: bool,
        bloom: Option<BloomConfig>,
        document_vectors: bool,
    ) -> Self {
        Self {
            pool: SegmentPool::new(reverse, bloom),
            pointers: Pointers::new(),
            dictionary: Dictionary::new(),
            vectors: if document_vectors {
                Some(DocumentVectors::new())
            } else {
                None
            },
            mode,
        }
    }

    /// An index whose pool uses a reduced per-pool capacity.
    pub fn with_pool_limit(
        pool_limit: usize,
        mode: PostingsMode,
        reverse: bool,
        bloom: Option<BloomConfig>,
        document_vectors: bool,
    ) -> Self {
        Self {
            pool: SegmentPool::with_limit(pool_limit, reverse, bloom),
            pointers: Pointers::new(),
            dictionary: Dictionary::new(),
            vectors: if document_vectors {
                Some(DocumentVectors::new())
            } else {
                None
            },
            mode,
        }
    }

    pub fn meta(&self) -> IndexMeta {
        IndexMeta {
            mode: self.mode,
            reverse: self.pool.reverse(),
            bloom_enabled: self.pool.bloom().is_some(),
            nb_hash: self.pool.bloom().map_or(0, |b| b.nb_hash),
            bits_per_element: self.pool.bloom().map_or(0, |b| b.bits_per_element),
            total_docs: self.pointers.total_docs,
            total_terms: self.dictionary.term_count() as u32,
            total_doc_len: self.pointers.total_doc_len,
        }
    }

    /// Bulk-write every component into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        let files = index_files(dir);

        let mut w = BufWriter::new(fs::File::create(&files.index)?);
        self.pool.write(&mut w)?;

        let mut w = BufWriter::new(fs::File::create(&files.pointers)?);
        self.pointers.write(&mut w)?;

        let mut w = BufWriter::new(fs::File::create(&files.dictionary)?);
        self.dictionary.write(&mut w)?;

        if let Some(vectors) = &self.vectors {
            let mut w = BufWriter::new(fs::File::create(&files.vectors)?);
            vectors.write(&mut w)?;
        }

        let meta_json = serde_json::to_string_pretty(&self.meta())?;
        fs::write(&files.meta, meta_json)?;
        Ok(())
    }

    /// Bulk-load an index previously produced by `write`.
    pub fn read(dir: &Path) -> io::Result<InvertedIndex> {
        let files = index_files(dir);

        let meta_str = fs::read_to_string(&files.meta)?;
        let meta: IndexMeta = serde_json::from_str(&meta_str)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut r = BufReader::new(fs::File::open(&files.index)?);
        let pool = SegmentPool::read(&mut r)?;

        let mut r = BufReader::new(fs::File::open(&files.pointers)?);
        let pointers = Pointers::read(&mut r)?;

        let mut r = BufReader::new(fs::File::open(&files.dictionary)?);
        let dictionary = Dictionary::read(&mut r)?;

        let vectors = if files.vectors.exists() {
            let mut r = BufReader::new(fs::File::open(&files.vectors)?);
            Some(DocumentVectors::read(&mut r)?)
        } else {
            None
        };

        Ok(InvertedIndex {
            pool,
            pointers,
            dictionary,
            vectors,
            mode: meta.mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SegmentPtr;
    use std::path::PathBuf;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tern_test_idx_{}_{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_write_creates_all_files() {
        let dir = test_dir("write_files");
        let mut index = InvertedIndex::with_pool_limit(
            1 << 16,
            PostingsMode::TfOnly,
            false,
            None,
            true,
        );
        let t = index.dictionary.intern("hello") as usize;
        let head = index
            .pool
            .append_tfonly(&[1, 5, 9], &[1, 2, 1], SegmentPtr::UNDEFINED);
        index.pointers.set_head_ptr(t, head);
        index.vectors.as_mut().unwrap().add(1, &[0]);

        index.write(&dir).unwrap();
        let files = index_files(&dir);
        assert!(files.index.exists());
        assert!(files.pointers.exists());
        assert!(files.dictionary.exists());
        assert!(files.vectors.exists());
        assert!(files.meta.exists());

        let meta: IndexMeta =
            serde_json::from_str(&fs::read_to_string(&files.meta).unwrap()).unwrap();
        assert_eq!(meta.mode, PostingsMode::TfOnly);
        assert_eq!(meta.total_terms, 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_read_missing_directory_fails() {
        let dir = test_dir("missing");
        assert!(InvertedIndex::read(&dir).is_err());
    }

    #[test]
    fn test_roundtrip_components() {
        let dir = test_dir("roundtrip");
        let mut index =
            InvertedIndex::with_pool_limit(1 << 16, PostingsMode::NonPositional, false, None, false);
        let t = index.dictionary.intern("term") as usize;
        let docids: Vec<u32> = (1..=60u32).map(|i| i * 2).collect();
        let head = index.pool.append_nonpositional(&docids, SegmentPtr::UNDEFINED);
        index.pointers.set_head_ptr(t, head);
        for &d in &docids {
            index.pointers.add_df(t);
            index.pointers.add_cf(t);
            index.pointers.set_doc_len(d as usize, 10);
        }
        index.pointers.total_docs = 60;
        index.pointers.total_doc_len = 600;

        index.write(&dir).unwrap();
        let reread = InvertedIndex::read(&dir).unwrap();

        assert_eq!(reread.mode, PostingsMode::NonPositional);
        assert_eq!(reread.dictionary.lookup("term"), Some(0));
        assert_eq!(reread.pointers.df(t), 60);
        assert_eq!(reread.pointers.head_ptr(t), head);
        assert!(reread.vectors.is_none());

        let mut out = [0u32; crate::codec::BLOCK_SIZE];
        let n = reread.pool.decode_docid_block(reread.pointers.head_ptr(t), &mut out);
        assert_eq!(&out[..n], &docids[..]);

        let _ = fs::remove_dir_all(&dir);
    }
}
