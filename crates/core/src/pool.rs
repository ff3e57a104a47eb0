/// The segment pool: an append-only slab store for compressed postings.
///
/// A pool is a flat u32 slab. Segments are variable-length records appended
/// sequentially; when the next segment would not fit, the writer advances to
/// a fresh pool, up to NUMBER_OF_POOLS. Segment layout (u32 words, relative
/// to the segment start):
///   [0] total length in words including this header (reqspace)
///   [1] forward-link pool index, or UNKNOWN_POOL if last
///   [2] forward-link offset within that pool
///   [3] max docid in this segment (min docid in reverse mode)
///   [4] offset at which the optional Bloom filter length word sits
///   [5] number of documents in this segment (<= BLOCK_SIZE)
///   [6] compressed docid size csize
///   [7 .. 7+csize]  compressed docid block
///   then, tf-bearing segments: tfcsize, compressed tf block
///   then, positional segments: plen, block count, and per sub-block a
///   length word followed by the compressed positions
///   then, Bloom-bearing segments: filterSize followed by the filter words
///
/// A term's chain is the linked list formed by words [1]/[2]. In forward
/// mode appends grow the tail (the previous tail is patched to point at the
/// new segment); in reverse mode they grow the head (the new segment points
/// back at the previous one), so traversal sees the newest block first.

use crate::bloom;
use crate::codec::{self, BLOCK_SIZE};
use std::io::{self, Read, Seek, SeekFrom, Write};

/// Slab capacity of a single pool, in u32 words.
pub const MAX_INT_VALUE: u32 = 0xFFFF_FFFF;
/// Number of pools a store may grow to before appends become fatal.
pub const NUMBER_OF_POOLS: usize = 4;

/// Chain terminator stored in segment word [1].
const UNKNOWN_POOL: u32 = u32::MAX;

/// Words in the persisted pool header.
const HEADER_WORDS: u64 = 7;

/// Packed (pool index, offset) reference to a segment.
/// The high 32 bits are the pool index, the low 32 the word offset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SegmentPtr(u64);

impl SegmentPtr {
    /// "No such segment".
    pub const UNDEFINED: SegmentPtr = SegmentPtr(u64::MAX);

    pub fn new(pool: u32, offset: u32) -> Self {
        SegmentPtr(((pool as u64) << 32) | offset as u64)
    }

    pub fn pool(self) -> usize {
        (self.0 >> 32) as usize
    }

    pub fn offset(self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }

    pub fn is_undefined(self) -> bool {
        self.0 == u64::MAX
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        SegmentPtr(raw)
    }
}

/// Bloom filter parameters carried by a pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BloomConfig {
    pub nb_hash: u32,
    pub bits_per_element: u32,
}

/// Values of the persisted pool header, readable without loading pool data.
#[derive(Clone, Copy, Debug)]
pub struct PoolHeader {
    pub full_pools: u32,
    pub offset: u32,
    pub reverse: bool,
    pub bloom: Option<BloomConfig>,
    pub limit: u32,
}

pub struct SegmentPool {
    pools: Vec<Vec<u32>>,
    /// Index of the pool currently being appended to.
    current: usize,
    /// Next free word offset in the current pool.
    offset: usize,
    /// Capacity of each pool in words.
    limit: usize,
    reverse: bool,
    bloom: Option<BloomConfig>,
}

pub(crate) fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn write_u64<W: Write>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub(crate) fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

impl SegmentPool {
    pub fn new(reverse: bool, bloom: Option<BloomConfig>) -> Self {
        Self::with_limit(MAX_INT_VALUE as usize, reverse, bloom)
    }

    /// A pool with a reduced per-pool capacity. Pools are lazily grown, so
    /// the full capacity is only ever touched by what gets appended.
    pub fn with_limit(limit: usize, reverse: bool, bloom: Option<BloomConfig>) -> Self {
        Self {
            pools: vec![Vec::new()],
            current: 0,
            offset: 0,
            limit,
            reverse,
            bloom,
        }
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    pub fn bloom(&self) -> Option<BloomConfig> {
        self.bloom
    }

    pub fn is_empty(&self) -> bool {
        self.current == 0 && self.offset == 0
    }

    /// Chain-order comparison: does docid `a` come before `b` when walking
    /// a chain of this pool?
    pub fn precedes(&self, a: u32, b: u32) -> bool {
        if self.reverse {
            a > b
        } else {
            a < b
        }
    }

    /// Reserve `reqspace` words, advancing to the next pool when the current
    /// one cannot fit the segment. Returns the segment's (pool, offset).
    fn alloc(&mut self, reqspace: usize) -> (usize, usize) {
        if self.offset + reqspace > self.limit {
            self.current += 1;
            if self.current >= NUMBER_OF_POOLS {
                panic!("segment pool exhausted: more than {} pools required", NUMBER_OF_POOLS);
            }
            self.offset = 0;
            if self.pools.len() <= self.current {
                self.pools.push(Vec::new());
            }
        }
        let at = (self.current, self.offset);
        let end = self.offset + reqspace;
        if self.pools[self.current].len() < end {
            self.pools[self.current].resize(end, 0);
        }
        self.offset = end;
        at
    }

    fn build_filter(&self, docids: &[u32]) -> Option<Vec<u32>> {
        self.bloom.map(|cfg| {
            let mut filter =
                vec![0u32; bloom::filter_word_count(docids.len(), cfg.bits_per_element)];
            for &d in docids {
                bloom::insert(&mut filter, cfg.nb_hash, d);
            }
            filter
        })
    }

    /// Patch chain links for a freshly written segment and return its pointer.
    fn link(&mut self, tail: SegmentPtr, s: usize, off: usize) -> SegmentPtr {
        if !tail.is_undefined() {
            if self.reverse {
                self.pools[s][off + 1] = tail.pool() as u32;
                self.pools[s][off + 2] = tail.offset() as u32;
            } else {
                let (ts, to) = (tail.pool(), tail.offset());
                self.pools[ts][to + 1] = s as u32;
                self.pools[ts][to + 2] = off as u32;
            }
        }
        SegmentPtr::new(s as u32, off as u32)
    }

    /// Compress and append a docid-only segment, linking it to `tail`.
    pub fn append_nonpositional(&mut self, docids: &[u32], tail: SegmentPtr) -> SegmentPtr {
        let n = docids.len();
        let filter = self.build_filter(docids);
        let max_doc = if self.reverse { docids[0] } else { docids[n - 1] };

        let mut ids = docids.to_vec();
        if self.reverse {
            ids.reverse();
        }
        let compressed = codec::encode(&ids, true, self.reverse);
        let csize = compressed.len();
        let fsize = filter.as_ref().map_or(0, |f| f.len());

        let reqspace = csize + fsize + 8;
        let (s, off) = self.alloc(reqspace);
        let seg = &mut self.pools[s][off..off + reqspace];
        seg[0] = reqspace as u32;
        seg[1] = UNKNOWN_POOL;
        seg[2] = 0;
        seg[3] = max_doc;
        seg[4] = (csize + 7) as u32;
        seg[5] = n as u32;
        seg[6] = csize as u32;
        seg[7..7 + csize].copy_from_slice(&compressed);
        if let Some(f) = &filter {
            seg[7 + csize] = f.len() as u32;
            seg[8 + csize..8 + csize + f.len()].copy_from_slice(f);
        }
        self.link(tail, s, off)
    }

    /// Compress and append a docid+tf segment, linking it to `tail`.
    pub fn append_tfonly(&mut self, docids: &[u32], tfs: &[u32], tail: SegmentPtr) -> SegmentPtr {
        let n = docids.len();
        let filter = self.build_filter(docids);
        let max_doc = if self.reverse { docids[0] } else { docids[n - 1] };

        let mut ids = docids.to_vec();
        let mut freqs = tfs[..n].to_vec();
        if self.reverse {
            ids.reverse();
            freqs.reverse();
        }
        let compressed = codec::encode(&ids, true, self.reverse);
        let tf_compressed = codec::encode(&freqs, false, false);
        let csize = compressed.len();
        let tfcsize = tf_compressed.len();
        let fsize = filter.as_ref().map_or(0, |f| f.len());

        let reqspace = csize + tfcsize + fsize + 9;
        let (s, off) = self.alloc(reqspace);
        let seg = &mut self.pools[s][off..off + reqspace];
        seg[0] = reqspace as u32;
        seg[1] = UNKNOWN_POOL;
        seg[2] = 0;
        seg[3] = max_doc;
        seg[4] = (csize + tfcsize + 8) as u32;
        seg[5] = n as u32;
        seg[6] = csize as u32;
        seg[7..7 + csize].copy_from_slice(&compressed);
        seg[7 + csize] = tfcsize as u32;
        seg[8 + csize..8 + csize + tfcsize].copy_from_slice(&tf_compressed);
        if let Some(f) = &filter {
            seg[8 + csize + tfcsize] = f.len() as u32;
            seg[9 + csize + tfcsize..9 + csize + tfcsize + f.len()].copy_from_slice(f);
        }
        self.link(tail, s, off)
    }

    /// Compress and append a positional segment, linking it to `tail`.
    ///
    /// `positions` holds the gap-encoded position runs of the block's
    /// documents, concatenated in document order; run lengths are `tfs`.
    pub fn append_positional(
        &mut self,
        docids: &[u32],
        tfs: &[u32],
        positions: &[u32],
        tail: SegmentPtr,
    ) -> SegmentPtr {
        let n = docids.len();
        let filter = self.build_filter(docids);
        let max_doc = if self.reverse { docids[0] } else { docids[n - 1] };

        let mut ids = docids.to_vec();
        let mut freqs = tfs[..n].to_vec();
        let mut runs = positions.to_vec();
        if self.reverse {
            // Rewrite the position runs in the new document order, keeping
            // within-document order.
            let mut reordered = Vec::with_capacity(runs.len());
            let mut end = runs.len();
            for i in (0..n).rev() {
                let t = freqs[i] as usize;
                reordered.extend_from_slice(&runs[end - t..end]);
                end -= t;
            }
            runs = reordered;
            ids.reverse();
            freqs.reverse();
        }

        let compressed = codec::encode(&ids, true, self.reverse);
        let tf_compressed = codec::encode(&freqs, false, false);
        let mut pblock: Vec<u32> = Vec::new();
        let mut nb = 0u32;
        for chunk in runs.chunks(BLOCK_SIZE) {
            let c = codec::encode(chunk, false, false);
            pblock.push(c.len() as u32);
            pblock.extend_from_slice(&c);
            nb += 1;
        }
        let csize = compressed.len();
        let tfcsize = tf_compressed.len();
        let pcsize = pblock.len();
        let fsize = filter.as_ref().map_or(0, |f| f.len());

        let reqspace = csize + tfcsize + pcsize + fsize + 11;
        let (s, off) = self.alloc(reqspace);
        let seg = &mut self.pools[s][off..off + reqspace];
        seg[0] = reqspace as u32;
        seg[1] = UNKNOWN_POOL;
        seg[2] = 0;
        seg[3] = max_doc;
        seg[4] = (csize + tfcsize + pcsize + 10) as u32;
        seg[5] = n as u32;
        seg[6] = csize as u32;
        seg[7..7 + csize].copy_from_slice(&compressed);
        seg[7 + csize] = tfcsize as u32;
        seg[8 + csize..8 + csize + tfcsize].copy_from_slice(&tf_compressed);
        seg[8 + csize + tfcsize] = runs.len() as u32;
        seg[9 + csize + tfcsize] = nb;
        seg[10 + csize + tfcsize..10 + csize + tfcsize + pcsize].copy_from_slice(&pblock);
        if let Some(f) = &filter {
            seg[10 + csize + tfcsize + pcsize] = f.len() as u32;
            seg[11 + csize + tfcsize + pcsize..11 + csize + tfcsize + pcsize + f.len()]
                .copy_from_slice(f);
        }
        self.link(tail, s, off)
    }

    fn seg(&self, ptr: SegmentPtr) -> &[u32] {
        &self.pools[ptr.pool()][ptr.offset()..]
    }

    /// Follow a segment's forward link. UNDEFINED at the end of the chain.
    pub fn next(&self, ptr: SegmentPtr) -> SegmentPtr {
        if ptr.is_undefined() {
            return SegmentPtr::UNDEFINED;
        }
        let seg = self.seg(ptr);
        if seg[1] == UNKNOWN_POOL {
            SegmentPtr::UNDEFINED
        } else {
            SegmentPtr::new(seg[1], seg[2])
        }
    }

    /// Max docid represented by the segment (min docid in reverse mode).
    pub fn max_doc(&self, ptr: SegmentPtr) -> u32 {
        self.seg(ptr)[3]
    }

    /// Number of documents in the segment.
    pub fn doc_count(&self, ptr: SegmentPtr) -> usize {
        self.seg(ptr)[5] as usize
    }

    /// Decompress the segment's docid block. Returns the document count.
    pub fn decode_docid_block(&self, ptr: SegmentPtr, out: &mut [u32; BLOCK_SIZE]) -> usize {
        let seg = self.seg(ptr);
        let csize = seg[6] as usize;
        codec::decode(&seg[7..7 + csize], true, self.reverse, out);
        seg[5] as usize
    }

    /// Decompress the segment's tf block. Returns the document count.
    pub fn decode_tf_block(&self, ptr: SegmentPtr, out: &mut [u32; BLOCK_SIZE]) -> usize {
        let seg = self.seg(ptr);
        let csize = seg[6] as usize;
        let tfcsize = seg[7 + csize] as usize;
        codec::decode(&seg[8 + csize..8 + csize + tfcsize], false, false, out);
        seg[5] as usize
    }

    /// Number of position sub-blocks stored in the segment.
    pub fn position_block_count(&self, ptr: SegmentPtr) -> usize {
        let seg = self.seg(ptr);
        let csize = seg[6] as usize;
        let tfcsize = seg[7 + csize] as usize;
        seg[9 + csize + tfcsize] as usize
    }

    /// Decompress every position sub-block into `out`, which must hold
    /// `position_block_count(ptr) * BLOCK_SIZE` words. Returns the total
    /// number of positions.
    pub fn decode_position_block(&self, ptr: SegmentPtr, out: &mut [u32]) -> usize {
        let seg = self.seg(ptr);
        let csize = seg[6] as usize;
        let tfcsize = seg[7 + csize] as usize;
        let plen = seg[8 + csize + tfcsize] as usize;
        let nb = seg[9 + csize + tfcsize] as usize;

        let mut idx = 10 + csize + tfcsize;
        let mut tmp = [0u32; BLOCK_SIZE];
        for i in 0..nb {
            let sb = seg[idx] as usize;
            codec::decode(&seg[idx + 1..idx + 1 + sb], false, false, &mut tmp);
            out[i * BLOCK_SIZE..(i + 1) * BLOCK_SIZE].copy_from_slice(&tmp);
            idx += sb + 1;
        }
        plen
    }

    /// Recover the position list of the `index`-th document in the segment
    /// and ungap it. `tfs` is the segment's decoded tf block; `out` must
    /// hold `tfs[index]` words.
    pub fn decode_positions_for(
        &self,
        ptr: SegmentPtr,
        tfs: &[u32],
        index: usize,
        out: &mut [u32],
    ) {
        let seg = self.seg(ptr);
        let csize = seg[6] as usize;
        let tfcsize = seg[7 + csize] as usize;

        let tf = tfs[index] as usize;
        let skip: usize = tfs[..index].iter().map(|&t| t as usize).sum();
        let first_block = skip / BLOCK_SIZE;
        let last_block = (skip + tf - 1) / BLOCK_SIZE;

        let mut pos = 10 + csize + tfcsize;
        for _ in 0..first_block {
            pos += seg[pos] as usize + 1;
        }

        let mut written = 0;
        let mut remaining = tf;
        let mut take = tf;
        let mut start = skip % BLOCK_SIZE;
        let mut tmp = [0u32; BLOCK_SIZE];
        for _ in first_block..=last_block {
            if start + take > BLOCK_SIZE {
                take = BLOCK_SIZE - start;
            }
            let sb = seg[pos] as usize;
            codec::decode(&seg[pos + 1..pos + 1 + sb], false, false, &mut tmp);
            out[written..written + take].copy_from_slice(&tmp[start..start + take]);
            pos += sb + 1;
            written += take;
            remaining -= take;
            take = remaining;
            start = 0;
        }
        for i in 1..tf {
            out[i] += out[i - 1];
        }
    }

    /// Bloom-chain membership test. Walks forward until a segment whose
    /// max docid could cover `docid`, then answers with an exact max-docid
    /// match or a filter probe. `ptr` is updated to the segment tested, or
    /// UNDEFINED when the chain ends first.
    pub fn contains_docid(&self, docid: u32, ptr: &mut SegmentPtr) -> bool {
        if ptr.is_undefined() {
            return false;
        }
        let cfg = match self.bloom {
            Some(cfg) => cfg,
            None => return false,
        };
        let (mut s, mut off) = (ptr.pool(), ptr.offset());
        while self.precedes(self.pools[s][off + 3], docid) {
            let ns = self.pools[s][off + 1];
            let no = self.pools[s][off + 2];
            if ns == UNKNOWN_POOL {
                *ptr = SegmentPtr::UNDEFINED;
                return false;
            }
            s = ns as usize;
            off = no as usize;
        }
        *ptr = SegmentPtr::new(s as u32, off as u32);
        if self.pools[s][off + 3] == docid {
            return true;
        }
        let boff = off + self.pools[s][off + 4] as usize;
        let fsize = self.pools[s][boff] as usize;
        bloom::contains(&self.pools[s][boff + 1..boff + 1 + fsize], cfg.nb_hash, docid)
    }

    /// Whether segments carry a tf block, inferred from the first segment's
    /// header arithmetic.
    pub fn has_tf(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let seg = &self.pools[0];
        let csize = seg[6] as usize;
        seg[4] as usize != csize + 7
    }

    /// Whether segments carry position blocks.
    pub fn is_positional(&self) -> bool {
        if !self.has_tf() {
            return false;
        }
        let seg = &self.pools[0];
        let csize = seg[6] as usize;
        let tfcsize = seg[7 + csize] as usize;
        seg[4] as usize != csize + tfcsize + 8
    }

    /// Bulk persistence: header words, each full pool padded to the pool
    /// limit, then the used prefix of the active pool.
    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_u32(w, self.current as u32)?;
        write_u32(w, self.offset as u32)?;
        write_u32(w, self.reverse as u32)?;
        write_u32(w, self.bloom.is_some() as u32)?;
        write_u32(w, self.bloom.map_or(0, |c| c.nb_hash))?;
        write_u32(w, self.bloom.map_or(0, |c| c.bits_per_element))?;
        write_u32(w, self.limit as u32)?;
        for p in 0..self.current {
            for &word in &self.pools[p] {
                write_u32(w, word)?;
            }
            for _ in self.pools[p].len()..self.limit {
                write_u32(w, 0)?;
            }
        }
        for &word in &self.pools[self.current][..self.offset] {
            write_u32(w, word)?;
        }
        Ok(())
    }

    /// Read the header words without loading pool data.
    pub fn read_header<R: Read>(r: &mut R) -> io::Result<PoolHeader> {
        let full_pools = read_u32(r)?;
        let offset = read_u32(r)?;
        let reverse = read_u32(r)? != 0;
        let bloom_enabled = read_u32(r)? != 0;
        let nb_hash = read_u32(r)?;
        let bits_per_element = read_u32(r)?;
        let limit = read_u32(r)?;
        Ok(PoolHeader {
            full_pools,
            offset,
            reverse,
            bloom: if bloom_enabled {
                Some(BloomConfig {
                    nb_hash,
                    bits_per_element,
                })
            } else {
                None
            },
            limit,
        })
    }

    /// Inverse of `write`.
    pub fn read<R: Read>(r: &mut R) -> io::Result<SegmentPool> {
        let header = Self::read_header(r)?;
        let full = header.full_pools as usize;
        let mut pools = Vec::with_capacity(full + 1);
        for _ in 0..full {
            let mut pool = vec![0u32; header.limit as usize];
            for word in pool.iter_mut() {
                *word = read_u32(r)?;
            }
            pools.push(pool);
        }
        let mut active = vec![0u32; header.offset as usize];
        for word in active.iter_mut() {
            *word = read_u32(r)?;
        }
        pools.push(active);
        Ok(SegmentPool {
            pools,
            current: full,
            offset: header.offset as usize,
            limit: header.limit as usize,
            reverse: header.reverse,
            bloom: header.bloom,
        })
    }

    /// Load a single term's chain from an on-disk index into this pool,
    /// relinking the copied segments. Returns the loaded chain's head.
    pub fn read_postings_for_term<R: Read + Seek>(
        &mut self,
        head: SegmentPtr,
        f: &mut R,
    ) -> io::Result<SegmentPtr> {
        f.seek(SeekFrom::Start(0))?;
        let header = Self::read_header(f)?;
        let limit = header.limit as u64;

        let mut first = SegmentPtr::UNDEFINED;
        let mut prev: Option<(usize, usize)> = None;
        let mut cur = head;
        while !cur.is_undefined() {
            let byte_pos =
                HEADER_WORDS * 4 + (cur.pool() as u64 * limit + cur.offset() as u64) * 4;
            f.seek(SeekFrom::Start(byte_pos))?;
            let reqspace = read_u32(f)? as usize;

            let (s, off) = self.alloc(reqspace);
            self.pools[s][off] = reqspace as u32;
            for i in 1..reqspace {
                self.pools[s][off + i] = read_u32(f)?;
            }

            // Pick up the on-disk link before it gets relinked.
            let link_pool = self.pools[s][off + 1];
            let link_off = self.pools[s][off + 2];
            cur = if link_pool == UNKNOWN_POOL {
                SegmentPtr::UNDEFINED
            } else {
                SegmentPtr::new(link_pool, link_off)
            };
            self.pools[s][off + 1] = UNKNOWN_POOL;
            self.pools[s][off + 2] = 0;

            if let Some((ps, po)) = prev {
                self.pools[ps][po + 1] = s as u32;
                self.pools[ps][po + 2] = off as u32;
            } else {
                first = SegmentPtr::new(s as u32, off as u32);
            }
            prev = Some((s, off));
        }
        Ok(first)
    }
}
