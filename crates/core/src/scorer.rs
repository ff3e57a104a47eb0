/// BM25 scoring.
///
///   bm25tf(tf, dl, avgdl) = ((K1 + 1) * tf) / (K1 * (1 - B + B * dl / avgdl) + tf)
///   idf(N, df)            = ln((N - df + 0.5) / (df + 0.5))
///   bm25                  = idf * bm25tf

pub const K1: f32 = 0.9;
pub const B: f32 = 0.4;

/// Saturated term-frequency component of BM25.
pub fn bm25tf(tf: u32, doc_len: u32, avg_doc_len: f32) -> f32 {
    let tf = tf as f32;
    ((K1 + 1.0) * tf) / (K1 * (1.0 - B + B * doc_len as f32 / avg_doc_len) + tf)
}

/// Inverse document frequency.
pub fn idf(total_docs: u32, df: u32) -> f32 {
    let n = total_docs as f32;
    let df = df as f32;
    ((n - df + 0.5) / (df + 0.5)).ln()
}

/// Full per-term BM25 contribution.
pub fn bm25(tf: u32, df: u32, total_docs: u32, doc_len: u32, avg_doc_len: f32) -> f32 {
    idf(total_docs, df) * bm25tf(tf, doc_len, avg_doc_len)
}
