//! Progressive recall: BM25 keyword search, brute-force vector search, and
//! weighted RRF hybrid fusion.

mod bm25;
mod hybrid;
mod vector;

pub use bm25::{Bm25Index, Bm25Result, STOP_WORDS, tokenize};
pub use hybrid::{
    DEFAULT_RRF_K, DEFAULT_VECTOR_WEIGHT, HybridResult, HybridSearcher, fuse_rrf,
};
pub use vector::{
    BruteForceVectorStore, EmbeddingError, EmbeddingProvider, HashingEmbedder, VectorDoc,
    VectorResult, cosine_similarity,
};
