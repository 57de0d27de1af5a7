//! Hybrid retrieval: BM25 keyword search fused with vector search via
//! weighted Reciprocal Rank Fusion.
//!
//! RRF combines the two ranked lists without score normalisation: each
//! result contributes `w · 1/(k + rank)` per list it appears in, with the
//! standard k of 60.

use serde_json::Value;

use super::bm25::Bm25Index;
use super::vector::{BruteForceVectorStore, EmbeddingError, EmbeddingProvider};

/// Standard RRF rank constant.
pub const DEFAULT_RRF_K: usize = 60;
/// Default weight of the vector list; BM25 gets the complement.
pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.7;

/// A fused search result.
#[derive(Debug, Clone)]
pub struct HybridResult {
    /// Document text.
    pub text: String,
    /// Fused RRF score.
    pub score: f64,
    /// Raw vector similarity, when present in the vector list.
    pub vector_score: f64,
    /// Raw BM25 score, when present in the keyword list.
    pub bm25_score: f64,
    /// 1-based rank in the vector list; 0 when absent.
    pub vector_rank: usize,
    /// 1-based rank in the BM25 list; 0 when absent.
    pub bm25_rank: usize,
    /// Document metadata.
    pub metadata: Value,
}

impl HybridResult {
    fn seed(text: String, metadata: Value) -> Self {
        Self {
            text,
            score: 0.0,
            vector_score: 0.0,
            bm25_score: 0.0,
            vector_rank: 0,
            bm25_rank: 0,
            metadata,
        }
    }
}

/// Fuse two ranked lists with weighted RRF. Inputs are (text, raw score,
/// metadata) triples in rank order.
#[must_use]
pub fn fuse_rrf(
    vector_ranked: &[(String, f64, Value)],
    bm25_ranked: &[(String, f64, Value)],
    vector_weight: f64,
    rrf_k: usize,
    top_k: usize,
) -> Vec<HybridResult> {
    let vector_weight = vector_weight.clamp(0.0, 1.0);
    let bm25_weight = 1.0 - vector_weight;
    let rrf_k = rrf_k.max(1);

    // Keyed by text for deduplication across the two lists.
    let mut merged: Vec<HybridResult> = Vec::new();
    let mut index_of = std::collections::HashMap::new();

    for (rank, (text, score, metadata)) in vector_ranked.iter().enumerate() {
        let entry_index = *index_of.entry(text.clone()).or_insert_with(|| {
            merged.push(HybridResult::seed(text.clone(), metadata.clone()));
            merged.len() - 1
        });
        merged[entry_index].vector_rank = rank + 1;
        merged[entry_index].vector_score = *score;
    }

    for (rank, (text, score, metadata)) in bm25_ranked.iter().enumerate() {
        let entry_index = *index_of.entry(text.clone()).or_insert_with(|| {
            merged.push(HybridResult::seed(text.clone(), metadata.clone()));
            merged.len() - 1
        });
        merged[entry_index].bm25_rank = rank + 1;
        merged[entry_index].bm25_score = *score;
    }

    for result in &mut merged {
        let vector_part = if result.vector_rank > 0 {
            vector_weight / (rrf_k + result.vector_rank) as f64
        } else {
            0.0
        };
        let bm25_part = if result.bm25_rank > 0 {
            bm25_weight / (rrf_k + result.bm25_rank) as f64
        } else {
            0.0
        };
        result.score = vector_part + bm25_part;
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(top_k);
    merged
}

/// Combines a vector store with a BM25 index under one search call.
pub struct HybridSearcher<'a> {
    store: &'a BruteForceVectorStore,
    bm25: &'a Bm25Index,
    embedder: &'a dyn EmbeddingProvider,
    vector_weight: f64,
    rrf_k: usize,
}

impl std::fmt::Debug for HybridSearcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearcher")
            .field("vector_weight", &self.vector_weight)
            .field("rrf_k", &self.rrf_k)
            .finish_non_exhaustive()
    }
}

impl<'a> HybridSearcher<'a> {
    /// Searcher over the given store and index with default fusion
    /// parameters.
    #[must_use]
    pub fn new(
        store: &'a BruteForceVectorStore,
        bm25: &'a Bm25Index,
        embedder: &'a dyn EmbeddingProvider,
    ) -> Self {
        Self {
            store,
            bm25,
            embedder,
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            rrf_k: DEFAULT_RRF_K,
        }
    }

    /// Override the vector weight (BM25 gets the complement).
    #[must_use]
    pub fn with_vector_weight(mut self, weight: f64) -> Self {
        self.vector_weight = weight.clamp(0.0, 1.0);
        self
    }

    /// Hybrid search: fetch 3× the requested depth from both systems, then
    /// fuse.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<HybridResult>, EmbeddingError> {
        let fetch_k = top_k * 3;

        let query_embedding = self.embedder.embed(query).await?;
        let vector_ranked: Vec<(String, f64, Value)> = self
            .store
            .search(&query_embedding, fetch_k)
            .into_iter()
            .map(|r| (r.text, r.score, r.metadata))
            .collect();

        if self.bm25.is_empty() {
            // Pure vector mode.
            let results = vector_ranked
                .into_iter()
                .enumerate()
                .take(top_k)
                .map(|(rank, (text, score, metadata))| HybridResult {
                    text,
                    score,
                    vector_score: score,
                    bm25_score: 0.0,
                    vector_rank: rank + 1,
                    bm25_rank: 0,
                    metadata,
                })
                .collect();
            return Ok(results);
        }

        let bm25_ranked: Vec<(String, f64, Value)> = self
            .bm25
            .search(query, fetch_k)
            .into_iter()
            .map(|r| (r.text, r.score, r.metadata))
            .collect();

        Ok(fuse_rrf(
            &vector_ranked,
            &bm25_ranked,
            self.vector_weight,
            self.rrf_k,
            top_k,
        ))
    }
}
