//! Embedding capability and a brute-force cosine vector store.
//!
//! The engine does not ship a vector index; this store scans linearly and
//! exists so hybrid retrieval works out of the box. Real deployments plug a
//! vector database in behind the same shape.

use async_trait::async_trait;
use serde_json::Value;

/// Errors from embedding providers.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// The provider failed.
    #[error("embedding provider error: {0}")]
    Provider(String),
}

/// Capability for turning text into vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed many texts. The default embeds one at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Deterministic hashing embedder for tests and offline use. Not a
/// semantic model; it only guarantees identical text embeds identically.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dims: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dims: 64 }
    }
}

impl HashingEmbedder {
    /// Embedder producing vectors of the given dimensionality.
    #[must_use]
    pub const fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dims];
        for token in super::bm25::tokenize(text, true) {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for byte in token.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            let slot = (hash % self.dims as u64) as usize;
            vector[slot] += 1.0;
        }
        Ok(vector)
    }
}

/// A stored document with its embedding.
#[derive(Debug, Clone)]
pub struct VectorDoc {
    /// Document text.
    pub text: String,
    /// Embedding.
    pub embedding: Vec<f32>,
    /// Metadata.
    pub metadata: Value,
}

/// A vector search hit.
#[derive(Debug, Clone)]
pub struct VectorResult {
    /// Document text.
    pub text: String,
    /// Cosine similarity to the query.
    pub score: f64,
    /// Metadata.
    pub metadata: Value,
}

/// Cosine similarity between two vectors; zero when either has no norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a < 1e-12 || norm_b < 1e-12 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Brute-force in-memory vector store.
#[derive(Debug, Default)]
pub struct BruteForceVectorStore {
    docs: Vec<VectorDoc>,
}

impl BruteForceVectorStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document with its embedding.
    pub fn add(&mut self, text: impl Into<String>, embedding: Vec<f32>, metadata: Value) {
        self.docs.push(VectorDoc {
            text: text.into(),
            embedding,
            metadata,
        });
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Top-k documents by cosine similarity to the query embedding.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<VectorResult> {
        let mut scored: Vec<VectorResult> = self
            .docs
            .iter()
            .map(|doc| VectorResult {
                text: doc.text.clone(),
                score: cosine_similarity(query, &doc.embedding),
                metadata: doc.metadata.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::default();
        let a = embedder.embed("the quick brown fox").await.unwrap();
        let b = embedder.embed("the quick brown fox").await.unwrap();
        assert_eq!(a, b);
        let c = embedder.embed("entirely different text").await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn store_ranks_similar_documents_first() {
        let embedder = HashingEmbedder::default();
        let mut store = BruteForceVectorStore::new();
        for text in [
            "rust memory safety and ownership",
            "gardening tips for spring tomatoes",
        ] {
            let embedding = embedder.embed(text).await.unwrap();
            store.add(text, embedding, json!({}));
        }

        let query = embedder.embed("rust ownership model").await.unwrap();
        let results = store.search(&query, 2);
        assert_eq!(results.len(), 2);
        assert!(results[0].text.contains("rust"));
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn batch_embedding_matches_single() {
        tokio_test::block_on(async {
            let embedder = HashingEmbedder::default();
            let texts = vec!["one".to_string(), "two".to_string()];
            let batch = embedder.embed_batch(&texts).await.unwrap();
            assert_eq!(batch.len(), 2);
            assert_eq!(batch[0], embedder.embed("one").await.unwrap());
        });
    }
}
