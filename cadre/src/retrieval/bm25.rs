//! Okapi BM25 keyword index.
//!
//! In-memory corpus with incrementally maintained statistics: document
//! frequency per term, total length, and running average, so single inserts
//! cost O(distinct terms in the document).

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

/// Fixed English stop list (56 words).
pub const STOP_WORDS: [&str; 56] = [
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has", "have",
    "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "my", "no",
    "not", "of", "on", "or", "our", "she", "so", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "to", "was", "we", "were", "what", "when", "which", "who",
    "will", "with", "you",
];

static STOP_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

/// Tokenize text into lowercase word tokens, removing stop words when
/// requested.
#[must_use]
pub fn tokenize(text: &str, remove_stopwords: bool) -> Vec<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|t| !remove_stopwords || !STOP_SET.contains(t.as_str()))
        .collect()
}

/// A single BM25 search result.
#[derive(Debug, Clone)]
pub struct Bm25Result {
    /// Document text.
    pub text: String,
    /// BM25 score.
    pub score: f64,
    /// Document metadata.
    pub metadata: Value,
    /// Index of the document in the corpus.
    pub doc_index: usize,
}

/// In-memory BM25 index.
#[derive(Debug)]
pub struct Bm25Index {
    k1: f64,
    b: f64,
    docs: Vec<(String, Value)>,
    tokenized: Vec<Vec<String>>,
    doc_lens: Vec<usize>,
    doc_freqs: HashMap<String, usize>,
    total_len: usize,
    avg_len: f64,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(1.2, 0.75)
    }
}

impl Bm25Index {
    /// Index with custom `k1` (term-frequency saturation) and `b` (length
    /// normalisation) parameters.
    #[must_use]
    pub fn new(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            docs: Vec::new(),
            tokenized: Vec::new(),
            doc_lens: Vec::new(),
            doc_freqs: HashMap::new(),
            total_len: 0,
            avg_len: 0.0,
        }
    }

    /// Add one document; returns its index.
    pub fn add_document(&mut self, content: &str, metadata: Value) -> usize {
        let tokens = tokenize(content, true);
        let doc_index = self.docs.len();
        let doc_len = tokens.len();

        for term in tokens.iter().collect::<HashSet<_>>() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        self.docs.push((content.to_string(), metadata));
        self.tokenized.push(tokens);
        self.doc_lens.push(doc_len);
        self.total_len += doc_len;
        self.avg_len = self.total_len as f64 / self.docs.len() as f64;
        doc_index
    }

    /// Bulk-add documents; returns their indices.
    pub fn add_documents(&mut self, documents: &[(String, Value)]) -> Vec<usize> {
        documents
            .iter()
            .map(|(content, metadata)| self.add_document(content, metadata.clone()))
            .collect()
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Remove all documents.
    pub fn clear(&mut self) {
        self.docs.clear();
        self.tokenized.clear();
        self.doc_lens.clear();
        self.doc_freqs.clear();
        self.total_len = 0;
        self.avg_len = 0.0;
    }

    /// Score every document against the query; return the top `top_k` with
    /// positive scores, best first.
    #[must_use]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Bm25Result> {
        if self.docs.is_empty() {
            return Vec::new();
        }
        let query_tokens = tokenize(query, true);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = (0..self.docs.len())
            .filter_map(|index| {
                let score = self.score_document(&query_tokens, index);
                (score > 0.0).then_some((index, score))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(index, score)| Bm25Result {
                text: self.docs[index].0.clone(),
                score,
                metadata: self.docs[index].1.clone(),
                doc_index: index,
            })
            .collect()
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.doc_freqs.get(term).copied().unwrap_or(0);
        if n == 0 {
            return 0.0;
        }
        let total = self.docs.len() as f64;
        ((total - n as f64 + 0.5) / (n as f64 + 0.5) + 1.0).ln()
    }

    fn score_document(&self, query_tokens: &[String], index: usize) -> f64 {
        let doc_len = self.doc_lens[index] as f64;
        let mut term_freqs: HashMap<&str, usize> = HashMap::new();
        for token in &self.tokenized[index] {
            *term_freqs.entry(token.as_str()).or_insert(0) += 1;
        }

        query_tokens
            .iter()
            .filter_map(|term| {
                let tf = *term_freqs.get(term.as_str())? as f64;
                let idf = self.idf(term);
                let numerator = tf * (self.k1 + 1.0);
                let denominator = tf
                    + self.k1 * (1.0 - self.b + self.b * doc_len / self.avg_len.max(1e-10));
                Some(idf * numerator / denominator)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tokenize_lowercases_and_strips_stopwords() {
        let tokens = tokenize("The Quick Brown Fox and the Lazy Dog", true);
        assert_eq!(tokens, vec!["quick", "brown", "fox", "lazy", "dog"]);
        let kept = tokenize("the fox", false);
        assert_eq!(kept, vec!["the", "fox"]);
    }

    #[test]
    fn stop_list_has_56_entries() {
        assert_eq!(STOP_WORDS.len(), 56);
        let unique: HashSet<&str> = STOP_WORDS.iter().copied().collect();
        assert_eq!(unique.len(), 56);
    }

    #[test]
    fn relevant_document_ranks_first() {
        let mut index = Bm25Index::default();
        index.add_document("rust is a systems programming language", json!({}));
        index.add_document("python is a scripting language", json!({}));
        index.add_document("cooking pasta requires boiling water", json!({}));

        let results = index.search("rust programming", 10);
        assert!(!results.is_empty());
        assert_eq!(results[0].doc_index, 0);
        // The cooking document shares no terms and is absent.
        assert!(results.iter().all(|r| r.doc_index != 2));
    }

    #[test]
    fn incremental_stats_match_bulk_insert() {
        let docs: Vec<(String, Value)> = vec![
            ("alpha beta gamma".to_string(), json!({})),
            ("alpha delta".to_string(), json!({})),
        ];
        let mut incremental = Bm25Index::default();
        for (text, meta) in &docs {
            incremental.add_document(text, meta.clone());
        }
        let mut bulk = Bm25Index::default();
        bulk.add_documents(&docs);

        let a = incremental.search("alpha", 5);
        let b = bulk.search("alpha", 5);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!((x.score - y.score).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_index_and_empty_query_return_nothing() {
        let index = Bm25Index::default();
        assert!(index.search("anything", 5).is_empty());

        let mut index = Bm25Index::default();
        index.add_document("some content here", json!({}));
        assert!(index.search("the and of", 5).is_empty());
    }

    #[test]
    fn clear_resets_the_corpus() {
        let mut index = Bm25Index::default();
        index.add_document("hello world", json!({}));
        assert_eq!(index.len(), 1);
        index.clear();
        assert!(index.is_empty());
        assert!(index.search("hello", 5).is_empty());
    }

    #[test]
    fn top_k_bounds_results() {
        let mut index = Bm25Index::default();
        for i in 0..10 {
            index.add_document(&format!("shared term document {i}"), json!({"i": i}));
        }
        let results = index.search("shared term", 3);
        assert_eq!(results.len(), 3);
    }
}
