//! Hybrid retrieval and reranking
//!
//! Candidates come from two legs: vector search against the index and an
//! on-demand BM25 lexical index over the same chunk corpus. The merged set
//! is unordered; ordering happens in the reranker, which fuses the raw
//! retrieval score with a cross-encoder score.

mod hybrid;
mod lexical;
mod reranker;

pub use hybrid::{HybridRetriever, SearchError};
pub use lexical::LexicalIndex;
pub use reranker::{FastEmbedReranker, RerankModel, Reranker, TermOverlapModel};

use serde::{Deserialize, Serialize};

/// Which leg produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Vector,
    Lexical,
}

/// Ephemeral per-query retrieval hit. Never persisted.
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    pub chunk_id: String,
    pub text: String,
    pub source: CandidateSource,
    /// Cosine similarity for vector hits, BM25 score for lexical hits
    pub raw_score: f32,
}

/// A retrieval candidate after reranking
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: RetrievalCandidate,
    pub rerank_score: f32,
    /// Weighted fusion of raw and rerank scores, used for final ordering
    pub combined_score: f32,
}

/// Lowercased query terms used for lexical overlap scoring. Short stop-ish
/// tokens are dropped.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| t.chars().count() > 2)
        .collect()
}

/// Term-overlap ratio between query terms and a text, with a small bonus
/// for repeated occurrences. Result is clamped to [0, 1].
pub(crate) fn term_overlap_score(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();

    let mut matched = 0usize;
    let mut extra = 0usize;
    for term in terms {
        let occurrences = haystack.matches(term.as_str()).count();
        if occurrences > 0 {
            matched += 1;
            extra += occurrences - 1;
        }
    }

    let ratio = matched as f32 / terms.len() as f32;
    let bonus = 0.05 * (extra.min(5) as f32);
    (ratio + bonus).min(1.0)
}
