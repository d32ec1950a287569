//! Cross-encoder reranking with score fusion
//!
//! The rerank model scores (query, candidate) pairs; the final ordering
//! uses a weighted fusion of the raw retrieval score and the rerank score.
//! Scoring failures fall back to the original candidate order so a broken
//! model never empties a non-empty result set.

use super::{query_terms, term_overlap_score, RankedCandidate, RetrievalCandidate};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use std::sync::Arc;

/// Trait for (query, text) pair scoring models
pub trait RerankModel: Send + Sync {
    /// Score each text against the query, aligned with the input order
    fn score(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>>;
}

/// Reranks retrieval candidates and truncates to `top_k`
pub struct Reranker {
    model: Arc<dyn RerankModel>,
    /// Weight of the rerank score; the raw score gets the complement
    rerank_weight: f32,
}

impl Reranker {
    pub fn new(model: Arc<dyn RerankModel>, rerank_weight: f32) -> Self {
        Self {
            model,
            rerank_weight,
        }
    }

    /// Sort candidates by combined score descending and keep `top_k`.
    ///
    /// Deterministic for a fixed query and candidate set. On scoring
    /// failure the candidates keep their original order, truncated to
    /// `top_k` - never an empty result for non-empty input.
    pub fn rerank(
        &self,
        query: &str,
        candidates: Vec<RetrievalCandidate>,
        top_k: usize,
    ) -> Vec<RankedCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let scores = match self.model.score(query, &texts) {
            Ok(scores) if scores.len() == candidates.len() => scores,
            Ok(scores) => {
                tracing::warn!(
                    "Rerank model returned {} scores for {} candidates, keeping original order",
                    scores.len(),
                    candidates.len()
                );
                return self.passthrough(candidates, top_k);
            }
            Err(e) => {
                tracing::warn!("Reranking failed, keeping original order: {}", e);
                return self.passthrough(candidates, top_k);
            }
        };

        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, rerank_score)| {
                let combined_score = (1.0 - self.rerank_weight) * candidate.raw_score
                    + self.rerank_weight * rerank_score;
                RankedCandidate {
                    candidate,
                    rerank_score,
                    combined_score,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.candidate.chunk_id.cmp(&b.candidate.chunk_id))
        });
        ranked.truncate(top_k);
        ranked
    }

    fn passthrough(
        &self,
        candidates: Vec<RetrievalCandidate>,
        top_k: usize,
    ) -> Vec<RankedCandidate> {
        candidates
            .into_iter()
            .take(top_k)
            .map(|candidate| {
                let raw = candidate.raw_score;
                RankedCandidate {
                    candidate,
                    rerank_score: raw,
                    combined_score: raw,
                }
            })
            .collect()
    }
}

/// Deterministic rerank model based on query-term overlap.
///
/// Used when the cross-encoder is disabled and by tests; scores land in
/// [0, 1] like the cosine similarities they are fused with.
pub struct TermOverlapModel;

impl RerankModel for TermOverlapModel {
    fn score(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>> {
        let terms = query_terms(query);
        Ok(texts
            .iter()
            .map(|text| term_overlap_score(&terms, text))
            .collect())
    }
}

/// Cross-encoder reranker backed by fastembed's BGE model.
///
/// The model (~1GB) is downloaded on first use.
pub struct FastEmbedReranker {
    model: Arc<TextRerank>,
}

impl FastEmbedReranker {
    pub fn new() -> anyhow::Result<Self> {
        tracing::info!("Initializing cross-encoder rerank model");
        let init_options =
            RerankInitOptions::new(RerankerModel::BGERerankerBase).with_show_download_progress(true);
        let model = TextRerank::try_new(init_options)?;
        Ok(Self {
            model: Arc::new(model),
        })
    }
}

impl RerankModel for FastEmbedReranker {
    fn score(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>> {
        let documents: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let results = self.model.rerank(query, documents, true, None)?;

        // Results come back ordered by score; realign with input order
        let mut scores = vec![0.0f32; texts.len()];
        for result in results {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = result.score;
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::CandidateSource;

    struct FailingModel;

    impl RerankModel for FailingModel {
        fn score(&self, _query: &str, _texts: &[String]) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("model unavailable")
        }
    }

    fn candidate(id: &str, text: &str, raw_score: f32) -> RetrievalCandidate {
        RetrievalCandidate {
            chunk_id: id.to_string(),
            text: text.to_string(),
            source: CandidateSource::Vector,
            raw_score,
        }
    }

    #[test]
    fn reranks_by_combined_score() {
        let reranker = Reranker::new(Arc::new(TermOverlapModel), 0.5);
        let candidates = vec![
            candidate("c1", "nothing relevant here at all", 0.9),
            candidate("c2", "remote work requires written authorization", 0.5),
        ];

        let ranked = reranker.rerank("remote work authorization", candidates, 2);

        // c2: 0.5*0.5 + 0.5*1.0 = 0.75 beats c1: 0.5*0.9 + 0.5*0.0 = 0.45
        assert_eq!(ranked[0].candidate.chunk_id, "c2");
        assert!(ranked[0].combined_score > ranked[1].combined_score);
    }

    #[test]
    fn truncates_to_top_k() {
        let reranker = Reranker::new(Arc::new(TermOverlapModel), 0.5);
        let candidates = vec![
            candidate("c1", "remote work is allowed with authorization", 0.9),
            candidate("c2", "remote work needs a permit", 0.3),
        ];

        let ranked = reranker.rerank("remote work", candidates, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.chunk_id, "c1");
    }

    #[test]
    fn failure_keeps_original_order() {
        let reranker = Reranker::new(Arc::new(FailingModel), 0.5);
        let candidates = vec![
            candidate("first", "text a", 0.2),
            candidate("second", "text b", 0.8),
            candidate("third", "text c", 0.5),
        ];

        let ranked = reranker.rerank("query", candidates, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].candidate.chunk_id, "first");
        assert_eq!(ranked[1].candidate.chunk_id, "second");
    }

    #[test]
    fn reranking_is_deterministic() {
        let reranker = Reranker::new(Arc::new(TermOverlapModel), 0.5);
        let candidates = vec![
            candidate("c1", "vacation days accrue monthly", 0.4),
            candidate("c2", "vacation requests need approval", 0.4),
            candidate("c3", "the parking lot is full", 0.4),
        ];

        let first = reranker.rerank("vacation days", candidates.clone(), 3);
        let second = reranker.rerank("vacation days", candidates, 3);

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.candidate.chunk_id, b.candidate.chunk_id);
            assert_eq!(a.combined_score, b.combined_score);
        }
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let reranker = Reranker::new(Arc::new(TermOverlapModel), 0.5);
        assert!(reranker.rerank("query", Vec::new(), 5).is_empty());
    }
}
