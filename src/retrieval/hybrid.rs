//! Hybrid search combining vector and lexical retrieval

use super::{CandidateSource, LexicalIndex, RetrievalCandidate};
use crate::config::RetrievalConfig;
use crate::store::{ChunkLevel, DocumentStore};
use crate::vector::VectorStore;
use ahash::AHashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Both retrieval legs failed: {0}")]
    Unavailable(String),
}

/// Merges vector and lexical candidate sets for a query.
///
/// The output is an unordered candidate set; ordering is the reranker's
/// job. When one leg fails the other's results are used alone.
pub struct HybridRetriever {
    vector: Arc<dyn VectorStore>,
    store: Arc<DocumentStore>,
    /// Chunk level eligible for search under the active chunking policy
    level: ChunkLevel,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        vector: Arc<dyn VectorStore>,
        store: Arc<DocumentStore>,
        level: ChunkLevel,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            vector,
            store,
            level,
            config,
        }
    }

    /// Retrieve up to `2*top_k` vector candidates plus `top_k` lexical
    /// candidates not already covered by the vector set.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalCandidate>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let vector_limit = top_k * self.config.vector_multiplier;
        let (vector_results, lexical_results) = tokio::join!(
            self.vector_search(query, vector_limit),
            self.lexical_search(query, top_k)
        );

        let vector_candidates = match vector_results {
            Ok(candidates) => candidates,
            // Degrading to lexical-only needs a corpus to search; with the
            // vector leg down and nothing indexed, the search is unavailable
            Err(e) if self.store.searchable_chunks().is_empty() => {
                return Err(SearchError::Unavailable(e));
            }
            Err(e) => {
                tracing::warn!("Vector search failed, degrading to lexical only: {}", e);
                Vec::new()
            }
        };

        // Lexical results are deduplicated against the vector set by a
        // content-prefix signature, not by chunk id: overlapping chunks
        // from different split levels share their leading text
        let mut seen: AHashSet<String> = vector_candidates
            .iter()
            .map(|c| self.signature(&c.text))
            .collect();

        let mut merged = vector_candidates;
        let mut accepted = 0usize;
        for candidate in lexical_results {
            if accepted >= top_k {
                break;
            }
            if seen.insert(self.signature(&candidate.text)) {
                merged.push(candidate);
                accepted += 1;
            }
        }

        tracing::debug!(
            "Hybrid search: {} merged candidates ({} lexical accepted)",
            merged.len(),
            accepted
        );
        Ok(merged)
    }

    async fn vector_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, String> {
        let hits = self
            .vector
            .query(query, limit, Some(self.level))
            .map_err(|e| e.to_string())?;

        Ok(hits
            .into_iter()
            .map(|hit| RetrievalCandidate {
                chunk_id: hit.chunk_id,
                text: hit.text,
                source: CandidateSource::Vector,
                // Cosine metric: similarity is one minus distance
                raw_score: 1.0 - hit.distance,
            })
            .collect())
    }

    async fn lexical_search(&self, query: &str, limit: usize) -> Vec<RetrievalCandidate> {
        let corpus = self.store.searchable_chunks();
        let index = LexicalIndex::build(&corpus);
        if index.is_empty() {
            return Vec::new();
        }
        // Over-fetch so dedup against the vector set still leaves `limit`
        index.search(query, limit * 2)
    }

    fn signature(&self, text: &str) -> String {
        text.chars().take(self.config.dedup_prefix_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::Chunk;
    use crate::vector::{HashedEmbedder, MemoryVectorStore, VectorEntry, VectorMeta};

    fn detail_chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            chunk_id: id.to_string(),
            doc_id: "doc".to_string(),
            text: text.to_string(),
            level: ChunkLevel::Detail,
            section_id: Some(0),
            title: None,
        }
    }

    fn retriever_with(chunks: Vec<Chunk>) -> HybridRetriever {
        let store = Arc::new(DocumentStore::new());
        let vector = Arc::new(MemoryVectorStore::new(Arc::new(HashedEmbedder::new(256))));

        let entries: Vec<VectorEntry> = chunks
            .iter()
            .map(|c| VectorEntry {
                chunk_id: c.chunk_id.clone(),
                text: c.text.clone(),
                meta: VectorMeta {
                    doc_id: c.doc_id.clone(),
                    level: c.level,
                    section_id: c.section_id,
                    title: None,
                },
            })
            .collect();
        vector.add(entries).unwrap();
        store.replace_document("doc", "full text".to_string(), chunks);

        HybridRetriever::new(vector, store, ChunkLevel::Detail, Config::default().retrieval)
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let retriever = retriever_with(vec![]);
        assert!(matches!(
            retriever.search("  ", 5).await,
            Err(SearchError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn merged_set_deduplicates_by_prefix() {
        let retriever = retriever_with(vec![
            detail_chunk("c1", "remote work requires written authorization"),
            detail_chunk("c2", "the office closes at six in the evening"),
        ]);

        let results = retriever.search("remote work authorization", 5).await.unwrap();

        // Both chunks surface through the vector leg; the lexical leg must
        // not duplicate c1
        let c1_hits = results.iter().filter(|c| c.chunk_id == "c1").count();
        assert_eq!(c1_hits, 1);
    }

    #[tokio::test]
    async fn empty_corpus_yields_empty_result() {
        let retriever = retriever_with(vec![]);
        let results = retriever.search("anything at all", 5).await.unwrap();
        assert!(results.is_empty());
    }

    struct FailingEmbedder;

    impl crate::vector::EmbeddingProvider for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, crate::vector::EmbeddingError> {
            Err(crate::vector::EmbeddingError::GenerationError(
                "model offline".to_string(),
            ))
        }

        fn embed_batch(
            &self,
            _texts: &[String],
        ) -> Result<Vec<Vec<f32>>, crate::vector::EmbeddingError> {
            Err(crate::vector::EmbeddingError::GenerationError(
                "model offline".to_string(),
            ))
        }

        fn dimension(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn vector_failure_degrades_to_lexical_results() {
        let store = Arc::new(DocumentStore::new());
        let vector = Arc::new(MemoryVectorStore::new(Arc::new(FailingEmbedder)));
        let chunks = vec![detail_chunk("c1", "severance terms after termination")];
        store.replace_document("doc", "text".to_string(), chunks);

        let retriever =
            HybridRetriever::new(vector, store, ChunkLevel::Detail, Config::default().retrieval);

        let results = retriever.search("severance terms", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, CandidateSource::Lexical);
    }

    #[tokio::test]
    async fn vector_failure_without_a_corpus_is_unavailable() {
        let store = Arc::new(DocumentStore::new());
        let vector = Arc::new(MemoryVectorStore::new(Arc::new(FailingEmbedder)));
        let retriever =
            HybridRetriever::new(vector, store, ChunkLevel::Detail, Config::default().retrieval);

        assert!(matches!(
            retriever.search("anything", 5).await,
            Err(SearchError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn lexical_leg_contributes_unseen_chunks() {
        // Force the vector leg to miss by asking for very few hits
        let store = Arc::new(DocumentStore::new());
        let vector = Arc::new(MemoryVectorStore::new(Arc::new(HashedEmbedder::new(256))));
        let chunks = vec![
            detail_chunk("c1", "holiday schedule for the winter break"),
            detail_chunk("c2", "severance terms after termination"),
        ];
        store.replace_document("doc", "text".to_string(), chunks);

        let mut config = Config::default().retrieval;
        config.vector_multiplier = 1;
        let retriever = HybridRetriever::new(vector, store, ChunkLevel::Detail, config);

        // Vector store is empty; everything must come from the lexical leg
        let results = retriever.search("severance terms", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "c2");
        assert_eq!(results[0].source, CandidateSource::Lexical);
    }
}
