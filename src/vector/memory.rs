//! Brute-force in-memory vector store

use super::{
    cosine_similarity, EmbeddingProvider, VectorEntry, VectorHit, VectorStore, VectorStoreError,
};
use crate::store::ChunkLevel;
use std::sync::{Arc, RwLock};

struct StoredEntry {
    chunk_id: String,
    doc_id: String,
    text: String,
    level: ChunkLevel,
    embedding: Vec<f32>,
}

/// Exhaustive-scan vector store backed by a `Vec`.
///
/// Embeds chunk texts at insertion time through the injected provider.
/// Adequate for corpora in the tens of thousands of chunks; larger installs
/// swap in a service-backed [`VectorStore`] implementation.
pub struct MemoryVectorStore {
    provider: Arc<dyn EmbeddingProvider>,
    entries: RwLock<Vec<StoredEntry>>,
}

impl MemoryVectorStore {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl VectorStore for MemoryVectorStore {
    fn add(&self, new_entries: Vec<VectorEntry>) -> Result<(), VectorStoreError> {
        if new_entries.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = new_entries.iter().map(|e| e.text.clone()).collect();
        let embeddings = self.provider.embed_batch(&texts)?;

        // A provider returning a short batch would misalign every chunk
        // after the gap, so refuse the whole batch
        if embeddings.len() != new_entries.len() {
            return Err(VectorStoreError::Backend(format!(
                "Provider returned {} embeddings for {} chunks",
                embeddings.len(),
                new_entries.len()
            )));
        }

        let mut entries = self.entries.write().expect("vector store lock poisoned");
        for (entry, embedding) in new_entries.into_iter().zip(embeddings) {
            entries.push(StoredEntry {
                chunk_id: entry.chunk_id,
                doc_id: entry.meta.doc_id,
                text: entry.text,
                level: entry.meta.level,
                embedding,
            });
        }
        Ok(())
    }

    fn query(
        &self,
        text: &str,
        top_k: usize,
        level: Option<ChunkLevel>,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        let query_embedding = self.provider.embed(text)?;

        let entries = self.entries.read().expect("vector store lock poisoned");
        let mut hits: Vec<VectorHit> = entries
            .iter()
            .filter(|e| level.map_or(true, |l| e.level == l))
            .map(|e| VectorHit {
                chunk_id: e.chunk_id.clone(),
                text: e.text.clone(),
                distance: 1.0 - cosine_similarity(&query_embedding, &e.embedding),
            })
            .collect();

        // Tie-break on chunk id so repeated queries are deterministic
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn delete_doc(&self, doc_id: &str) -> Result<(), VectorStoreError> {
        let mut entries = self.entries.write().expect("vector store lock poisoned");
        let before = entries.len();
        entries.retain(|e| e.doc_id != doc_id);
        tracing::debug!(
            "Deleted {} vector entries for document '{}'",
            before - entries.len(),
            doc_id
        );
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().expect("vector store lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::HashedEmbedder;

    fn entry(chunk_id: &str, doc_id: &str, text: &str) -> VectorEntry {
        VectorEntry {
            chunk_id: chunk_id.to_string(),
            text: text.to_string(),
            meta: crate::vector::VectorMeta {
                doc_id: doc_id.to_string(),
                level: ChunkLevel::Detail,
                section_id: Some(0),
                title: None,
            },
        }
    }

    fn store() -> MemoryVectorStore {
        MemoryVectorStore::new(Arc::new(HashedEmbedder::new(256)))
    }

    #[test]
    fn query_ranks_matching_text_first() {
        let store = store();
        store
            .add(vec![
                entry("a_L0_S0", "a", "remote work requires written authorization"),
                entry("a_L0_S1", "a", "the cafeteria serves lunch at noon"),
            ])
            .unwrap();

        let hits = store.query("is remote work allowed", 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "a_L0_S0");
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn level_filter_restricts_results() {
        let store = store();
        let mut section = entry("a_L0", "a", "full section body");
        section.meta.level = ChunkLevel::Section;
        store
            .add(vec![section, entry("a_L0_S0", "a", "detail body")])
            .unwrap();

        let hits = store.query("body", 10, Some(ChunkLevel::Detail)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a_L0_S0");
    }

    #[test]
    fn delete_doc_removes_all_entries() {
        let store = store();
        store
            .add(vec![
                entry("a_L0_S0", "a", "alpha"),
                entry("b_L0_S0", "b", "beta"),
            ])
            .unwrap();

        store.delete_doc("a").unwrap();
        assert_eq!(store.len(), 1);

        let hits = store.query("alpha", 10, None).unwrap();
        assert_eq!(hits[0].chunk_id, "b_L0_S0");
    }

    #[test]
    fn empty_store_returns_no_hits() {
        let store = store();
        assert!(store.query("anything", 5, None).unwrap().is_empty());
    }

    /// Provider that drops empty texts instead of failing on them
    struct SkippingProvider {
        inner: HashedEmbedder,
    }

    impl crate::vector::EmbeddingProvider for SkippingProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, crate::vector::EmbeddingError> {
            self.inner.embed(text)
        }

        fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, crate::vector::EmbeddingError> {
            texts
                .iter()
                .filter(|t| !t.trim().is_empty())
                .map(|t| self.inner.embed(t))
                .collect()
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            "skipping"
        }
    }

    #[test]
    fn short_embedding_batch_is_rejected_and_stores_nothing() {
        let store = MemoryVectorStore::new(Arc::new(SkippingProvider {
            inner: HashedEmbedder::new(64),
        }));

        // The middle entry gets silently dropped by the provider; pairing
        // the remaining embeddings positionally would corrupt the index
        let result = store.add(vec![
            entry("a_L0_S0", "a", "first chunk body"),
            entry("a_L0_S1", "a", ""),
            entry("a_L0_S2", "a", "third chunk body"),
        ]);

        assert!(matches!(result, Err(VectorStoreError::Backend(_))));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn empty_text_in_batch_fails_the_whole_add() {
        let store = store();
        let result = store.add(vec![
            entry("a_L0_S0", "a", "real body"),
            entry("a_L0_S1", "a", "   "),
        ]);

        assert!(matches!(result, Err(VectorStoreError::Embedding(_))));
        assert_eq!(store.len(), 0);
    }
}
