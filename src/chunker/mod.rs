//! Document chunking and ingestion
//!
//! Splits raw document text into retrievable chunks under one of two
//! policies and writes them to the document store and the vector index.
//! Re-ingesting a `doc_id` deletes every prior chunk first, so ingestion is
//! idempotent per document.

mod hierarchical;
mod structural;

use crate::config::{ChunkingConfig, ChunkingPolicy};
use crate::error::{DocqaError, Result};
use crate::store::{ChunkLevel, DocumentStore};
use crate::vector::{VectorEntry, VectorMeta, VectorStore};
use std::sync::Arc;

/// Splits documents and owns the ingestion side effects
pub struct Chunker {
    store: Arc<DocumentStore>,
    vector: Arc<dyn VectorStore>,
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(
        store: Arc<DocumentStore>,
        vector: Arc<dyn VectorStore>,
        config: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            vector,
            config,
        }
    }

    /// Chunk level the retriever should search under the active policy
    pub fn searchable_level(&self) -> ChunkLevel {
        match self.config.policy {
            ChunkingPolicy::Hierarchical => ChunkLevel::Detail,
            ChunkingPolicy::Structural => ChunkLevel::Structural,
        }
    }

    /// Ingest a document, replacing any previous version of `doc_id`.
    ///
    /// Empty text after trimming is a logged no-op, not an error. Index
    /// failures are raised: a partially ingested document would corrupt
    /// later retrieval.
    pub fn ingest(&self, doc_id: &str, text: &str) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            tracing::warn!("Skipping ingestion of '{}': empty text", doc_id);
            return Ok(());
        }

        self.vector
            .delete_doc(doc_id)
            .map_err(|e| DocqaError::Ingestion {
                doc_id: doc_id.to_string(),
                message: format!("failed to clear previous index entries: {}", e),
            })?;

        let chunks = match self.config.policy {
            ChunkingPolicy::Hierarchical => hierarchical::split(doc_id, trimmed, &self.config),
            ChunkingPolicy::Structural => structural::split(doc_id, trimmed, &self.config),
        };

        let entries: Vec<VectorEntry> = chunks
            .iter()
            .map(|chunk| VectorEntry {
                chunk_id: chunk.chunk_id.clone(),
                text: chunk.text.clone(),
                meta: VectorMeta {
                    doc_id: chunk.doc_id.clone(),
                    level: chunk.level,
                    section_id: chunk.section_id,
                    title: chunk.title.clone(),
                },
            })
            .collect();

        let chunk_count = chunks.len();
        self.store
            .replace_document(doc_id, trimmed.to_string(), chunks);
        self.vector.add(entries).map_err(|e| DocqaError::Ingestion {
            doc_id: doc_id.to_string(),
            message: format!("failed to index chunks: {}", e),
        })?;

        tracing::info!(
            "Ingested document '{}': {} chunks ({:?} policy)",
            doc_id,
            chunk_count,
            self.config.policy
        );
        Ok(())
    }
}
