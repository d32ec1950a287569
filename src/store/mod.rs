//! In-memory document and chunk store
//!
//! Holds the full text of every ingested document alongside the immutable
//! chunk corpus derived from it. Replacing a document removes every prior
//! chunk for that `doc_id` before the new set is inserted, which is what
//! makes ingestion idempotent per document.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Position of a chunk in the document structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkLevel {
    /// Large parent chunk in hierarchical mode
    Section,
    /// Small retrievable chunk in hierarchical mode, linked to its section
    Detail,
    /// Heading-bounded chunk in structural mode
    Structural,
}

/// A retrievable slice of a document. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique id derived from `doc_id` and structural position
    pub chunk_id: String,
    /// Back-reference to the owning document
    pub doc_id: String,
    pub text: String,
    pub level: ChunkLevel,
    /// Parent section index, set for hierarchical chunks
    pub section_id: Option<usize>,
    /// Heading text, set for structural chunks when one was matched
    pub title: Option<String>,
}

impl Chunk {
    /// Id of a section chunk: `<doc_id>_L<section_id>`
    pub fn section_chunk_id(doc_id: &str, section_id: usize) -> String {
        format!("{}_L{}", doc_id, section_id)
    }

    /// Id of a detail chunk: `<doc_id>_L<section_id>_S<chunk_id>`
    pub fn detail_chunk_id(doc_id: &str, section_id: usize, chunk_id: usize) -> String {
        format!("{}_L{}_S{}", doc_id, section_id, chunk_id)
    }
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    raw_text: String,
    ingested_at: DateTime<Utc>,
    chunk_ids: Vec<String>,
}

/// Summary of one ingested document
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub doc_id: String,
    pub ingested_at: DateTime<Utc>,
    pub chunk_count: usize,
}

#[derive(Default)]
struct StoreInner {
    documents: AHashMap<String, DocumentRecord>,
    chunks: AHashMap<String, Chunk>,
}

/// Shared store of documents and their chunks
#[derive(Default)]
pub struct DocumentStore {
    inner: RwLock<StoreInner>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a document and its chunk set in one write.
    ///
    /// Any chunks belonging to a previous version of `doc_id` are removed
    /// first, so re-ingestion never leaves stale chunks behind.
    pub fn replace_document(&self, doc_id: &str, raw_text: String, chunks: Vec<Chunk>) {
        let mut inner = self.inner.write().expect("store lock poisoned");

        if let Some(previous) = inner.documents.remove(doc_id) {
            for chunk_id in &previous.chunk_ids {
                inner.chunks.remove(chunk_id);
            }
            tracing::debug!(
                "Removed {} stale chunks for document '{}'",
                previous.chunk_ids.len(),
                doc_id
            );
        }

        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
        for chunk in chunks {
            inner.chunks.insert(chunk.chunk_id.clone(), chunk);
        }
        inner.documents.insert(
            doc_id.to_string(),
            DocumentRecord {
                raw_text,
                ingested_at: Utc::now(),
                chunk_ids,
            },
        );
    }

    /// Chunk ids currently stored for a document, empty when unknown
    pub fn chunk_ids_for(&self, doc_id: &str) -> Vec<String> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .documents
            .get(doc_id)
            .map(|d| d.chunk_ids.clone())
            .unwrap_or_default()
    }

    pub fn get_chunk(&self, chunk_id: &str) -> Option<Chunk> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.chunks.get(chunk_id).cloned()
    }

    /// Text of the parent section chunk for hierarchical retrieval
    pub fn section_text(&self, doc_id: &str, section_id: usize) -> Option<String> {
        let id = Chunk::section_chunk_id(doc_id, section_id);
        self.get_chunk(&id).map(|c| c.text)
    }

    /// Chunks that participate in search: detail chunks in hierarchical
    /// mode, structural chunks otherwise. Section chunks only re-attach
    /// context and are never searched directly.
    ///
    /// Sorted by chunk id so the lexical corpus is deterministic.
    pub fn searchable_chunks(&self) -> Vec<Chunk> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut chunks: Vec<Chunk> = inner
            .chunks
            .values()
            .filter(|c| matches!(c.level, ChunkLevel::Detail | ChunkLevel::Structural))
            .cloned()
            .collect();
        chunks.sort_by(|a, b| a.chunk_id.cmp(&b.chunk_id));
        chunks
    }

    /// Concatenated text of every stored document, each prefixed with a
    /// `[DOCUMENT: <id>]` boundary marker. Empty string when nothing is
    /// ingested.
    pub fn full_corpus_text(&self) -> String {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut doc_ids: Vec<&String> = inner.documents.keys().collect();
        doc_ids.sort();

        doc_ids
            .iter()
            .map(|id| {
                let record = &inner.documents[id.as_str()];
                format!("[DOCUMENT: {}]\n{}", id, record.raw_text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Per-document summaries, sorted by document id
    pub fn document_infos(&self) -> Vec<DocumentInfo> {
        let inner = self.inner.read().expect("store lock poisoned");
        let mut infos: Vec<DocumentInfo> = inner
            .documents
            .iter()
            .map(|(doc_id, record)| DocumentInfo {
                doc_id: doc_id.clone(),
                ingested_at: record.ingested_at,
                chunk_count: record.chunk_ids.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        infos
    }

    pub fn document_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document_count() == 0
    }
}
