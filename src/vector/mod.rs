//! Vector index port and adapters
//!
//! The index is treated as an opaque service: it takes chunk texts with
//! metadata and answers nearest-neighbour queries with cosine distances.
//! Adapters: [`MemoryVectorStore`] (brute-force, embeds via an injected
//! [`EmbeddingProvider`]) for tests and small corpora, with the fastembed
//! provider for production embeddings.

mod fastembed;
mod hashed;
mod memory;

pub use fastembed::FastEmbedProvider;
pub use hashed::HashedEmbedder;
pub use memory::MemoryVectorStore;

use crate::store::ChunkLevel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitializationError(String),

    #[error("Embedding generation failed: {0}")]
    GenerationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector backend error: {0}")]
    Backend(String),
}

/// Trait for embedding providers
///
/// Allows abstraction over different embedding backends (fastembed, hashed
/// bag-of-words, remote services).
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts (batched for efficiency)
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Metadata stored alongside each indexed chunk
#[derive(Debug, Clone)]
pub struct VectorMeta {
    pub doc_id: String,
    pub level: ChunkLevel,
    pub section_id: Option<usize>,
    pub title: Option<String>,
}

/// One chunk to index
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub chunk_id: String,
    pub text: String,
    pub meta: VectorMeta,
}

/// Nearest-neighbour hit. `distance` is cosine distance; similarity is
/// recovered as `1.0 - distance`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: String,
    pub text: String,
    pub distance: f32,
}

/// Opaque vector-search collection keyed by chunk id
pub trait VectorStore: Send + Sync {
    /// Index a batch of chunks
    fn add(&self, entries: Vec<VectorEntry>) -> Result<(), VectorStoreError>;

    /// Nearest chunks for a query text, optionally restricted to one chunk
    /// level, ordered by ascending distance
    fn query(
        &self,
        text: &str,
        top_k: usize,
        level: Option<ChunkLevel>,
    ) -> Result<Vec<VectorHit>, VectorStoreError>;

    /// Remove every chunk belonging to a document
    fn delete_doc(&self, doc_id: &str) -> Result<(), VectorStoreError>;

    /// Number of indexed chunks
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
