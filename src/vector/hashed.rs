//! Deterministic hashed bag-of-words embedder
//!
//! Feature-hashing fallback used by tests and offline installs: each token
//! increments one bucket of a fixed-size vector, which is then L2
//! normalized. Cosine similarity over these vectors approximates term
//! overlap, which is enough to exercise the retrieval contract without a
//! model download.

use super::{EmbeddingError, EmbeddingProvider};
use std::hash::{BuildHasher, Hash, Hasher};

pub struct HashedEmbedder {
    dimension: usize,
    hasher: ahash::RandomState,
}

impl HashedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            // Fixed keys: embeddings must be identical across processes
            hasher: ahash::RandomState::with_seeds(7, 11, 13, 17),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut h = self.hasher.build_hasher();
        token.hash(&mut h);
        (h.finish() as usize) % self.dimension
    }
}

impl EmbeddingProvider for HashedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(&token)] += 1.0;
        }

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        Ok(vector)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hashed-bow"
    }
}
