//! On-demand BM25 lexical index
//!
//! Built per query from the currently searchable chunk corpus. The corpus
//! is small enough that rebuilding beats keeping a second index consistent
//! with re-ingestion.

use super::{CandidateSource, RetrievalCandidate};
use crate::store::Chunk;
use ahash::AHashMap;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

struct IndexedChunk {
    chunk_id: String,
    text: String,
    term_freq: AHashMap<String, usize>,
    token_count: usize,
}

/// Term-frequency index over chunk texts, whitespace-tokenized
pub struct LexicalIndex {
    chunks: Vec<IndexedChunk>,
    doc_freq: AHashMap<String, usize>,
    avg_token_count: f32,
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
}

impl LexicalIndex {
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut indexed = Vec::with_capacity(chunks.len());
        let mut doc_freq: AHashMap<String, usize> = AHashMap::new();
        let mut total_tokens = 0usize;

        for chunk in chunks {
            let mut term_freq: AHashMap<String, usize> = AHashMap::new();
            let mut token_count = 0usize;
            for token in tokenize(&chunk.text) {
                *term_freq.entry(token).or_insert(0) += 1;
                token_count += 1;
            }
            for term in term_freq.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            total_tokens += token_count;
            indexed.push(IndexedChunk {
                chunk_id: chunk.chunk_id.clone(),
                text: chunk.text.clone(),
                term_freq,
                token_count,
            });
        }

        let avg_token_count = if indexed.is_empty() {
            0.0
        } else {
            total_tokens as f32 / indexed.len() as f32
        };

        Self {
            chunks: indexed,
            doc_freq,
            avg_token_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Top `limit` chunks by BM25 score. Chunks scoring zero or below are
    /// never included.
    pub fn search(&self, query: &str, limit: usize) -> Vec<RetrievalCandidate> {
        if self.chunks.is_empty() {
            return Vec::new();
        }

        let query_tokens: Vec<String> = tokenize(query).collect();
        let corpus_size = self.chunks.len() as f32;

        let mut scored: Vec<RetrievalCandidate> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let mut score = 0.0f32;
                for token in &query_tokens {
                    let tf = *chunk.term_freq.get(token).unwrap_or(&0) as f32;
                    if tf == 0.0 {
                        continue;
                    }
                    let df = *self.doc_freq.get(token).unwrap_or(&0) as f32;
                    let idf = ((corpus_size - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let norm = 1.0 - BM25_B
                        + BM25_B * chunk.token_count as f32 / self.avg_token_count;
                    score += idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm);
                }

                (score > 0.0).then(|| RetrievalCandidate {
                    chunk_id: chunk.chunk_id.clone(),
                    text: chunk.text.clone(),
                    source: CandidateSource::Lexical,
                    raw_score: score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.raw_score
                .partial_cmp(&a.raw_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        scored.truncate(limit);
        scored
    }
}
