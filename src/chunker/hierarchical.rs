//! Hierarchical chunking policy
//!
//! Documents are split into large sections, each of which is re-split into
//! small detail chunks. Detail chunks record their parent section id so
//! retrieval can re-attach section-level context around a hit.

use crate::config::ChunkingConfig;
use crate::store::{Chunk, ChunkLevel};

pub fn split(doc_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    let sections = split_with_overlap(text, config.section_size, config.section_overlap);
    for (section_id, section_text) in sections.iter().enumerate() {
        chunks.push(Chunk {
            chunk_id: Chunk::section_chunk_id(doc_id, section_id),
            doc_id: doc_id.to_string(),
            text: section_text.clone(),
            level: ChunkLevel::Section,
            section_id: Some(section_id),
            title: None,
        });

        let details = split_with_overlap(section_text, config.detail_size, config.detail_overlap);
        for (detail_id, detail_text) in details.into_iter().enumerate() {
            chunks.push(Chunk {
                chunk_id: Chunk::detail_chunk_id(doc_id, section_id, detail_id),
                doc_id: doc_id.to_string(),
                text: detail_text,
                level: ChunkLevel::Detail,
                section_id: Some(section_id),
                title: None,
            });
        }
    }

    chunks
}

/// Split text into pieces of roughly `size` characters with `overlap`
/// characters carried over between consecutive pieces.
///
/// Cuts prefer a whitespace boundary in the back half of the window so
/// words are not bisected. Deterministic for a given input.
pub(crate) fn split_with_overlap(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let mut cut = end;
        if end < chars.len() {
            if let Some(pos) = (start + size / 2..end).rev().find(|&i| chars[i].is_whitespace()) {
                cut = pos;
            }
        }

        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if cut >= chars.len() {
            break;
        }
        start = cut.saturating_sub(overlap).max(start + 1);
    }

    pieces
}
