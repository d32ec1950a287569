//! Token-budgeted context assembly
//!
//! Builds the prompt context from ranked candidates, annotated with a
//! relevance marker and optionally followed by the parent section of a
//! detail hit (once per distinct section). An empty result signals "no
//! usable context" to the orchestrator.
//!
//! The second entry point handles oversized external context pushed in
//! directly (full-corpus fallback): segments split on document boundary
//! markers are kept by term-overlap relevance until the budget is spent.

use crate::config::ContextConfig;
use crate::retrieval::{query_terms, term_overlap_score, RankedCandidate};
use crate::store::{ChunkLevel, DocumentStore};
use ahash::AHashSet;
use std::sync::Arc;

/// Boundary marker used when concatenating whole documents
pub const DOC_BOUNDARY: &str = "[DOCUMENT:";

const TRUNCATION_MARKER: &str = "\n\n[... context truncated ...]";

pub struct ContextAssembler {
    store: Arc<DocumentStore>,
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(store: Arc<DocumentStore>, config: ContextConfig) -> Self {
        Self { store, config }
    }

    /// Concatenate ranked candidates into a budgeted context string.
    ///
    /// Candidates below the relevance threshold are dropped; when none
    /// pass, the empty string is returned and no generation should happen.
    pub fn build(&self, ranked: &[RankedCandidate]) -> String {
        let mut context = String::new();
        let mut seen_sections: AHashSet<(String, usize)> = AHashSet::new();
        let mut passage = 0usize;

        for candidate in ranked {
            if candidate.combined_score < self.config.min_relevance {
                continue;
            }

            passage += 1;
            let block = format!(
                "[Passage {} | relevance: {}]\n{}",
                passage,
                relevance_label(candidate.combined_score),
                candidate.candidate.text
            );
            if !self.try_append(&mut context, &block) {
                break;
            }

            // Re-attach the parent section of a detail hit, once per
            // distinct section
            if let Some(section_block) = self.parent_section(candidate, &mut seen_sections) {
                if !self.try_append(&mut context, &section_block) {
                    break;
                }
            }
        }

        context
    }

    fn parent_section(
        &self,
        candidate: &RankedCandidate,
        seen: &mut AHashSet<(String, usize)>,
    ) -> Option<String> {
        let chunk = self.store.get_chunk(&candidate.candidate.chunk_id)?;
        if chunk.level != ChunkLevel::Detail {
            return None;
        }
        let section_id = chunk.section_id?;
        if !seen.insert((chunk.doc_id.clone(), section_id)) {
            return None;
        }
        let section_text = self.store.section_text(&chunk.doc_id, section_id)?;
        Some(format!(
            "[Section {} of {}]\n{}",
            section_id, chunk.doc_id, section_text
        ))
    }

    fn try_append(&self, context: &mut String, block: &str) -> bool {
        let separator = if context.is_empty() { 0 } else { 2 };
        if context.chars().count() + separator + block.chars().count() > self.config.max_chars {
            return false;
        }
        if !context.is_empty() {
            context.push_str("\n\n");
        }
        context.push_str(block);
        true
    }

    /// Relevance-ranked truncation for oversized external context.
    ///
    /// Splits on document boundary markers, keeps segments whose
    /// term-overlap score clears the relevance threshold (best first)
    /// until the budget is reached. When nothing qualifies, the head of
    /// the original text is kept with a truncation marker appended.
    pub fn truncate_external(&self, text: &str, query: &str) -> String {
        if text.chars().count() <= self.config.max_chars {
            return text.to_string();
        }

        tracing::debug!(
            "External context of {} chars exceeds budget {}, truncating by relevance",
            text.chars().count(),
            self.config.max_chars
        );

        let terms = query_terms(query);
        let mut segments: Vec<(f32, &str)> = split_on_boundaries(text)
            .into_iter()
            .map(|segment| (term_overlap_score(&terms, segment), segment))
            .filter(|(score, _)| *score >= self.config.min_relevance)
            .collect();
        segments.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut kept = String::new();
        for (_, segment) in segments {
            let trimmed = segment.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !self.try_append_budget(&mut kept, trimmed) {
                break;
            }
        }

        if kept.is_empty() {
            let head: String = text.chars().take(self.config.max_chars).collect();
            return format!("{}{}", head, TRUNCATION_MARKER);
        }
        kept
    }

    fn try_append_budget(&self, acc: &mut String, segment: &str) -> bool {
        let separator = if acc.is_empty() { 0 } else { 2 };
        if acc.chars().count() + separator + segment.chars().count() > self.config.max_chars {
            return false;
        }
        if !acc.is_empty() {
            acc.push_str("\n\n");
        }
        acc.push_str(segment);
        true
    }
}

fn relevance_label(score: f32) -> &'static str {
    if score >= 0.7 {
        "high"
    } else if score >= 0.5 {
        "medium"
    } else {
        "low"
    }
}

/// Split concatenated corpus text on `[DOCUMENT:` markers, keeping each
/// marker with its segment. Text without markers is a single segment.
fn split_on_boundaries(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = text.match_indices(DOC_BOUNDARY).map(|(i, _)| i).collect();
    if starts.is_empty() {
        return vec![text];
    }

    let mut segments = Vec::with_capacity(starts.len() + 1);
    if starts[0] > 0 {
        segments.push(&text[..starts[0]]);
    }
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        segments.push(&text[start..end]);
    }
    segments
}
