//! Structural chunking policy
//!
//! Scans lines for heading-like patterns: numbered articles ("Article 5",
//! "Artículo 12"), "Section N", decimal outline numbers and all-caps
//! headers. Each heading starts a new chunk. Chunks are force-split past a
//! size ceiling and tiny fragments are discarded as noise.

use crate::config::ChunkingConfig;
use crate::store::{Chunk, ChunkLevel};
use regex::Regex;
use std::sync::OnceLock;

fn heading_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)^\s*(article|artículo|articulo)\s+\d+").unwrap(),
            Regex::new(r"(?i)^\s*(section|sección|seccion)\s+\d+").unwrap(),
            Regex::new(r"^\s*\d+(\.\d+)*[.)]\s+\S").unwrap(),
        ]
    })
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if heading_patterns().iter().any(|p| p.is_match(trimmed)) {
        return true;
    }
    // All-caps header: short line of letters with no lowercase
    let char_count = trimmed.chars().count();
    (4..=80).contains(&char_count)
        && trimmed.chars().any(|c| c.is_alphabetic())
        && !trimmed.chars().any(|c| c.is_lowercase())
}

pub fn split(doc_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut title: Option<String> = None;
    let mut index = 0usize;

    let mut flush = |buffer: &mut String, title: &mut Option<String>, index: &mut usize| {
        let body = buffer.trim();
        if body.chars().count() >= config.structural_min_chars {
            chunks.push(Chunk {
                chunk_id: format!("{}_H{}", doc_id, *index),
                doc_id: doc_id.to_string(),
                text: body.to_string(),
                level: ChunkLevel::Structural,
                section_id: None,
                title: title.clone(),
            });
            *index += 1;
        } else if !body.is_empty() {
            tracing::debug!(
                "Discarding {}-char fragment of '{}' as noise",
                body.chars().count(),
                doc_id
            );
        }
        buffer.clear();
        *title = None;
    };

    for line in text.lines() {
        if is_heading(line) {
            flush(&mut buffer, &mut title, &mut index);
            title = Some(line.trim().to_string());
        } else if buffer.chars().count() > config.structural_max_chars {
            // Long run without a heading: cut here so a chunk never grows
            // unbounded
            flush(&mut buffer, &mut title, &mut index);
        }

        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(line);
    }
    flush(&mut buffer, &mut title, &mut index);

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn config() -> ChunkingConfig {
        Config::default().chunking
    }

    #[test]
    fn headings_start_new_chunks() {
        let text = "Article 1: Scope\nThis policy applies to every employee of the company without exception.\nArticle 2: Remote work\nRemote work requires written authorization from the employer before it begins.";
        let chunks = split("policy", text, &config());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chunk_id, "policy_H0");
        assert_eq!(chunks[0].title.as_deref(), Some("Article 1: Scope"));
        assert!(chunks[1].text.contains("written authorization"));
    }

    #[test]
    fn all_caps_lines_are_headings() {
        assert!(is_heading("GENERAL PROVISIONS"));
        assert!(is_heading("  WORKING HOURS  "));
        assert!(!is_heading("General provisions"));
        assert!(!is_heading("HR"));
    }

    #[test]
    fn numbered_outlines_are_headings() {
        assert!(is_heading("1. Introduction"));
        assert!(is_heading("2.3) Compensation details"));
        assert!(is_heading("Section 4 of the agreement"));
        assert!(!is_heading("10 employees attended"));
    }

    #[test]
    fn long_runs_are_force_split() {
        let text = "filler sentence without any heading whatsoever\n".repeat(40);
        let chunks = split("doc", &text, &config());

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // max_chars plus at most one trailing line
            assert!(chunk.text.chars().count() < config().structural_max_chars + 100);
        }
    }

    #[test]
    fn tiny_fragments_are_discarded() {
        let text = "ARTICLE ONE HEADER\nshort\nSECOND HEADER\nThis chunk is comfortably longer than fifty characters so it survives the noise filter.";
        let chunks = split("doc", text, &config());

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("noise filter"));
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = "Article 1\nBody one is long enough to be kept in the output set for sure, well past fifty.\nArticle 2\nBody two is also long enough to be kept in the output set for sure, well past fifty.";
        let a = split("doc", text, &config());
        let b = split("doc", text, &config());
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.chunk_id, y.chunk_id);
            assert_eq!(x.text, y.text);
        }
    }
}
