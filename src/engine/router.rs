//! Query intent routing
//!
//! Decides whether a query should go through document retrieval or be
//! answered conversationally. Rules are an ordered list of regex
//! predicates; the first match wins and anything unmatched is treated as
//! a document question.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Greeting or small talk, answered without retrieval
    Conversational,
    /// Everything else goes through the retrieval pipeline
    Document,
}

struct RouteRule {
    pattern: Regex,
    intent: QueryIntent,
}

pub struct QueryRouter {
    rules: Vec<RouteRule>,
}

impl QueryRouter {
    pub fn new() -> Self {
        let greeting_patterns = [
            r"(?i)^\s*(hi|hello|hey|howdy)\b",
            r"(?i)^\s*good\s+(morning|afternoon|evening|night)\b",
            r"(?i)^\s*(thanks|thank\s+you)\b",
            r"(?i)^\s*how\s+are\s+you\b",
            r"(?i)^\s*(hola|buenos\s+d[ií]as|buenas\s+tardes|gracias)\b",
        ];

        let rules = greeting_patterns
            .iter()
            .map(|pattern| RouteRule {
                // Patterns are static and known valid
                pattern: Regex::new(pattern).expect("invalid routing pattern"),
                intent: QueryIntent::Conversational,
            })
            .collect();

        Self { rules }
    }

    pub fn classify(&self, query: &str) -> QueryIntent {
        for rule in &self.rules {
            if rule.pattern.is_match(query) {
                return rule.intent;
            }
        }
        QueryIntent::Document
    }
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::new()
    }
}
