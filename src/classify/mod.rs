//! Negative-response classification
//!
//! Detects refusal / "I don't know" answers. The verdict gates two
//! decisions: negative answers are never cached, and a negative grounded
//! answer triggers the full-context fallback.

use crate::config::ClassifierConfig;

pub struct NegativeClassifier {
    config: ClassifierConfig,
}

impl NegativeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// The canonical refusal phrase the prompts instruct the model to use
    pub fn refusal(&self) -> &str {
        &self.config.refusal
    }

    /// A response is negative when it is empty, matches the canonical
    /// refusal exactly (case-insensitive), or - while short enough that a
    /// phrase match cannot be incidental - contains a refusal phrase.
    pub fn is_negative(&self, response: &str) -> bool {
        let trimmed = response.trim();
        if trimmed.is_empty() {
            return true;
        }

        let lowered = trimmed.to_lowercase();
        if lowered == self.config.refusal.to_lowercase() {
            return true;
        }

        // Long answers that merely mention a refusal phrase are kept
        if trimmed.chars().count() >= self.config.short_response_chars {
            return false;
        }

        self.config
            .phrases
            .iter()
            .any(|phrase| lowered.contains(&phrase.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn classifier() -> NegativeClassifier {
        NegativeClassifier::new(Config::default().classifier)
    }

    #[test]
    fn empty_and_whitespace_are_negative() {
        let c = classifier();
        assert!(c.is_negative(""));
        assert!(c.is_negative("   \n\t"));
    }

    #[test]
    fn canonical_refusal_is_negative_case_insensitive() {
        let c = classifier();
        assert!(c.is_negative("I don't know"));
        assert!(c.is_negative("i don't know"));
        assert!(c.is_negative("  I DON'T KNOW  "));
    }

    #[test]
    fn short_answers_with_refusal_phrases_are_negative() {
        let c = classifier();
        assert!(c.is_negative("There is no information about that in the document."));
        assert!(c.is_negative("That is not in the context provided."));
        assert!(c.is_negative("Sorry, I cannot answer that."));
    }

    #[test]
    fn long_answers_mentioning_a_phrase_are_positive() {
        let c = classifier();
        let long = format!(
            "The policy says remote work requires authorization. {} Although the appendix \
             states there is no information about contractors, employees are covered.",
            "Details follow in several clauses of the agreement. ".repeat(4)
        );
        assert!(long.chars().count() >= 240);
        assert!(!c.is_negative(&long));
    }

    #[test]
    fn ordinary_answers_are_positive() {
        let c = classifier();
        assert!(!c.is_negative("Remote work requires written authorization from the employer."));
        assert!(!c.is_negative("Yes."));
    }
}
