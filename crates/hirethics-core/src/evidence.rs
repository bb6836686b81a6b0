//! Evidence matching.
//!
//! A quoted evidence span is substantiated when it appears verbatim in the
//! source text, or when most of its words do. The second test tolerates
//! light paraphrasing by a semantic scorer while still catching spans that
//! were never in the CV.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref WORD_PATTERN: Regex = Regex::new(r"\w+").unwrap();
}

/// Minimum token length (in characters) that takes part in overlap matching.
pub const MIN_TOKEN_CHARS: usize = 3;

/// Share of span tokens that must also occur in the source.
pub const DEFAULT_OVERLAP_RATIO: f64 = 0.7;

/// Lowercased word tokens of at least [`MIN_TOKEN_CHARS`] characters.
pub fn word_tokens(text: &str) -> BTreeSet<String> {
    WORD_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// Decides whether an evidence span is backed by a source text.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceMatcher {
    min_overlap: f64,
}

impl EvidenceMatcher {
    pub fn new() -> Self {
        Self {
            min_overlap: DEFAULT_OVERLAP_RATIO,
        }
    }

    pub fn with_min_overlap(min_overlap: f64) -> Self {
        Self { min_overlap }
    }

    /// True when `span` is a verbatim substring of `source`, or when at least
    /// `min_overlap` of its distinct word tokens appear in `source`.
    /// An empty (or whitespace-only) span never matches.
    pub fn matches(&self, span: &str, source: &str) -> bool {
        if span.trim().is_empty() {
            return false;
        }
        if source.contains(span) {
            return true;
        }
        self.overlap(span, source) >= self.min_overlap
    }

    /// `|span tokens ∩ source tokens| / |span tokens|`, 0 when the span has
    /// no qualifying tokens.
    pub fn overlap(&self, span: &str, source: &str) -> f64 {
        let span_tokens = word_tokens(span);
        if span_tokens.is_empty() {
            return 0.0;
        }
        let source_tokens = word_tokens(source);
        let shared = span_tokens.intersection(&source_tokens).count();
        shared as f64 / span_tokens.len() as f64
    }
}

impl Default for EvidenceMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CV: &str = "Led the on-call rotation and cut p99 latency by 40% across distributed services.";

    #[test]
    fn test_verbatim_substring_matches() {
        let matcher = EvidenceMatcher::new();
        assert!(matcher.matches("cut p99 latency", CV));
    }

    #[test]
    fn test_empty_span_never_matches() {
        let matcher = EvidenceMatcher::new();
        assert!(!matcher.matches("", CV));
        assert!(!matcher.matches("   ", CV));
        assert!(!matcher.matches("", ""));
    }

    #[test]
    fn test_paraphrase_matches_by_overlap() {
        let matcher = EvidenceMatcher::new();
        // Reordered and recased: 4 of 4 tokens present
        assert!(matcher.matches("Distributed services latency rotation", CV));
    }

    #[test]
    fn test_fabricated_span_rejected() {
        let matcher = EvidenceMatcher::new();
        assert!(!matcher.matches("Designed Kubernetes operators in Rust", CV));
    }

    #[test]
    fn test_overlap_boundary_is_inclusive() {
        let matcher = EvidenceMatcher::with_min_overlap(0.75);
        // 3 of 4 tokens shared ("led", "call", "rotation"; "kafka" missing)
        let span = "led call rotation kafka";
        assert!((matcher.overlap(span, CV) - 0.75).abs() < 1e-12);
        assert!(matcher.matches(span, CV));
    }

    #[test]
    fn test_short_tokens_ignored() {
        let matcher = EvidenceMatcher::new();
        // "by" and "40" are under three characters, leaving no tokens
        assert_eq!(matcher.overlap("by 40", "nothing here"), 0.0);
        assert!(!matcher.matches("by 40 xx", CV));
    }

    #[test]
    fn test_word_tokens_lowercase_and_dedup() {
        let tokens = word_tokens("Rust rust RUST go");
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("rust"));
    }
}
