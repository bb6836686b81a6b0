//! Detection patterns for identity fields and institution names.
//!
//! Shared by the blinder and by flag generation, which needs the same
//! word-bounded matching when looking for proxy tokens in rationales.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

/// Placeholder for strict and generic institution tokens.
pub const INSTITUTION_PLACEHOLDER: &str = "[INSTITUTION]";

/// Non-blank lines from the top of a text searched for the name.
pub const NAME_SCAN_LINES: usize = 3;

/// Words that make a capitalized line a headline or a section title
/// rather than a personal name. Lowercase.
const NON_NAME_WORDS: &[&str] = &[
    // Document headers
    "curriculum", "vitae", "resume", "résumé", "cv",
    // Roles
    "engineer", "developer", "manager", "scientist", "architect", "analyst", "designer",
    "consultant", "lead", "director", "administrator", "specialist", "intern", "programmer",
    "researcher", "officer", "technician", "founder", "owner", "head",
    // Seniority and field
    "senior", "junior", "principal", "staff", "chief", "software", "systems", "system",
    "data", "distributed", "backend", "frontend", "stack", "platform", "product",
    "engineering", "machine", "learning", "cloud", "security", "devops",
    // Section titles
    "summary", "profile", "experience", "education", "skills", "objective", "contact",
    "references", "projects", "publications",
];

lazy_static! {
    // =========================================================================
    // IDENTITY PATTERNS
    // =========================================================================

    /// Email address (RFC 5322 simplified)
    pub static ref EMAIL_PATTERN: Regex = Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"
    ).unwrap();

    /// Phone number with optional country code and area code in parentheses.
    /// Year ranges like "2019-2023" need a third digit group, so they pass.
    pub static ref PHONE_PATTERN: Regex = Regex::new(
        r"(?:\+\d{1,3}[-.\s]?)?(?:\(\d{2,4}\)|\d{2,4})[-.\s]?\d{3,4}[-.\s]?\d{3,4}\b"
    ).unwrap();

    /// A line made of two to four capitalized words, e.g. "Jean-Luc Picard"
    pub static ref NAME_LINE_PATTERN: Regex = Regex::new(
        r"^\p{Lu}\p{Ll}*(?:[ '\-]+\p{Lu}\p{Ll}+){1,3}$"
    ).unwrap();

    // =========================================================================
    // INSTITUTION PATTERNS
    // =========================================================================

    /// "<Capitalized Words> University|College|Institute" and
    /// "University|College|Institute of <Capitalized Words>"
    pub static ref GENERIC_INSTITUTION_PATTERN: Regex = Regex::new(
        r"\b(?:(?:\p{Lu}[\p{L}&.\-]*[ \t]+){1,4}(?:University|College|Institute)|(?:University|College|Institute)[ \t]+of[ \t]+\p{Lu}[\p{L}\-]*(?:[ \t]+\p{Lu}[\p{L}\-]*){0,3})\b"
    ).unwrap();
}

/// True when `line` looks like a personal name: two to four capitalized
/// words, none of them a role, field or section word.
pub fn is_name_line(line: &str) -> bool {
    NAME_LINE_PATTERN.is_match(line)
        && !line
            .split(|c: char| c == ' ' || c == '-' || c == '\'')
            .filter(|w| !w.is_empty())
            .any(|w| NON_NAME_WORDS.contains(&w.to_lowercase().as_str()))
}

/// Compile a literal token into a word-bounded matcher.
///
/// All-caps tokens (acronyms such as "MIT") match case-sensitively so that
/// ordinary words are left alone; anything else matches case-insensitively.
pub fn literal_token_pattern(token: &str) -> Result<Regex, regex::Error> {
    let starts_word = token.chars().next().is_some_and(|c| c.is_alphanumeric());
    let ends_word = token.chars().last().is_some_and(|c| c.is_alphanumeric());
    let acronym = token.chars().any(|c| c.is_alphabetic())
        && !token.chars().any(|c| c.is_lowercase());

    let pattern = format!(
        "{}{}{}",
        if starts_word { r"\b" } else { "" },
        regex::escape(token),
        if ends_word { r"\b" } else { "" },
    );

    RegexBuilder::new(&pattern)
        .case_insensitive(!acronym)
        .build()
}

/// Case-insensitive, word-bounded containment check.
pub fn mentions_token(text: &str, token: &str) -> bool {
    if token.trim().is_empty() {
        return false;
    }
    match literal_token_pattern(&token.to_lowercase()) {
        Ok(pattern) => pattern.is_match(text),
        Err(_) => text.to_lowercase().contains(&token.to_lowercase()),
    }
}

/// Replace every match of `pattern` with `placeholder`, returning the new
/// text and the matched strings in order of appearance.
pub fn replace_matches(text: &str, pattern: &Regex, placeholder: &str) -> (String, Vec<String>) {
    let found: Vec<String> = pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    if found.is_empty() {
        return (text.to_string(), found);
    }
    (pattern.replace_all(text, placeholder).into_owned(), found)
}

/// Collapse runs of whitespace to single spaces.
pub fn collapse_whitespace(token: &str) -> String {
    token.split_whitespace().collect::<Vec<_>>().join(" ")
}
