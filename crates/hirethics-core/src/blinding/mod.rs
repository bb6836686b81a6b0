//! Proxy blinding.
//!
//! Produces a copy of a candidate text with identity fields and institution
//! names masked, and records what was removed. Masking runs in a fixed
//! order: identity fields, strict tokens, generic tokens, then a final sweep
//! that removes any remaining exact occurrence of a recorded token.

pub mod patterns;

use regex::Regex;

use crate::config::{AuditConfig, MaskingConfig};
use crate::types::{BlindingReport, IdentityField};
use crate::EngineError;

use patterns::{
    collapse_whitespace, is_name_line, literal_token_pattern, replace_matches, EMAIL_PATTERN,
    GENERIC_INSTITUTION_PATTERN, INSTITUTION_PLACEHOLDER, NAME_SCAN_LINES, PHONE_PATTERN,
};

/// How the name field is found.
#[derive(Debug, Clone)]
enum NameRule {
    /// First name-like line near the top of the text
    FirstLine,
    /// Every match of a configured pattern
    Pattern(Regex),
}

#[derive(Debug, Clone)]
struct StrictToken {
    token: String,
    pattern: Regex,
}

/// Masks identity and proxy tokens in candidate text.
#[derive(Debug, Clone)]
pub struct ProxyBlinder {
    masking: MaskingConfig,
    name: NameRule,
    email: Regex,
    phone: Regex,
    strict: Vec<StrictToken>,
}

impl ProxyBlinder {
    /// Blinder with the default token list and patterns.
    pub fn new() -> Self {
        let defaults = AuditConfig::default();
        Self {
            masking: defaults.masking,
            name: NameRule::FirstLine,
            email: EMAIL_PATTERN.clone(),
            phone: PHONE_PATTERN.clone(),
            strict: compile_strict_tokens(&defaults.strict_token_list),
        }
    }

    /// Build from configuration. Fails only on an invalid override pattern.
    pub fn from_config(config: &AuditConfig) -> Result<Self, EngineError> {
        let overrides = &config.identity_field_patterns;

        let name = match &overrides.name {
            Some(p) => NameRule::Pattern(compile_override(IdentityField::Name, p)?),
            None => NameRule::FirstLine,
        };
        let email = match &overrides.email {
            Some(p) => compile_override(IdentityField::Email, p)?,
            None => EMAIL_PATTERN.clone(),
        };
        let phone = match &overrides.phone {
            Some(p) => compile_override(IdentityField::Phone, p)?,
            None => PHONE_PATTERN.clone(),
        };

        Ok(Self {
            masking: config.masking,
            name,
            email,
            phone,
            strict: compile_strict_tokens(&config.strict_token_list),
        })
    }

    /// Blind a candidate text. The input is never modified.
    pub fn blind(&self, text: &str) -> BlindingReport {
        let mut report = BlindingReport::default();
        let mut blinded = text.to_string();

        if self.masking.identity {
            blinded = self.mask_identity(&blinded, &mut report);
        }

        if self.masking.strict_tokens {
            for strict in &self.strict {
                let (next, found) =
                    replace_matches(&blinded, &strict.pattern, INSTITUTION_PLACEHOLDER);
                if !found.is_empty() {
                    report.tokens_strict_removed.insert(strict.token.clone());
                    blinded = next;
                }
            }
        }

        if self.masking.generic_tokens {
            let (next, found) =
                replace_matches(&blinded, &GENERIC_INSTITUTION_PATTERN, INSTITUTION_PLACEHOLDER);
            for token in found {
                report.tokens_generic_removed.insert(collapse_whitespace(&token));
            }
            blinded = next;
        }

        // Exact leftovers: case variants of acronyms, tokens split by masking
        let recorded: Vec<String> = report.removed_tokens().map(str::to_string).collect();
        for token in &recorded {
            if blinded.contains(token.as_str()) {
                blinded = blinded.replace(token.as_str(), INSTITUTION_PLACEHOLDER);
            }
        }

        report.blinded_text = blinded;
        debug_assert!(report.leaked_tokens().is_empty());

        tracing::debug!(
            strict = report.tokens_strict_removed.len(),
            generic = report.tokens_generic_removed.len(),
            identity = report.identity_fields_removed.len(),
            "Blinded candidate text"
        );

        report
    }

    fn mask_identity(&self, text: &str, report: &mut BlindingReport) -> String {
        let mut text = match &self.name {
            NameRule::FirstLine => mask_name_line(text),
            NameRule::Pattern(pattern) => {
                let (next, found) = replace_matches(text, pattern, IdentityField::Name.placeholder());
                (!found.is_empty()).then_some(next)
            }
        }
        .map(|masked| {
            report.identity_fields_removed.insert(IdentityField::Name);
            masked
        })
        .unwrap_or_else(|| text.to_string());

        for (field, pattern) in [
            (IdentityField::Email, &self.email),
            (IdentityField::Phone, &self.phone),
        ] {
            let (next, found) = replace_matches(&text, pattern, field.placeholder());
            if !found.is_empty() {
                report.identity_fields_removed.insert(field);
                text = next;
            }
        }

        text
    }
}

impl Default for ProxyBlinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Mask the first name-like line among the first [`NAME_SCAN_LINES`]
/// non-blank lines, plus any later verbatim repeat of that name. Headers
/// and headlines are skipped. `None` when no line qualifies.
fn mask_name_line(text: &str) -> Option<String> {
    let line = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(NAME_SCAN_LINES)
        .find(|l| is_name_line(l))?;
    Some(text.replace(line, IdentityField::Name.placeholder()))
}

fn compile_override(field: IdentityField, pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|source| EngineError::Pattern {
        field: field.as_str().to_string(),
        source,
    })
}

/// Compile the strict token list, dropping tokens that cannot be masked
/// without the placeholder itself reintroducing them.
fn compile_strict_tokens(tokens: &[String]) -> Vec<StrictToken> {
    let placeholders = [
        INSTITUTION_PLACEHOLDER,
        IdentityField::Name.placeholder(),
        IdentityField::Email.placeholder(),
        IdentityField::Phone.placeholder(),
    ];

    let mut compiled: Vec<StrictToken> = Vec::with_capacity(tokens.len());
    for raw in tokens {
        let token = raw.trim();
        if token.is_empty() || compiled.iter().any(|s| s.token == token) {
            continue;
        }
        if placeholders
            .iter()
            .any(|p| p.contains(token) || token.contains(p))
        {
            tracing::warn!(token, "Strict token collides with a placeholder, skipping");
            continue;
        }
        match literal_token_pattern(token) {
            Ok(pattern) => compiled.push(StrictToken {
                token: token.to_string(),
                pattern,
            }),
            Err(e) => tracing::warn!(token, error = %e, "Skipping uncompilable strict token"),
        }
    }
    compiled
}
