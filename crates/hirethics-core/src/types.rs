//! Value types shared by the scorer, blinder, flag generator and batch evaluator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::rubric::Rubric;

/// Upper bound of every criterion score and of the weighted total.
pub const MAX_SCORE: f64 = 5.0;

/// Which scorer produced a [`ScoreResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// The pluggable semantic scorer
    Primary,
    /// The deterministic keyword heuristic
    Fallback,
}

impl ScoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreSource::Primary => "primary",
            ScoreSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ScoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score for one criterion, computed against one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion_key: String,

    /// In `[0, 5]`
    pub score: f64,

    /// Excerpt of the scored text justifying the score, or empty
    pub evidence_span: String,

    pub rationale: String,
}

/// Per-criterion scores plus the weighted total for one candidate text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// `Σ weight_i × score_i`, in `[0, 5]`
    pub total: f64,

    /// One entry per rubric criterion, in rubric order
    pub by_criterion: Vec<CriterionScore>,

    pub source: ScoreSource,
}

impl ScoreResult {
    /// Assemble a result and compute its weighted total.
    ///
    /// `by_criterion` must hold one score per rubric criterion in rubric
    /// order, each already within `[0, 5]`.
    pub fn assemble(rubric: &Rubric, by_criterion: Vec<CriterionScore>, source: ScoreSource) -> Self {
        debug_assert_eq!(by_criterion.len(), rubric.len());

        let mut total = 0.0;
        for (criterion, scored) in rubric.criteria().iter().zip(&by_criterion) {
            debug_assert_eq!(criterion.key, scored.criterion_key);
            debug_assert!(
                scored.score.is_finite() && (0.0..=MAX_SCORE).contains(&scored.score),
                "criterion '{}' scored {} outside [0, 5]",
                scored.criterion_key,
                scored.score
            );
            total += criterion.weight * scored.score;
        }

        Self {
            total: clamp_total(total),
            by_criterion,
            source,
        }
    }

    /// Score for a criterion key.
    pub fn criterion(&self, key: &str) -> Option<&CriterionScore> {
        self.by_criterion.iter().find(|c| c.criterion_key == key)
    }
}

/// Keep a weighted total inside `[0, 5]`.
///
/// Weights may sum to slightly more than 1.0 (validation tolerance), so a
/// small overshoot is expected and clamped quietly.
fn clamp_total(total: f64) -> f64 {
    if !total.is_finite() || total < 0.0 {
        tracing::warn!(total, "Weighted total outside [0, 5], clamping");
        return 0.0;
    }
    if total > MAX_SCORE {
        tracing::debug!(total, "Weighted total above 5 within weight tolerance, clamping");
        return MAX_SCORE;
    }
    total
}

/// Identity fields the blinder can mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    Name,
    Email,
    Phone,
}

impl IdentityField {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::Name => "name",
            IdentityField::Email => "email",
            IdentityField::Phone => "phone",
        }
    }

    /// Placeholder written in place of the masked value.
    pub fn placeholder(&self) -> &'static str {
        match self {
            IdentityField::Name => "[NAME]",
            IdentityField::Email => "[EMAIL]",
            IdentityField::Phone => "[PHONE]",
        }
    }
}

/// Output of blinding one candidate text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlindingReport {
    pub blinded_text: String,

    /// Configured institution/brand names that were removed
    pub tokens_strict_removed: BTreeSet<String>,

    /// Pattern-matched institution names that were removed
    pub tokens_generic_removed: BTreeSet<String>,

    pub identity_fields_removed: BTreeSet<IdentityField>,
}

impl BlindingReport {
    /// Strict and generic tokens together.
    pub fn removed_tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens_strict_removed
            .iter()
            .chain(self.tokens_generic_removed.iter())
            .map(String::as_str)
    }

    /// Removed tokens still present in `blinded_text`. Empty for any report
    /// produced by [`crate::ProxyBlinder`].
    pub fn leaked_tokens(&self) -> Vec<&str> {
        self.removed_tokens()
            .filter(|t| self.blinded_text.contains(t))
            .collect()
    }
}

/// Kinds of ethics flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagType {
    /// Evidence or rationale cites a proxy token
    ProxyEvidence,
    /// Total moved by at least the threshold under blinding
    BlindingDelta,
    /// Some evidence spans are not substantiated by the source text
    NoEvidence,
    /// Transparency payload, one per candidate
    Debug,
}

impl FlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::ProxyEvidence => "PROXY_EVIDENCE",
            FlagType::BlindingDelta => "BLINDING_DELTA",
            FlagType::NoEvidence => "NO_EVIDENCE",
            FlagType::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding about one candidate's scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthicsFlag {
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub severity: Severity,
    pub message: String,
    pub details: serde_json::Value,
}

/// Everything the pipeline produced for one candidate.
///
/// Built only once baseline, blinded and flags all exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAudit {
    pub candidate_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    pub baseline: ScoreResult,
    pub blinded: ScoreResult,
    pub blinding: BlindingReport,
    pub flags: Vec<EthicsFlag>,
}

impl CandidateAudit {
    /// `total_before − total_after`.
    pub fn delta(&self) -> f64 {
        self.baseline.total - self.blinded.total
    }

    pub fn has_flag(&self, flag_type: FlagType) -> bool {
        self.flags.iter().any(|f| f.flag_type == flag_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::{Criterion, Rubric};

    fn rubric() -> Rubric {
        Rubric::new(vec![
            Criterion::new("a", 0.6, ""),
            Criterion::new("b", 0.4, ""),
        ])
        .unwrap()
    }

    fn score(key: &str, value: f64) -> CriterionScore {
        CriterionScore {
            criterion_key: key.to_string(),
            score: value,
            evidence_span: String::new(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_weighted_total() {
        let result = ScoreResult::assemble(
            &rubric(),
            vec![score("a", 4.0), score("b", 2.0)],
            ScoreSource::Fallback,
        );
        assert!((result.total - 3.2).abs() < 1e-12);
        assert_eq!(result.criterion("b").map(|c| c.score), Some(2.0));
    }

    #[test]
    fn test_total_overshoot_clamped() {
        let rubric = Rubric::new(vec![
            Criterion::new("a", 0.505, ""),
            Criterion::new("b", 0.5, ""),
        ])
        .unwrap();
        let result = ScoreResult::assemble(
            &rubric,
            vec![score("a", 5.0), score("b", 5.0)],
            ScoreSource::Primary,
        );
        assert_eq!(result.total, MAX_SCORE);
    }

    #[test]
    fn test_flag_type_serializes_screaming() {
        let json = serde_json::to_string(&FlagType::BlindingDelta).unwrap();
        assert_eq!(json, "\"BLINDING_DELTA\"");
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }

    #[test]
    fn test_leaked_tokens() {
        let mut report = BlindingReport {
            blinded_text: "Studied at [INSTITUTION]".to_string(),
            ..Default::default()
        };
        report.tokens_strict_removed.insert("MIT".to_string());
        assert!(report.leaked_tokens().is_empty());

        report.blinded_text.push_str(" and MIT");
        assert_eq!(report.leaked_tokens(), vec!["MIT"]);
    }
}
