//! Ethics flag generation.
//!
//! Flags are a pure function of the two score results, the blinding report,
//! the rubric and the original text. Order is fixed: PROXY_EVIDENCE,
//! BLINDING_DELTA, NO_EVIDENCE, then exactly one DEBUG.

use serde_json::{json, Map, Value};

use crate::blinding::patterns::mentions_token;
use crate::config::{AuditConfig, DEFAULT_DELTA_THRESHOLD};
use crate::evidence::{word_tokens, EvidenceMatcher};
use crate::rubric::Rubric;
use crate::types::{BlindingReport, EthicsFlag, FlagType, ScoreResult, Severity};

/// Absorbs float representation error at the threshold boundary, so that
/// a delta printed as 0.25 flags against a 0.25 threshold.
pub const DELTA_EPSILON: f64 = 1e-9;

/// Whether a proxy token came from the configured list or a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenCategory {
    Strict,
    Generic,
}

impl TokenCategory {
    fn as_str(&self) -> &'static str {
        match self {
            TokenCategory::Strict => "strict",
            TokenCategory::Generic => "generic",
        }
    }
}

/// Compares baseline and blinded scoring for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct FlagGenerator {
    delta_threshold: f64,
    matcher: EvidenceMatcher,
}

impl FlagGenerator {
    pub fn new(delta_threshold: f64) -> Self {
        Self {
            delta_threshold,
            matcher: EvidenceMatcher::new(),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.delta_threshold)
    }

    pub fn with_matcher(mut self, matcher: EvidenceMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn delta_threshold(&self) -> f64 {
        self.delta_threshold
    }

    /// True when `delta` is far enough from zero to raise BLINDING_DELTA.
    pub fn exceeds_threshold(&self, delta: f64) -> bool {
        delta.abs() >= self.delta_threshold - DELTA_EPSILON
    }

    /// Emit the flags for one candidate.
    ///
    /// `source_text` is the original (unblinded) candidate text that the
    /// baseline was scored against.
    pub fn generate(
        &self,
        baseline: &ScoreResult,
        blinded: &ScoreResult,
        blinding: &BlindingReport,
        rubric: &Rubric,
        source_text: &str,
    ) -> Vec<EthicsFlag> {
        let mut flags = Vec::with_capacity(4);

        if let Some(flag) = proxy_evidence_flag(baseline, blinded, blinding) {
            flags.push(flag);
        }

        let delta = baseline.total - blinded.total;
        if self.exceeds_threshold(delta) {
            flags.push(EthicsFlag {
                flag_type: FlagType::BlindingDelta,
                severity: Severity::Warning,
                message: format!(
                    "Total moved by {delta:+.3} under blinding (threshold {:.2})",
                    self.delta_threshold
                ),
                details: json!({
                    "total_before": baseline.total,
                    "total_after": blinded.total,
                    "delta": delta,
                    "threshold": self.delta_threshold,
                    "source_before": baseline.source,
                    "source_after": blinded.source,
                    "sources_differ": baseline.source != blinded.source,
                }),
            });
        }

        let evidence_match: Vec<(&str, bool)> = baseline
            .by_criterion
            .iter()
            .map(|c| {
                let ok = self.matcher.matches(&c.evidence_span, source_text);
                (c.criterion_key.as_str(), ok)
            })
            .collect();

        let failing: Vec<&str> = evidence_match
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(key, _)| *key)
            .collect();

        if !failing.is_empty() {
            flags.push(EthicsFlag {
                flag_type: FlagType::NoEvidence,
                severity: Severity::Warning,
                message: format!("No substantiated evidence for: {}", failing.join(", ")),
                details: json!({ "criteria": failing }),
            });
        }

        flags.push(debug_flag(baseline, blinded, blinding, rubric, &evidence_match));

        tracing::debug!(
            flags = flags.len(),
            delta,
            source_before = %baseline.source,
            source_after = %blinded.source,
            "Generated ethics flags"
        );

        flags
    }
}

impl Default for FlagGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_DELTA_THRESHOLD)
    }
}

/// Keys of the criteria whose evidence span or rationale mentions `token`.
fn cited_by(result: &ScoreResult, token: &str) -> Vec<String> {
    result
        .by_criterion
        .iter()
        .filter(|c| mentions_token(&c.evidence_span, token) || mentions_token(&c.rationale, token))
        .map(|c| c.criterion_key.clone())
        .collect()
}

fn proxy_evidence_flag(
    baseline: &ScoreResult,
    blinded: &ScoreResult,
    blinding: &BlindingReport,
) -> Option<EthicsFlag> {
    let candidates = blinding
        .tokens_strict_removed
        .iter()
        .map(|t| (t, TokenCategory::Strict))
        .chain(
            blinding
                .tokens_generic_removed
                .iter()
                .map(|t| (t, TokenCategory::Generic)),
        );

    let mut strict = Vec::new();
    let mut generic = Vec::new();
    let mut entries = Vec::new();

    for (token, category) in candidates {
        let criteria = cited_by(baseline, token);
        if criteria.is_empty() {
            continue;
        }
        let persists = !cited_by(blinded, token).is_empty();

        match category {
            TokenCategory::Strict => strict.push(token.clone()),
            TokenCategory::Generic => generic.push(token.clone()),
        }
        entries.push(json!({
            "token": token,
            "category": category.as_str(),
            "criteria": criteria,
            "removed_by_blinding": true,
            "persists_after_blinding": persists,
        }));
    }

    if entries.is_empty() {
        return None;
    }

    let cited: Vec<&str> = strict.iter().chain(&generic).map(String::as_str).collect();
    Some(EthicsFlag {
        flag_type: FlagType::ProxyEvidence,
        severity: Severity::Info,
        message: format!("Evidence cites proxy token(s): {}", cited.join(", ")),
        details: json!({
            "tokens_strict": strict,
            "tokens_generic": generic,
            "tokens": entries,
        }),
    })
}

fn debug_flag(
    baseline: &ScoreResult,
    blinded: &ScoreResult,
    blinding: &BlindingReport,
    rubric: &Rubric,
    evidence_match: &[(&str, bool)],
) -> EthicsFlag {
    let weights: Map<String, Value> = rubric
        .criteria()
        .iter()
        .map(|c| (c.key.clone(), json!(c.weight)))
        .collect();

    let evidence_tokens = |result: &ScoreResult| -> Map<String, Value> {
        result
            .by_criterion
            .iter()
            .map(|c| {
                let tokens: Vec<String> = word_tokens(&c.evidence_span).into_iter().collect();
                (c.criterion_key.clone(), json!(tokens))
            })
            .collect()
    };

    let matches: Map<String, Value> = evidence_match
        .iter()
        .map(|(key, ok)| (key.to_string(), json!(ok)))
        .collect();

    EthicsFlag {
        flag_type: FlagType::Debug,
        severity: Severity::Info,
        message: "Scoring transparency details".to_string(),
        details: json!({
            "weights": weights,
            "source_before": baseline.source,
            "source_after": blinded.source,
            "total_before": baseline.total,
            "total_after": blinded.total,
            "tokens_strict_removed": blinding.tokens_strict_removed,
            "tokens_generic_removed": blinding.tokens_generic_removed,
            "identity_fields_removed": blinding.identity_fields_removed,
            "evidence_tokens_before": evidence_tokens(baseline),
            "evidence_tokens_after": evidence_tokens(blinded),
            "evidence_match": matches,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::Criterion;
    use crate::types::{CriterionScore, ScoreSource};

    const SOURCE: &str = "Built distributed systems at MIT. Python daily.";

    fn rubric() -> Rubric {
        Rubric::new(vec![
            Criterion::new("design", 0.5, ""),
            Criterion::new("stack", 0.5, ""),
        ])
        .unwrap()
    }

    fn score(key: &str, value: f64, evidence: &str, rationale: &str) -> CriterionScore {
        CriterionScore {
            criterion_key: key.to_string(),
            score: value,
            evidence_span: evidence.to_string(),
            rationale: rationale.to_string(),
        }
    }

    fn result(design: CriterionScore, stack: CriterionScore) -> ScoreResult {
        ScoreResult::assemble(&rubric(), vec![design, stack], ScoreSource::Fallback)
    }

    fn mit_blinding() -> BlindingReport {
        let mut report = BlindingReport {
            blinded_text: "Built distributed systems at [INSTITUTION]. Python daily.".to_string(),
            ..Default::default()
        };
        report.tokens_strict_removed.insert("MIT".to_string());
        report
    }

    fn types(flags: &[EthicsFlag]) -> Vec<FlagType> {
        flags.iter().map(|f| f.flag_type).collect()
    }

    #[test]
    fn test_clean_candidate_gets_only_debug() {
        let baseline = result(
            score("design", 3.0, "Built distributed systems", "ok"),
            score("stack", 2.0, "Python daily.", "ok"),
        );
        let flags = FlagGenerator::default().generate(
            &baseline,
            &baseline.clone(),
            &BlindingReport::default(),
            &rubric(),
            SOURCE,
        );
        assert_eq!(types(&flags), vec![FlagType::Debug]);
        let details = &flags[0].details;
        assert_eq!(details["weights"]["design"], json!(0.5));
        assert_eq!(details["source_before"], json!("fallback"));
        assert_eq!(details["evidence_match"]["stack"], json!(true));
    }

    #[test]
    fn test_proxy_evidence_on_cited_token() {
        let baseline = result(
            score("design", 3.5, "Built distributed systems at MIT.", "Matched 2"),
            score("stack", 2.5, "Python daily.", "Matched 1"),
        );
        let blinded = result(
            score("design", 3.5, "Built distributed systems at [INSTITUTION].", "Matched 2"),
            score("stack", 2.5, "Python daily.", "Matched 1"),
        );
        let flags =
            FlagGenerator::default().generate(&baseline, &blinded, &mit_blinding(), &rubric(), SOURCE);

        assert_eq!(types(&flags), vec![FlagType::ProxyEvidence, FlagType::Debug]);
        let details = &flags[0].details;
        assert_eq!(details["tokens_strict"], json!(["MIT"]));
        assert_eq!(details["tokens_generic"], json!([]));
        assert_eq!(details["tokens"][0]["criteria"], json!(["design"]));
        assert_eq!(details["tokens"][0]["removed_by_blinding"], json!(true));
        assert_eq!(details["tokens"][0]["persists_after_blinding"], json!(false));
        assert_eq!(flags[0].severity, Severity::Info);
    }

    #[test]
    fn test_proxy_in_blinded_rationale_persists() {
        let baseline = result(
            score("design", 4.0, "Built distributed systems", "Strong MIT background"),
            score("stack", 2.0, "Python daily.", ""),
        );
        let blinded = result(
            score("design", 4.0, "Built distributed systems", "Likely MIT-trained"),
            score("stack", 2.0, "Python daily.", ""),
        );
        let flags =
            FlagGenerator::default().generate(&baseline, &blinded, &mit_blinding(), &rubric(), SOURCE);
        assert_eq!(flags[0].details["tokens"][0]["persists_after_blinding"], json!(true));
    }

    #[test]
    fn test_removed_token_not_cited_no_flag() {
        let baseline = result(
            score("design", 3.0, "Built distributed systems", "ok"),
            score("stack", 2.0, "Python daily.", "ok"),
        );
        let flags = FlagGenerator::default().generate(
            &baseline,
            &baseline.clone(),
            &mit_blinding(),
            &rubric(),
            SOURCE,
        );
        assert!(!flags.iter().any(|f| f.flag_type == FlagType::ProxyEvidence));
    }

    #[test]
    fn test_blinding_delta_inclusive() {
        let generator = FlagGenerator::new(0.25);
        assert!(generator.exceeds_threshold(0.25));
        assert!(generator.exceeds_threshold(-0.25));
        assert!(generator.exceeds_threshold(1.0 - 0.75));
        assert!(!generator.exceeds_threshold(0.2499));
        assert!(!generator.exceeds_threshold(0.0));
    }

    #[test]
    fn test_blinding_delta_flag() {
        let baseline = result(
            score("design", 4.0, "Built distributed systems", ""),
            score("stack", 2.0, "Python daily.", ""),
        );
        let blinded = result(
            score("design", 3.0, "Built distributed systems", ""),
            score("stack", 2.0, "Python daily.", ""),
        );
        let flags = FlagGenerator::default().generate(
            &baseline,
            &blinded,
            &BlindingReport::default(),
            &rubric(),
            SOURCE,
        );
        assert_eq!(types(&flags), vec![FlagType::BlindingDelta, FlagType::Debug]);
        assert_eq!(flags[0].details["delta"], json!(0.5));
        assert_eq!(flags[0].details["sources_differ"], json!(false));
        assert_eq!(flags[0].severity, Severity::Warning);
    }

    #[test]
    fn test_blinding_delta_reports_mixed_sources() {
        let mut baseline = result(
            score("design", 4.0, "Built distributed systems", ""),
            score("stack", 2.0, "Python daily.", ""),
        );
        baseline.source = ScoreSource::Primary;
        let blinded = result(
            score("design", 3.0, "Built distributed systems", ""),
            score("stack", 2.0, "Python daily.", ""),
        );

        let flags = FlagGenerator::default().generate(
            &baseline,
            &blinded,
            &BlindingReport::default(),
            &rubric(),
            SOURCE,
        );
        let details = &flags[0].details;
        assert_eq!(details["source_before"], json!("primary"));
        assert_eq!(details["source_after"], json!("fallback"));
        assert_eq!(details["sources_differ"], json!(true));
    }

    #[test]
    fn test_no_evidence_lists_failing_criteria() {
        let baseline = result(
            score("design", 4.0, "Designed Kubernetes operators in Rust", ""),
            score("stack", 0.0, "", ""),
        );
        let flags = FlagGenerator::default().generate(
            &baseline,
            &baseline.clone(),
            &BlindingReport::default(),
            &rubric(),
            SOURCE,
        );
        assert_eq!(types(&flags), vec![FlagType::NoEvidence, FlagType::Debug]);
        assert_eq!(flags[0].details["criteria"], json!(["design", "stack"]));
        assert_eq!(flags[1].details["evidence_match"]["design"], json!(false));
    }

    #[test]
    fn test_flag_order_all_types() {
        let baseline = result(
            score("design", 5.0, "Built distributed systems at MIT.", ""),
            score("stack", 0.0, "", ""),
        );
        let blinded = result(
            score("design", 2.0, "Built distributed systems at [INSTITUTION].", ""),
            score("stack", 0.0, "", ""),
        );
        let flags =
            FlagGenerator::default().generate(&baseline, &blinded, &mit_blinding(), &rubric(), SOURCE);
        assert_eq!(
            types(&flags),
            vec![
                FlagType::ProxyEvidence,
                FlagType::BlindingDelta,
                FlagType::NoEvidence,
                FlagType::Debug
            ]
        );
    }
}
