//! # hirethics-core
//!
//! Deterministic rubric scoring and bias audit engine.
//!
//! This crate scores a candidate text against a weighted rubric, then audits
//! that scoring by re-scoring a blinded copy of the same text:
//! - Did removing names, contacts and institutions change the score?
//! - Does any evidence lean on a proxy token?
//! - Is every quoted evidence span actually in the CV?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the heuristic scorer, blinder, flags and batch
//!    statistics return identical output for identical input
//! 2. **No I/O**: everything is in-memory except the `from_file` helpers
//! 3. **Validated up front**: a [`Rubric`] can only exist if it is valid
//! 4. **Bounded**: every score and total lies in `[0, 5]`
//!
//! ## Example
//!
//! ```rust,ignore
//! use hirethics_core::{audit_candidate, AuditConfig, JobProfile};
//!
//! let job = JobProfile::from_file("job.yaml")?;
//! let audit = audit_candidate(&job, "cand_1", &cv_text, &AuditConfig::default())?;
//!
//! println!("delta: {:+.2}", audit.delta());
//! for flag in &audit.flags {
//!     println!("{} ({}): {}", flag.flag_type, flag.severity, flag.message);
//! }
//! ```

pub mod batch;
pub mod blinding;
pub mod config;
pub mod evidence;
pub mod flags;
pub mod heuristic;
pub mod rubric;
pub mod types;

// Re-export main types at crate root
pub use batch::{BatchEvaluator, BatchReport, CandidateReport, CandidateSummary};
pub use blinding::ProxyBlinder;
pub use config::{AuditConfig, IdentityPatterns, MaskingConfig};
pub use evidence::EvidenceMatcher;
pub use flags::FlagGenerator;
pub use heuristic::{HeuristicScorer, KeywordTable};
pub use rubric::{Criterion, JobProfile, Rubric, RubricError, RubricValidator};
pub use types::{
    BlindingReport, CandidateAudit, CriterionScore, EthicsFlag, FlagType, IdentityField,
    ScoreResult, ScoreSource, Severity, MAX_SCORE,
};

use thiserror::Error;

/// Errors raised by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Rubric error: {0}")]
    Rubric(#[from] RubricError),

    #[error("Invalid {field} pattern: {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Audit one candidate offline, using the heuristic scorer for both runs.
///
/// Runs the whole per-candidate pipeline: baseline scoring, blinding,
/// blinded scoring and flag generation.
pub fn audit_candidate(
    profile: &JobProfile,
    candidate_id: &str,
    text: &str,
    config: &AuditConfig,
) -> Result<CandidateAudit, EngineError> {
    config.validate()?;

    let scorer = HeuristicScorer::for_job(profile);
    let blinder = ProxyBlinder::from_config(config)?;
    let generator = FlagGenerator::from_config(config);

    let baseline = scorer.score(&profile.rubric, text);
    let blinding = blinder.blind(text);
    let blinded = scorer.score(&profile.rubric, &blinding.blinded_text);
    let flags = generator.generate(&baseline, &blinded, &blinding, &profile.rubric, text);

    Ok(CandidateAudit {
        candidate_id: candidate_id.to_string(),
        display_name: None,
        baseline,
        blinded,
        blinding,
        flags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
title: "Backend Engineer"
role_context: "backend"
rubric:
  - key: sys_design
    weight: 0.35
  - key: prod_ownership
    weight: 0.20
  - key: lang_stack
    weight: 0.25
  - key: code_quality
    weight: 0.20
"#;

    #[test]
    fn test_audit_candidate_pipeline() {
        let profile = JobProfile::from_yaml(JOB).unwrap();
        let cv = "Jane Doe\njane@example.com\nBuilt distributed, scalable systems at MIT.\nOn-call owner.";
        let audit = audit_candidate(&profile, "cand_1", cv, &AuditConfig::default()).unwrap();

        assert_eq!(audit.baseline.source, ScoreSource::Fallback);
        assert_eq!(audit.blinded.source, ScoreSource::Fallback);
        assert!(audit.blinding.tokens_strict_removed.contains("MIT"));
        assert!(audit.has_flag(FlagType::ProxyEvidence));
        assert_eq!(
            audit.flags.iter().filter(|f| f.flag_type == FlagType::Debug).count(),
            1
        );
        // Keywords survive blinding, so the totals agree
        assert_eq!(audit.delta(), 0.0);
    }

    #[test]
    fn test_headline_cv_without_proxies_has_no_delta() {
        let profile = JobProfile::from_yaml(JOB).unwrap();
        let cv = "Distributed Systems Engineer\nBuilt scalable services in Python.";
        let audit = audit_candidate(&profile, "cand_1", cv, &AuditConfig::default()).unwrap();

        assert_eq!(audit.blinding.blinded_text, cv);
        assert!(audit.blinding.removed_tokens().next().is_none());
        assert_eq!(audit.delta(), 0.0);
        assert!(!audit.has_flag(FlagType::BlindingDelta));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let profile = JobProfile::from_yaml(JOB).unwrap();
        let config = AuditConfig {
            delta_threshold: f64::NAN,
            ..AuditConfig::default()
        };
        assert!(matches!(
            audit_candidate(&profile, "c", "text", &config),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
