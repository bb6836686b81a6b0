//! Criterion scorers.
//!
//! [`CriterionScorer`] is the pluggable capability: given a job and a text,
//! return one [`CriterionScore`] per rubric criterion. Two implementations
//! ship with the runtime:
//! - [`HeuristicCriterionScorer`]: the deterministic keyword fallback
//! - [`LlmRubricScorer`]: a chat model prompted for JSON scores
//!
//! [`RubricScorer`] puts a primary scorer in front of the fallback with a
//! timeout and a circuit breaker.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use hirethics_core::{CriterionScore, JobProfile};

use crate::providers::ProviderError;

mod heuristic;
mod llm;
mod rubric_scorer;

pub use heuristic::HeuristicCriterionScorer;
pub use llm::{parse_scores, LlmRubricScorer, MAX_RATIONALE_CHARS};
pub use rubric_scorer::RubricScorer;

/// Why a scorer produced no usable output.
#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed scorer output: {0}")]
    Malformed(String),

    #[error("Scorer returned unknown criterion '{0}'")]
    UnknownCriterion(String),

    #[error("Scorer omitted criterion '{0}'")]
    MissingCriterion(String),

    #[error("Scorer returned criterion '{0}' more than once")]
    DuplicateCriterion(String),

    #[error("Scorer timed out after {0:?}")]
    Timeout(Duration),

    #[error("Circuit open, primary scorer skipped")]
    CircuitOpen,
}

/// Scores a text against every criterion of a job's rubric.
///
/// Implementations may return entries in any order; [`RubricScorer`]
/// checks keys, reorders into rubric order and clamps scores.
#[async_trait]
pub trait CriterionScorer: Send + Sync {
    async fn score(
        &self,
        profile: &JobProfile,
        text: &str,
    ) -> Result<Vec<CriterionScore>, ScorerError>;

    /// Scorer name for logs.
    fn name(&self) -> &str;
}
