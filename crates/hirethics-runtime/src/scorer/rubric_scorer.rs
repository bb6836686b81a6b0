//! Primary-then-fallback rubric scoring.
//!
//! Execution per text:
//! 1. If a primary scorer is set and its circuit is closed, call it under
//!    the primary timeout
//! 2. Check the reply: every rubric key exactly once, no unknown keys,
//!    finite scores. Clamp to [0, 5] and reorder into rubric order
//! 3. On any primary failure, record it with the circuit breaker and score
//!    with the fallback instead
//!
//! Evidence that does not match the text is kept; it surfaces later as a
//! NO_EVIDENCE flag.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hirethics_core::{
    CriterionScore, EvidenceMatcher, JobProfile, Rubric, ScoreResult, ScoreSource, MAX_SCORE,
};

use super::{CriterionScorer, HeuristicCriterionScorer, ScorerError};
use crate::resilience::{CircuitBreaker, CircuitBreakerConfig};

/// Scores texts with a primary scorer, falling back to the heuristic.
pub struct RubricScorer {
    primary: Option<Arc<dyn CriterionScorer>>,
    fallback: Arc<dyn CriterionScorer>,
    breaker: CircuitBreaker,
    timeout: Duration,
    matcher: EvidenceMatcher,
}

impl RubricScorer {
    /// Fallback-only scorer.
    pub fn new(timeout: Duration) -> Self {
        Self {
            primary: None,
            fallback: Arc::new(HeuristicCriterionScorer::new()),
            breaker: CircuitBreaker::default(),
            timeout,
            matcher: EvidenceMatcher::new(),
        }
    }

    pub fn with_primary(mut self, primary: Arc<dyn CriterionScorer>) -> Self {
        self.primary = Some(primary);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn CriterionScorer>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(config);
        self
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Score `text` against `profile`'s rubric.
    ///
    /// Only a fallback failure is returned as an error.
    pub async fn score(&self, profile: &JobProfile, text: &str) -> Result<ScoreResult, ScorerError> {
        if let Some(primary) = &self.primary {
            match self.try_primary(primary.as_ref(), profile, text).await {
                Ok(by_criterion) => {
                    self.breaker.record_success();
                    return Ok(ScoreResult::assemble(
                        &profile.rubric,
                        by_criterion,
                        ScoreSource::Primary,
                    ));
                }
                Err(ScorerError::CircuitOpen) => {
                    tracing::debug!(scorer = primary.name(), "Circuit open, using fallback");
                }
                Err(e) => {
                    self.breaker.record_failure();
                    tracing::warn!(
                        scorer = primary.name(),
                        error = %e,
                        "Primary scorer failed, using fallback"
                    );
                }
            }
        }

        let raw = self.fallback.score(profile, text).await?;
        let by_criterion = self.normalize(&profile.rubric, raw, text)?;
        Ok(ScoreResult::assemble(
            &profile.rubric,
            by_criterion,
            ScoreSource::Fallback,
        ))
    }

    async fn try_primary(
        &self,
        primary: &dyn CriterionScorer,
        profile: &JobProfile,
        text: &str,
    ) -> Result<Vec<CriterionScore>, ScorerError> {
        if self.breaker.is_open() {
            return Err(ScorerError::CircuitOpen);
        }

        let raw = tokio::time::timeout(self.timeout, primary.score(profile, text))
            .await
            .map_err(|_| ScorerError::Timeout(self.timeout))??;

        self.normalize(&profile.rubric, raw, text)
    }

    /// Check keys, clamp scores and order entries by rubric.
    fn normalize(
        &self,
        rubric: &Rubric,
        raw: Vec<CriterionScore>,
        text: &str,
    ) -> Result<Vec<CriterionScore>, ScorerError> {
        let mut by_key: HashMap<String, CriterionScore> = HashMap::with_capacity(raw.len());
        for entry in raw {
            if rubric.get(&entry.criterion_key).is_none() {
                return Err(ScorerError::UnknownCriterion(entry.criterion_key));
            }
            if !entry.score.is_finite() {
                return Err(ScorerError::Malformed(format!(
                    "criterion '{}' has non-finite score",
                    entry.criterion_key
                )));
            }
            if by_key.contains_key(&entry.criterion_key) {
                return Err(ScorerError::DuplicateCriterion(entry.criterion_key));
            }
            by_key.insert(entry.criterion_key.clone(), entry);
        }

        rubric
            .keys()
            .map(|key| {
                let mut entry = by_key
                    .remove(key)
                    .ok_or_else(|| ScorerError::MissingCriterion(key.to_string()))?;

                if !(0.0..=MAX_SCORE).contains(&entry.score) {
                    tracing::debug!(criterion = key, score = entry.score, "Clamping score");
                    entry.score = entry.score.clamp(0.0, MAX_SCORE);
                }
                if !entry.evidence_span.is_empty()
                    && !self.matcher.matches(&entry.evidence_span, text)
                {
                    tracing::debug!(criterion = key, "Evidence span not found in text");
                }
                Ok(entry)
            })
            .collect()
    }
}

impl std::fmt::Debug for RubricScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RubricScorer")
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field("fallback", &self.fallback.name())
            .field("timeout", &self.timeout)
            .field("circuit", &self.breaker.state())
            .finish()
    }
}
