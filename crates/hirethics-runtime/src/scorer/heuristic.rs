use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;

use hirethics_core::{CriterionScore, HeuristicScorer, JobProfile};

use super::{CriterionScorer, ScorerError};

/// Jobs whose compiled keyword tables are kept.
const MAX_CACHED_JOBS: u64 = 256;

/// The deterministic keyword scorer as a [`CriterionScorer`].
///
/// Never fails. Keyword tables are compiled once per distinct job
/// (role context and criteria) and reused across candidates.
#[derive(Clone)]
pub struct HeuristicCriterionScorer {
    scorers: Cache<String, Arc<HeuristicScorer>>,
}

impl HeuristicCriterionScorer {
    pub fn new() -> Self {
        Self {
            scorers: Cache::new(MAX_CACHED_JOBS),
        }
    }

    async fn scorer_for(&self, profile: &JobProfile) -> Arc<HeuristicScorer> {
        self.scorers
            .get_with(table_key(profile), async {
                tracing::debug!(job = %profile.title, "Compiling keyword tables");
                Arc::new(HeuristicScorer::for_job(profile))
            })
            .await
    }
}

impl Default for HeuristicCriterionScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HeuristicCriterionScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeuristicCriterionScorer")
            .field("cached_jobs", &self.scorers.entry_count())
            .finish()
    }
}

/// Everything the keyword tables are derived from.
fn table_key(profile: &JobProfile) -> String {
    let mut key = profile.role_context.to_lowercase();
    for criterion in profile.rubric.criteria() {
        key.push('\u{1f}');
        key.push_str(&criterion.key);
        key.push('\u{1e}');
        key.push_str(&criterion.description);
    }
    key
}

#[async_trait]
impl CriterionScorer for HeuristicCriterionScorer {
    async fn score(
        &self,
        profile: &JobProfile,
        text: &str,
    ) -> Result<Vec<CriterionScore>, ScorerError> {
        let scorer = self.scorer_for(profile).await;
        Ok(scorer.score_criteria(&profile.rubric, text))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
title: "Backend Engineer"
role_context: "backend"
rubric:
  - key: sys_design
    weight: 0.5
  - key: lang_stack
    weight: 0.5
"#;

    #[tokio::test]
    async fn test_matches_core_heuristic() {
        let profile = JobProfile::from_yaml(JOB).unwrap();
        let text = "Built distributed, scalable systems.\nWrote Go and Python.";

        let scores = HeuristicCriterionScorer::new()
            .score(&profile, text)
            .await
            .unwrap();
        let expected = HeuristicScorer::for_job(&profile).score_criteria(&profile.rubric, text);
        assert_eq!(scores, expected);
        assert_eq!(scores[0].criterion_key, "sys_design");
    }

    #[tokio::test]
    async fn test_tables_compiled_once_per_job() {
        let scorer = HeuristicCriterionScorer::new();
        let backend = JobProfile::from_yaml(JOB).unwrap();
        let frontend = JobProfile {
            role_context: "frontend".to_string(),
            ..backend.clone()
        };

        let first = scorer.scorer_for(&backend).await;
        let again = scorer.scorer_for(&backend).await;
        let other = scorer.scorer_for(&frontend).await;

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
