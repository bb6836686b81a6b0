//! The audit engine.
//!
//! Per candidate:
//! 1. Blind the text
//! 2. Score the original and the blinded text concurrently
//! 3. Compare the two results and the blinding report into flags
//!
//! A batch runs that pipeline for every candidate with bounded concurrency
//! and is stored only if every candidate completed.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

use hirethics_core::{
    BatchEvaluator, BatchReport, CandidateAudit, CandidateSummary, FlagGenerator, JobProfile,
    ProxyBlinder, ScoreSource,
};

use crate::cache::ReportCache;
use crate::config::RuntimeConfig;
use crate::providers::{LlmProvider, ProviderRegistry};
use crate::resilience::CancellationFlag;
use crate::scorer::{CriterionScorer, LlmRubricScorer, RubricScorer};
use crate::store::{
    new_id, BatchRecord, CandidateRecord, JobRecord, Repository, StoreError, Stores,
};
use crate::RuntimeError;

/// A candidate to register under a job.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateInput {
    pub display_name: Option<String>,

    /// Extracted CV text
    pub text: String,
}

impl CandidateInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            display_name: None,
            text: text.into(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// Outcome of a completed batch run.
#[derive(Debug, Clone)]
pub struct BatchRun {
    pub record: Arc<BatchRecord>,

    /// Scoring calls answered by the primary scorer
    pub primary_scored: usize,

    /// Scoring calls answered by the fallback
    pub fallback_scored: usize,
}

impl BatchRun {
    pub fn batch_id(&self) -> &str {
        &self.record.batch_id
    }
}

/// Scores, blinds, flags and reports on candidates.
pub struct AuditEngine {
    config: RuntimeConfig,
    stores: Stores,
    scorer: RubricScorer,
    blinder: ProxyBlinder,
    flags: FlagGenerator,
    reports: ReportCache,
}

impl AuditEngine {
    pub fn builder() -> AuditEngineBuilder {
        AuditEngineBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn scorer(&self) -> &RubricScorer {
        &self.scorer
    }

    /// Store a job profile and return its id.
    pub fn create_job(&self, profile: JobProfile) -> Result<String, RuntimeError> {
        let job_id = new_id::<JobRecord, _>("job", self.stores.jobs.as_ref());
        self.stores.jobs.insert(JobRecord {
            job_id: job_id.clone(),
            profile,
            created_at: Utc::now(),
        })?;
        tracing::info!(job_id = %job_id, "Job created");
        Ok(job_id)
    }

    /// Parse, validate and store a YAML job profile.
    pub fn create_job_from_yaml(&self, yaml: &str) -> Result<String, RuntimeError> {
        let profile = JobProfile::from_yaml(yaml).map_err(hirethics_core::EngineError::from)?;
        self.create_job(profile)
    }

    /// Register candidates under an existing job. Returns their ids in
    /// input order.
    pub fn add_candidates(
        &self,
        job_id: &str,
        inputs: Vec<CandidateInput>,
    ) -> Result<Vec<String>, RuntimeError> {
        self.stores.jobs.require(job_id)?;

        inputs
            .into_iter()
            .map(|input| {
                let candidate_id =
                    new_id::<CandidateRecord, _>("cand", self.stores.candidates.as_ref());
                self.stores.candidates.insert(CandidateRecord {
                    candidate_id: candidate_id.clone(),
                    job_id: job_id.to_string(),
                    display_name: input.display_name,
                    text: input.text,
                })?;
                Ok(candidate_id)
            })
            .collect()
    }

    /// Audit one text without storing anything.
    pub async fn audit_text(
        &self,
        profile: &JobProfile,
        candidate_id: &str,
        text: &str,
    ) -> Result<CandidateAudit, RuntimeError> {
        let blinding = self.blinder.blind(text);

        let (baseline, blinded) = tokio::join!(
            self.scorer.score(profile, text),
            self.scorer.score(profile, &blinding.blinded_text),
        );
        let baseline = baseline?;
        let blinded = blinded?;

        let flags = self
            .flags
            .generate(&baseline, &blinded, &blinding, &profile.rubric, text);

        tracing::debug!(
            candidate_id,
            total_before = baseline.total,
            total_after = blinded.total,
            flags = flags.len(),
            "Candidate audited"
        );

        Ok(CandidateAudit {
            candidate_id: candidate_id.to_string(),
            display_name: None,
            baseline,
            blinded,
            blinding,
            flags,
        })
    }

    /// Audit `candidate_ids` against a job and store the batch.
    ///
    /// Candidates run concurrently up to `max_concurrency`. `cancel` is
    /// checked before each candidate starts; a cancelled run stores nothing
    /// and returns [`RuntimeError::Cancelled`].
    pub async fn run_batch(
        &self,
        job_id: &str,
        candidate_ids: &[String],
        cancel: &CancellationFlag,
    ) -> Result<BatchRun, RuntimeError> {
        let job = self.stores.jobs.require(job_id)?;

        let mut seen = HashSet::with_capacity(candidate_ids.len());
        let mut candidates = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            if !seen.insert(id.as_str()) {
                return Err(RuntimeError::DuplicateCandidate(id.clone()));
            }
            let candidate = self.stores.candidates.require(id)?;
            if candidate.job_id != job_id {
                return Err(RuntimeError::CandidateNotInJob {
                    candidate_id: id.clone(),
                    job_id: job_id.to_string(),
                });
            }
            candidates.push(candidate);
        }

        let total = candidates.len();
        tracing::info!(
            job_id,
            candidates = total,
            primary = self.scorer.has_primary(),
            "Batch started"
        );

        let profile = &job.profile;
        let outcomes: Vec<Option<Result<CandidateAudit, RuntimeError>>> =
            stream::iter(candidates.iter())
                .map(|candidate| async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let audit = self
                        .audit_text(profile, &candidate.candidate_id, &candidate.text)
                        .await
                        .map(|audit| CandidateAudit {
                            display_name: candidate.display_name.clone(),
                            ..audit
                        });
                    Some(audit)
                })
                .buffered(self.config.max_concurrency)
                .collect()
                .await;

        let mut audits = Vec::with_capacity(total);
        let mut skipped = false;
        for outcome in outcomes {
            match outcome {
                Some(audit) => audits.push(audit?),
                None => skipped = true,
            }
        }

        if skipped || cancel.is_cancelled() {
            tracing::info!(
                job_id,
                completed = audits.len(),
                total,
                "Batch cancelled, nothing stored"
            );
            return Err(RuntimeError::Cancelled {
                completed: audits.len(),
                total,
            });
        }

        let (primary_scored, fallback_scored) = count_sources(&audits);

        let record = self.stores.batches.insert(BatchRecord {
            batch_id: new_id::<BatchRecord, _>("batch", self.stores.batches.as_ref()),
            job_id: job_id.to_string(),
            created_at: Utc::now(),
            candidates: audits,
        })?;

        tracing::info!(
            batch_id = %record.batch_id,
            candidates = total,
            primary_scored,
            fallback_scored,
            "Batch stored"
        );

        Ok(BatchRun {
            record,
            primary_scored,
            fallback_scored,
        })
    }

    /// Batch report for a stored batch; `k` defaults to `default_top_k`.
    ///
    /// Reports are computed once per `(batch_id, k)` and then reused.
    pub async fn get_report(
        &self,
        batch_id: &str,
        k: Option<usize>,
    ) -> Result<Arc<BatchReport>, RuntimeError> {
        let k = k.unwrap_or(self.config.audit.default_top_k);
        let batches = &self.stores.batches;

        let report = self
            .reports
            .get_or_compute(batch_id, k, async {
                let record = batches.require(batch_id)?;
                let summaries: Vec<CandidateSummary> =
                    record.candidates.iter().map(CandidateSummary::from).collect();
                tracing::debug!(batch_id, k, "Computing batch report");
                Ok::<_, StoreError>(BatchEvaluator::new().evaluate(&summaries, k))
            })
            .await?;

        Ok(report)
    }
}

impl std::fmt::Debug for AuditEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditEngine")
            .field("scorer", &self.scorer)
            .field("stores", &self.stores)
            .field("max_concurrency", &self.config.max_concurrency)
            .finish()
    }
}

fn count_sources(audits: &[CandidateAudit]) -> (usize, usize) {
    audits
        .iter()
        .flat_map(|a| [a.baseline.source, a.blinded.source])
        .fold((0, 0), |(primary, fallback), source| match source {
            ScoreSource::Primary => (primary + 1, fallback),
            ScoreSource::Fallback => (primary, fallback + 1),
        })
}

/// Builder for [`AuditEngine`].
///
/// The primary scorer is chosen in this order: an explicit scorer, an
/// explicit provider, then the `provider` block of the configuration.
/// Without any of them the engine scores with the heuristic only.
#[derive(Default)]
pub struct AuditEngineBuilder {
    config: RuntimeConfig,
    stores: Option<Stores>,
    primary: Option<Arc<dyn CriterionScorer>>,
    provider: Option<Arc<dyn LlmProvider>>,
    registry: Option<ProviderRegistry>,
}

impl AuditEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn primary_scorer(mut self, scorer: Arc<dyn CriterionScorer>) -> Self {
        self.primary = Some(scorer);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Registry used to resolve the configured provider.
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<AuditEngine, RuntimeError> {
        self.config.validate()?;

        let blinder = ProxyBlinder::from_config(&self.config.audit)?;
        let flags = FlagGenerator::from_config(&self.config.audit);
        let reports = ReportCache::from_config(&self.config.report_cache);

        let provider = match (self.provider, &self.config.provider) {
            (Some(provider), _) => Some(provider),
            (None, Some(settings)) => {
                let registry = self.registry.unwrap_or_else(ProviderRegistry::with_defaults);
                Some(registry.create(&settings.provider_type, &settings.settings)?)
            }
            (None, None) => None,
        };

        let primary = self.primary.or_else(|| {
            provider.map(|provider| {
                let completion = self
                    .config
                    .completion
                    .completion_config(self.config.primary_timeout);
                Arc::new(
                    LlmRubricScorer::new(provider, completion)
                        .with_retry(self.config.completion.retry.clone()),
                ) as Arc<dyn CriterionScorer>
            })
        });

        let mut scorer = RubricScorer::new(self.config.primary_timeout)
            .with_circuit_breaker(self.config.circuit_breaker.clone());
        if let Some(primary) = primary {
            tracing::info!(scorer = primary.name(), "Primary scorer enabled");
            scorer = scorer.with_primary(primary);
        }

        Ok(AuditEngine {
            config: self.config,
            stores: self.stores.unwrap_or_default(),
            scorer,
            blinder,
            flags,
            reports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::ScorerError;
    use async_trait::async_trait;
    use hirethics_core::{CriterionScore, FlagType};
    use serde_json::json;

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

    const CV_MIT: &str =
        "Alex Kim\nalex@example.com\nDesigned distributed, scalable systems at MIT.\nOn-call for payments.";
    const CV_PLAIN: &str = "Sam Lee\nWrote Python and Go services.\nCode review and unit tests.";
    const CV_EMPTY: &str = "";

    /// Scores the baseline text higher than any blinded text.
    struct ProxyBiasedScorer;

    #[async_trait]
    impl CriterionScorer for ProxyBiasedScorer {
        async fn score(
            &self,
            profile: &JobProfile,
            text: &str,
        ) -> Result<Vec<CriterionScore>, ScorerError> {
            let score = if text.contains("[INSTITUTION]") { 2.0 } else { 4.0 };
            Ok(profile
                .rubric
                .keys()
                .map(|key| CriterionScore {
                    criterion_key: key.to_string(),
                    score,
                    evidence_span: String::new(),
                    rationale: "Studied at MIT".to_string(),
                })
                .collect())
        }

        fn name(&self) -> &str {
            "biased"
        }
    }

    /// Cancels the run from inside the first scoring call.
    struct CancellingScorer(CancellationFlag);

    #[async_trait]
    impl CriterionScorer for CancellingScorer {
        async fn score(
            &self,
            _profile: &JobProfile,
            _text: &str,
        ) -> Result<Vec<CriterionScore>, ScorerError> {
            self.0.cancel();
            Err(ScorerError::Malformed("cancelling".into()))
        }

        fn name(&self) -> &str {
            "cancelling"
        }
    }

    fn engine() -> AuditEngine {
        AuditEngine::builder().build().unwrap()
    }

    fn setup(engine: &AuditEngine, cvs: &[&str]) -> (String, Vec<String>) {
        let job_id = engine.create_job_from_yaml(JOB).unwrap();
        let ids = engine
            .add_candidates(
                &job_id,
                cvs.iter().map(|cv| CandidateInput::new(*cv)).collect(),
            )
            .unwrap();
        (job_id, ids)
    }

    #[tokio::test]
    async fn test_batch_end_to_end() {
        let engine = engine();
        assert!(!engine.scorer().has_primary());
        let (job_id, ids) = setup(&engine, &[CV_MIT, CV_PLAIN, CV_EMPTY]);

        let run = engine
            .run_batch(&job_id, &ids, &CancellationFlag::new())
            .await
            .unwrap();

        let record = &run.record;
        assert_eq!(record.job_id, job_id);
        assert_eq!(record.candidates.len(), 3);
        assert_eq!(run.primary_scored, 0);
        assert_eq!(run.fallback_scored, 6);

        // Submission order is kept
        let stored: Vec<&str> = record.candidates.iter().map(|c| c.candidate_id.as_str()).collect();
        assert_eq!(stored, ids.iter().map(String::as_str).collect::<Vec<_>>());

        for audit in &record.candidates {
            assert_eq!(
                audit.flags.iter().filter(|f| f.flag_type == FlagType::Debug).count(),
                1
            );
        }

        let mit = &record.candidates[0];
        assert!(mit.has_flag(FlagType::ProxyEvidence));
        assert!(!mit.blinding.blinded_text.contains("MIT"));
        assert!(!mit.blinding.blinded_text.contains("alex@example.com"));

        let empty = &record.candidates[2];
        assert_eq!(empty.baseline.total, 0.0);
        assert!(empty.baseline.by_criterion.iter().all(|c| c.evidence_span.is_empty()));

        let report = engine.get_report(run.batch_id(), None).await.unwrap();
        assert_eq!(report.n, 3);
        assert_eq!(report.k_effective, 3);
        assert_eq!(report.per_candidate.len(), 3);
    }

    #[tokio::test]
    async fn test_primary_scorer_drives_delta() {
        let engine = AuditEngine::builder()
            .primary_scorer(Arc::new(ProxyBiasedScorer))
            .build()
            .unwrap();
        assert!(engine.scorer().has_primary());
        let (job_id, ids) = setup(&engine, &[CV_MIT]);

        let run = engine
            .run_batch(&job_id, &ids, &CancellationFlag::new())
            .await
            .unwrap();
        let audit = &run.record.candidates[0];

        assert_eq!(audit.baseline.source, ScoreSource::Primary);
        assert!((audit.delta() - 2.0).abs() < 1e-9);
        assert!(audit.has_flag(FlagType::BlindingDelta));
        assert!(audit.has_flag(FlagType::ProxyEvidence));
        // Empty spans never match
        assert!(audit.has_flag(FlagType::NoEvidence));

        let proxy = audit
            .flags
            .iter()
            .find(|f| f.flag_type == FlagType::ProxyEvidence)
            .unwrap();
        assert_eq!(proxy.details["tokens_strict"], json!(["MIT"]));
    }

    #[tokio::test]
    async fn test_report_is_cached_and_idempotent() {
        let engine = engine();
        let (job_id, ids) = setup(&engine, &[CV_MIT, CV_PLAIN]);
        let run = engine
            .run_batch(&job_id, &ids, &CancellationFlag::new())
            .await
            .unwrap();

        let a = engine.get_report(run.batch_id(), Some(1)).await.unwrap();
        let b = engine.get_report(run.batch_id(), Some(1)).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = engine.get_report(run.batch_id(), Some(2)).await.unwrap();
        assert_eq!(c.k, 2);
        assert_eq!(a.n, c.n);
    }

    #[tokio::test]
    async fn test_unknown_ids_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.add_candidates("job_missing", vec![CandidateInput::new("cv")]),
            Err(RuntimeError::Store(_))
        ));
        assert!(matches!(
            engine.get_report("batch_missing", None).await,
            Err(RuntimeError::Store(_))
        ));

        let (job_id, _) = setup(&engine, &[]);
        let result = engine
            .run_batch(&job_id, &["cand_missing".to_string()], &CancellationFlag::new())
            .await;
        assert!(matches!(result, Err(RuntimeError::Store(_))));
    }

    #[tokio::test]
    async fn test_candidate_from_other_job_rejected() {
        let engine = engine();
        let (job_a, _) = setup(&engine, &[]);
        let (_, ids_b) = setup(&engine, &[CV_PLAIN]);

        let result = engine.run_batch(&job_a, &ids_b, &CancellationFlag::new()).await;
        assert!(matches!(result, Err(RuntimeError::CandidateNotInJob { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_candidate_rejected() {
        let engine = engine();
        let (job_id, ids) = setup(&engine, &[CV_PLAIN]);
        let twice = vec![ids[0].clone(), ids[0].clone()];

        let result = engine.run_batch(&job_id, &twice, &CancellationFlag::new()).await;
        assert!(matches!(result, Err(RuntimeError::DuplicateCandidate(_))));
    }

    #[tokio::test]
    async fn test_invalid_rubric_rejected_at_job_creation() {
        let engine = engine();
        let yaml = r#"
title: "Bad"
rubric:
  - key: a
    weight: 0.7
  - key: b
    weight: 0.7
"#;
        assert!(matches!(
            engine.create_job_from_yaml(yaml),
            Err(RuntimeError::Engine(_))
        ));
        assert!(engine.stores().jobs.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_start_stores_nothing() {
        let engine = engine();
        let (job_id, ids) = setup(&engine, &[CV_MIT, CV_PLAIN]);
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = engine.run_batch(&job_id, &ids, &cancel).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Cancelled {
                completed: 0,
                total: 2
            })
        ));
        assert!(engine.stores().batches.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_run_stores_nothing() {
        let cancel = CancellationFlag::new();
        let config = RuntimeConfig {
            max_concurrency: 1,
            ..RuntimeConfig::default()
        };
        let engine = AuditEngine::builder()
            .config(config)
            .primary_scorer(Arc::new(CancellingScorer(cancel.clone())))
            .build()
            .unwrap();
        let (job_id, ids) = setup(&engine, &[CV_MIT, CV_PLAIN, CV_EMPTY]);

        let result = engine.run_batch(&job_id, &ids, &cancel).await;

        // The first candidate was already running and completes on the fallback
        assert!(matches!(
            result,
            Err(RuntimeError::Cancelled {
                completed: 1,
                total: 3
            })
        ));
        assert!(engine.stores().batches.is_empty());
    }

    #[tokio::test]
    async fn test_display_name_carried_into_audit() {
        let engine = engine();
        let job_id = engine.create_job_from_yaml(JOB).unwrap();
        let ids = engine
            .add_candidates(
                &job_id,
                vec![CandidateInput::new(CV_PLAIN).with_display_name("Sam")],
            )
            .unwrap();

        let run = engine
            .run_batch(&job_id, &ids, &CancellationFlag::new())
            .await
            .unwrap();
        assert_eq!(run.record.candidates[0].display_name.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_unknown_configured_provider_fails_build() {
        let config = RuntimeConfig::from_yaml("provider:\n  type: carrier-pigeon\n").unwrap();
        let result = AuditEngine::builder()
            .config(config)
            .registry(ProviderRegistry::new())
            .build();
        assert!(matches!(result, Err(RuntimeError::Provider(_))));
    }
}
