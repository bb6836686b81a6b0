//! # hirethics-runtime
//!
//! Async audit runtime for hirethics.
//!
//! This crate wraps the deterministic engine in `hirethics-core` with the
//! parts that need I/O or concurrency:
//! - a pluggable primary scorer (an LLM by default) with timeout, retries
//!   and a circuit breaker, always backed by the keyword heuristic
//! - job, candidate and batch repositories
//! - batch runs with bounded concurrency and cancellation
//! - a compute-once cache for batch reports
//!
//! ## Important
//!
//! The primary scorer is OPTIONAL. Without one, every score comes from the
//! heuristic and the whole pipeline is deterministic.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hirethics_runtime::{AuditEngine, CancellationFlag, CandidateInput, RuntimeConfig};
//!
//! let engine = AuditEngine::builder()
//!     .config(RuntimeConfig::from_file("hirethics.yaml")?)
//!     .build()?;
//!
//! let job_id = engine.create_job_from_yaml(&job_yaml)?;
//! let ids = engine.add_candidates(&job_id, vec![CandidateInput::new(cv_text)])?;
//! let run = engine.run_batch(&job_id, &ids, &CancellationFlag::new()).await?;
//!
//! let report = engine.get_report(run.batch_id(), Some(5)).await?;
//! println!("spearman: {:?}", report.spearman_rho);
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod scorer;
pub mod store;

pub use cache::ReportCache;
pub use config::{
    CompletionSettings, ConfigError, ProviderSettings, ReportCacheConfig, RuntimeConfig,
};
pub use engine::{AuditEngine, AuditEngineBuilder, BatchRun, CandidateInput};
pub use providers::{LlmProvider, ProviderError, ProviderRegistry};
pub use resilience::{CancellationFlag, CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
pub use scorer::{
    CriterionScorer, HeuristicCriterionScorer, LlmRubricScorer, RubricScorer, ScorerError,
};
pub use store::{
    BatchRecord, CandidateRecord, InMemoryRepository, JobRecord, Repository, StoreError, Stores,
};

use hirethics_core::EngineError;
use thiserror::Error;

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Scoring failed: {0}")]
    Scorer(#[from] ScorerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Candidate '{candidate_id}' does not belong to job '{job_id}'")]
    CandidateNotInJob {
        candidate_id: String,
        job_id: String,
    },

    #[error("Candidate '{0}' listed more than once")]
    DuplicateCandidate(String),

    #[error("Batch cancelled after {completed} of {total} candidates")]
    Cancelled { completed: usize, total: usize },
}
