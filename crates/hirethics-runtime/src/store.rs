//! Key-value repositories for jobs, candidates and batches.
//!
//! Records are write-once: a stored batch never changes, so any report
//! derived from it can be cached for as long as the batch exists.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use hirethics_core::{CandidateAudit, JobProfile};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
}

/// A record that can live in a [`Repository`].
pub trait Record: Send + Sync + 'static {
    /// Kind name used in errors, e.g. "job".
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Write-once key-value store.
pub trait Repository<V: Record>: Send + Sync {
    fn get(&self, id: &str) -> Option<Arc<V>>;

    /// Store `value` under its id. Fails if the id is taken.
    fn insert(&self, value: V) -> Result<Arc<V>, StoreError>;

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Like [`Repository::get`], but a missing id is an error.
    fn require(&self, id: &str) -> Result<Arc<V>, StoreError> {
        self.get(id).ok_or_else(|| StoreError::NotFound {
            kind: V::KIND,
            id: id.to_string(),
        })
    }
}

/// Repository backed by a locked `HashMap`.
pub struct InMemoryRepository<V> {
    entries: RwLock<HashMap<String, Arc<V>>>,
}

impl<V> Default for InMemoryRepository<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> InMemoryRepository<V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: Record> Repository<V> for InMemoryRepository<V> {
    fn get(&self, id: &str) -> Option<Arc<V>> {
        self.entries.read().get(id).cloned()
    }

    fn insert(&self, value: V) -> Result<Arc<V>, StoreError> {
        let mut entries = self.entries.write();
        if entries.contains_key(value.id()) {
            return Err(StoreError::AlreadyExists {
                kind: V::KIND,
                id: value.id().to_string(),
            });
        }
        let value = Arc::new(value);
        entries.insert(value.id().to_string(), Arc::clone(&value));
        Ok(value)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub profile: JobProfile,
    pub created_at: DateTime<Utc>,
}

impl Record for JobRecord {
    const KIND: &'static str = "job";

    fn id(&self) -> &str {
        &self.job_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub candidate_id: String,
    pub job_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Extracted CV text
    pub text: String,
}

impl Record for CandidateRecord {
    const KIND: &'static str = "candidate";

    fn id(&self) -> &str {
        &self.candidate_id
    }
}

/// One completed scoring run over a set of candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: String,
    pub job_id: String,
    pub created_at: DateTime<Utc>,

    /// In the order the candidates were submitted
    pub candidates: Vec<CandidateAudit>,
}

impl Record for BatchRecord {
    const KIND: &'static str = "batch";

    fn id(&self) -> &str {
        &self.batch_id
    }
}

/// The repositories an engine works against.
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn Repository<JobRecord>>,
    pub candidates: Arc<dyn Repository<CandidateRecord>>,
    pub batches: Arc<dyn Repository<BatchRecord>>,
}

impl Stores {
    /// Fresh, empty in-memory repositories.
    pub fn in_memory() -> Self {
        Self {
            jobs: Arc::new(InMemoryRepository::<JobRecord>::new()),
            candidates: Arc::new(InMemoryRepository::<CandidateRecord>::new()),
            batches: Arc::new(InMemoryRepository::<BatchRecord>::new()),
        }
    }
}

impl Default for Stores {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("jobs", &self.jobs.len())
            .field("candidates", &self.candidates.len())
            .field("batches", &self.batches.len())
            .finish()
    }
}

/// Generate an id like `job_1a2b3c4d` that is not yet used in `repo`.
pub fn new_id<V: Record, R: Repository<V> + ?Sized>(prefix: &str, repo: &R) -> String {
    loop {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("{}_{}", prefix, &uuid[..8]);
        if !repo.contains(&id) {
            return id;
        }
    }
}
