//! Caching layer for batch reports.
//!
//! A report is a pure function of a stored batch and `k`, and stored
//! batches never change, so a cached report never goes stale. Concurrent
//! requests for the same `(batch_id, k)` share one computation.

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hirethics_core::BatchReport;

use crate::config::ReportCacheConfig;
use crate::store::StoreError;

/// Compute-once cache of batch reports keyed by `(batch_id, k)`.
#[derive(Clone)]
pub struct ReportCache {
    cache: Cache<(String, usize), Arc<BatchReport>>,
}

impl ReportCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &ReportCacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    /// Return the cached report or run `compute` to produce it.
    ///
    /// Only one `compute` runs per key at a time; concurrent callers wait
    /// for it and share the result. Errors are returned to every waiter and
    /// are not cached.
    pub async fn get_or_compute<F>(
        &self,
        batch_id: &str,
        k: usize,
        compute: F,
    ) -> Result<Arc<BatchReport>, StoreError>
    where
        F: Future<Output = Result<BatchReport, StoreError>>,
    {
        self.cache
            .try_get_with((batch_id.to_string(), k), async {
                compute.await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    pub async fn get(&self, batch_id: &str, k: usize) -> Option<Arc<BatchReport>> {
        self.cache.get(&(batch_id.to_string(), k)).await
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ReportCache {
    fn default() -> Self {
        Self::from_config(&ReportCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hirethics_core::{BatchEvaluator, CandidateSummary};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report() -> BatchReport {
        let batch = vec![
            CandidateSummary {
                candidate_id: "a".into(),
                total_before: 3.0,
                total_after: 2.5,
                flags: vec![],
            },
            CandidateSummary {
                candidate_id: "b".into(),
                total_before: 2.0,
                total_after: 2.0,
                flags: vec![],
            },
        ];
        BatchEvaluator::new().evaluate(&batch, 5)
    }

    #[tokio::test]
    async fn test_computes_once() {
        let cache = ReportCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cache
                .get_or_compute("batch_1", 5, async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StoreError>(report())
                })
                .await
                .unwrap();
            assert_eq!(result.n, 2);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.get("batch_1", 5).await.is_some());
        assert!(cache.get("batch_1", 3).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let cache = ReportCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_compute("batch_1", 5, async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, StoreError>(report())
                        })
                        .await
                })
            })
            .collect();

        let reports: Vec<Arc<BatchReport>> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(reports.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = ReportCache::default();
        let missing = StoreError::NotFound {
            kind: "batch",
            id: "batch_x".into(),
        };

        let err = cache
            .get_or_compute("batch_x", 5, async { Err::<BatchReport, _>(missing.clone()) })
            .await
            .unwrap_err();
        assert_eq!(err, missing);
        assert!(cache.get("batch_x", 5).await.is_none());
    }
}
