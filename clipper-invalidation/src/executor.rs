//! Batch invalidation executor.
//!
//! Turns a resolved key set into one batched delete against the cache store.
//! Store failures are absorbed here: they are counted and logged, and the
//! caller gets a zero-attempt result instead of an error.

use clipper_core::CacheKeySet;
use clipper_storage::CacheStore;
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::with_metrics;
use crate::repopulate::CacheRepopulator;
use crate::stats::InvalidationStats;

/// Where a batch came from, for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOrigin {
    /// A debounced burst whose window elapsed
    Burst,
    /// A critical-priority event
    Critical,
    /// An administrative force invalidation
    Force,
    /// A pending burst flushed on shutdown
    Flush,
}

impl ExecutionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOrigin::Burst => "burst",
            ExecutionOrigin::Critical => "critical",
            ExecutionOrigin::Force => "force",
            ExecutionOrigin::Flush => "flush",
        }
    }
}

/// Outcome of one batched delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Keys that existed and were removed
    pub deleted_count: u64,
    /// Keys sent to the store; zero when the store was unreachable
    pub attempted_count: u64,
    /// The store rejected the batch
    pub store_failed: bool,
}

impl ExecutionResult {
    pub fn succeeded(&self) -> bool {
        !self.store_failed
    }

    fn failed() -> Self {
        Self {
            deleted_count: 0,
            attempted_count: 0,
            store_failed: true,
        }
    }
}

/// Deletes key sets from the cache store and records the results.
pub struct BatchExecutor {
    store: Arc<dyn CacheStore>,
    stats: Arc<InvalidationStats>,
    repopulator: Option<Arc<dyn CacheRepopulator>>,
}

impl BatchExecutor {
    pub fn new(store: Arc<dyn CacheStore>, stats: Arc<InvalidationStats>) -> Self {
        Self {
            store,
            stats,
            repopulator: None,
        }
    }

    /// Hand every successfully deleted batch to `repopulator`.
    pub fn with_repopulator(mut self, repopulator: Arc<dyn CacheRepopulator>) -> Self {
        self.repopulator = Some(repopulator);
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Delete `keys` in one batch.
    ///
    /// Never fails: a store error is counted in `errors` and reported as a
    /// zero-attempt result with `store_failed` set.
    pub async fn execute(&self, keys: &CacheKeySet, origin: ExecutionOrigin) -> ExecutionResult {
        if keys.is_empty() {
            return ExecutionResult::default();
        }

        let batch: Vec<String> = keys.iter().cloned().collect();
        let attempted = batch.len() as u64;
        let started = Instant::now();

        match self.store.delete(&batch).await {
            Ok(deleted) => {
                let elapsed = started.elapsed();
                self.stats.record_execution(attempted);
                with_metrics(|m| {
                    m.record_execution(origin.as_str(), true, deleted, elapsed.as_secs_f64())
                });
                tracing::debug!(
                    origin = origin.as_str(),
                    backend = self.store.backend_name(),
                    attempted,
                    deleted,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Cache keys invalidated"
                );

                if let Some(repopulator) = &self.repopulator {
                    let repopulator = Arc::clone(repopulator);
                    tokio::spawn(async move {
                        repopulator.repopulate(batch).await;
                    });
                }

                ExecutionResult {
                    deleted_count: deleted,
                    attempted_count: attempted,
                    store_failed: false,
                }
            }
            Err(e) => {
                self.stats.record_error();
                with_metrics(|m| {
                    m.record_execution(origin.as_str(), false, 0, started.elapsed().as_secs_f64())
                });
                tracing::error!(
                    error = %e,
                    origin = origin.as_str(),
                    backend = self.store.backend_name(),
                    keys = attempted,
                    "Cache invalidation failed; keys stay stale until the next invalidation"
                );
                ExecutionResult::failed()
            }
        }
    }
}
