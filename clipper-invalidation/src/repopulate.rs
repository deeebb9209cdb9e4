//! Cache repopulation hook.
//!
//! After a batch is deleted the executor may hand the keys to a repopulator
//! that pre-warms them. This runs detached from the invalidation: its outcome
//! never affects the invalidation result.

use async_trait::async_trait;

/// Pre-warms cache keys after they were invalidated.
#[async_trait]
pub trait CacheRepopulator: Send + Sync {
    /// Rebuild the values behind `keys`. Errors are the implementation's to log.
    async fn repopulate(&self, keys: Vec<String>);
}

/// Repopulator that does nothing; keys are rebuilt lazily on the next read.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRepopulator;

#[async_trait]
impl CacheRepopulator for NoopRepopulator {
    async fn repopulate(&self, keys: Vec<String>) {
        tracing::trace!(keys = keys.len(), "Skipping repopulation");
    }
}
