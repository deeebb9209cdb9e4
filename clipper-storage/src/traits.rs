//! Cache store trait.
//!
//! The invalidation engine only needs a small slice of a key-value store:
//! batched deletes, an existence check and a liveness ping. Reads and writes
//! are included so repopulators and tests can seed entries.

use async_trait::async_trait;
use clipper_core::ClipperResult;
use std::time::Duration;

/// Key-value cache store used by the invalidation executor.
///
/// Implementations must be thread-safe; the executor calls them from many
/// tasks concurrently.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Delete all `keys` in a single round trip.
    ///
    /// Returns how many keys actually existed. Absent keys are not an error.
    async fn delete(&self, keys: &[String]) -> ClipperResult<u64>;

    /// Check whether `key` is currently cached.
    async fn exists(&self, key: &str) -> ClipperResult<bool>;

    /// Cheap liveness check. Never errors; unreachable stores report `false`.
    async fn ping(&self) -> bool;

    /// Read a cached value.
    async fn get(&self, key: &str) -> ClipperResult<Option<String>>;

    /// Write a value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> ClipperResult<()>;

    /// Short backend name for logs and metrics labels.
    fn backend_name(&self) -> &'static str;
}
