//! Clipper Test Utilities
//!
//! Shared test infrastructure for the Clipper workspace:
//! - Cache stores that record or fail every operation
//! - Proptest generators for events and cache keys
//! - Fixtures for common rule tables and seeded stores

// Re-export the in-memory store from its source crate
pub use clipper_storage::InMemoryCacheStore;

// Re-export core types for convenience
pub use clipper_core::{
    CacheKeySet, ClipperResult, InvalidationConfig, InvalidationEvent, InvalidationRule, Priority,
    RuleTable, StoreError,
};

use async_trait::async_trait;
use clipper_storage::CacheStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ============================================================================
// RECORDING AND FAILING STORES
// ============================================================================

/// One batched delete observed by [`RecordingCacheStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRecord {
    pub keys: Vec<String>,
    pub deleted: u64,
    /// Tokio clock reading, so paused-clock tests can assert exact timings.
    pub at: Instant,
}

/// In-memory store that records every batched delete.
#[derive(Debug, Default)]
pub struct RecordingCacheStore {
    inner: InMemoryCacheStore,
    deletes: Mutex<Vec<DeleteRecord>>,
    notify: Option<mpsc::UnboundedSender<DeleteRecord>>,
}

impl RecordingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `keys`.
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            inner: InMemoryCacheStore::with_keys(keys),
            ..Self::default()
        }
    }

    /// Also push each delete onto a channel, for tests that await executions.
    pub fn with_notify(mut self) -> (Self, mpsc::UnboundedReceiver<DeleteRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notify = Some(tx);
        (self, rx)
    }

    pub fn inner(&self) -> &InMemoryCacheStore {
        &self.inner
    }

    /// Every delete so far, in call order.
    pub fn deletes(&self) -> Vec<DeleteRecord> {
        self.deletes
            .lock()
            .map(|deletes| deletes.clone())
            .unwrap_or_default()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.lock().map(|deletes| deletes.len()).unwrap_or(0)
    }

    /// Deletes whose batch contained `key`.
    pub fn deletes_containing(&self, key: &str) -> Vec<DeleteRecord> {
        self.deletes()
            .into_iter()
            .filter(|record| record.keys.iter().any(|k| k == key))
            .collect()
    }
}

#[async_trait]
impl CacheStore for RecordingCacheStore {
    async fn delete(&self, keys: &[String]) -> ClipperResult<u64> {
        let deleted = self.inner.delete(keys).await?;
        let record = DeleteRecord {
            keys: keys.to_vec(),
            deleted,
            at: Instant::now(),
        };
        self.deletes
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .push(record.clone());
        if let Some(notify) = &self.notify {
            let _ = notify.send(record);
        }
        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> ClipperResult<bool> {
        self.inner.exists(key).await
    }

    async fn ping(&self) -> bool {
        self.inner.ping().await
    }

    async fn get(&self, key: &str) -> ClipperResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> ClipperResult<()> {
        self.inner.set(key, value, ttl).await
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

/// Store that is permanently unreachable.
#[derive(Debug, Default)]
pub struct FailingCacheStore {
    attempts: AtomicU64,
}

impl FailingCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete calls received so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn unavailable() -> StoreError {
        StoreError::Unavailable {
            reason: "connection refused".to_string(),
        }
    }
}

#[async_trait]
impl CacheStore for FailingCacheStore {
    async fn delete(&self, _keys: &[String]) -> ClipperResult<u64> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Self::unavailable().into())
    }

    async fn exists(&self, _key: &str) -> ClipperResult<bool> {
        Err(Self::unavailable().into())
    }

    async fn ping(&self) -> bool {
        false
    }

    async fn get(&self, _key: &str) -> ClipperResult<Option<String>> {
        Err(Self::unavailable().into())
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> ClipperResult<()> {
        Err(Self::unavailable().into())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for invalidation inputs.

    use super::*;
    use proptest::prelude::*;

    /// Any registered event.
    pub fn arb_event() -> impl Strategy<Value = InvalidationEvent> {
        proptest::sample::select(InvalidationEvent::ALL.to_vec())
    }

    /// Events that go through the debounce path under the default rules.
    pub fn arb_debounced_event() -> impl Strategy<Value = InvalidationEvent> {
        proptest::sample::select(super::fixtures::debounced_events())
    }

    /// Cache key in the `namespace:name` shape the registry uses.
    pub fn arb_cache_key() -> impl Strategy<Value = String> {
        "[a-z]{1,8}:[a-z0-9_]{1,8}"
    }

    pub fn arb_extra_keys() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_cache_key(), 0..4)
    }

    /// Gaps between consecutive requests, each strictly inside `window_ms`.
    pub fn arb_gaps_within(window_ms: u64, max_len: usize) -> impl Strategy<Value = Vec<u64>> {
        prop::collection::vec(0..window_ms, 0..max_len)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built rule tables and stores.

    use super::*;

    /// Every key any default rule can invalidate.
    pub fn all_rule_keys() -> CacheKeySet {
        RuleTable::defaults()
            .iter()
            .flat_map(|rule| rule.cache_keys.iter().cloned())
            .collect()
    }

    /// Recording store holding every default rule key.
    pub fn seeded_store() -> RecordingCacheStore {
        RecordingCacheStore::with_keys(all_rule_keys())
    }

    /// Non-critical events under the default rules, in event order.
    pub fn debounced_events() -> Vec<InvalidationEvent> {
        let rules = RuleTable::defaults();
        InvalidationEvent::ALL
            .into_iter()
            .filter(|event| {
                rules
                    .lookup(*event)
                    .is_some_and(|rule| !rule.priority.bypasses_debounce())
            })
            .collect()
    }

    /// Critical events under the default rules, in event order.
    pub fn critical_events() -> Vec<InvalidationEvent> {
        let rules = RuleTable::defaults();
        InvalidationEvent::ALL
            .into_iter()
            .filter(|event| {
                rules
                    .lookup(*event)
                    .is_some_and(|rule| rule.priority.bypasses_debounce())
            })
            .collect()
    }

    /// Default rules with every debounced event on a fixed window.
    pub fn uniform_rules(debounce_ms: u64, max_delay_ms: u64) -> RuleTable {
        let defaults = RuleTable::defaults();
        let rules = defaults.iter().cloned().map(|mut rule| {
            if !rule.priority.bypasses_debounce() {
                rule.priority = Priority::Normal;
                rule.debounce_window = Duration::from_millis(debounce_ms);
                rule.max_delay = Duration::from_millis(max_delay_ms);
            }
            rule
        });
        match RuleTable::new(rules) {
            Ok(table) => table,
            Err(e) => panic!("invalid uniform rules: {}", e),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_event_partition() {
        let debounced = fixtures::debounced_events();
        let critical = fixtures::critical_events();
        assert_eq!(debounced.len() + critical.len(), InvalidationEvent::ALL.len());
        assert_eq!(
            critical,
            vec![
                InvalidationEvent::QueueCleared,
                InvalidationEvent::QueuePaused,
                InvalidationEvent::SystemMaintenance,
            ]
        );
    }

    #[test]
    fn test_uniform_rules() {
        let rules = fixtures::uniform_rules(100, 400);
        let rule = rules.lookup(InvalidationEvent::JobFailed).unwrap();
        assert_eq!(rule.debounce_window, Duration::from_millis(100));
        assert_eq!(rule.priority, Priority::Normal);
        let critical = rules.lookup(InvalidationEvent::QueuePaused).unwrap();
        assert_eq!(critical.priority, Priority::Critical);
    }

    #[test]
    fn test_all_rule_keys_covers_registry() {
        let keys = fixtures::all_rule_keys();
        assert!(keys.contains("dashboard:stats"));
        assert!(keys.contains("agents:status"));
        assert!(keys.contains("storage:usage"));
    }
}
