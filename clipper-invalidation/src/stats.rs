//! Invalidation statistics.
//!
//! Process-wide counters shared by the coordinator and executor. Counters only
//! ever grow; snapshots are taken without locking and are eventually
//! consistent with concurrent updates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for invalidation activity since startup.
#[derive(Debug)]
pub struct InvalidationStats {
    /// Accepted requests for known events
    pub invalidations_requested: AtomicU64,

    /// Batches handed to the store
    pub invalidations_executed: AtomicU64,

    /// Requests merged into an already pending burst
    pub invalidations_debounced: AtomicU64,

    /// Keys sent to the store for deletion
    pub cache_operations: AtomicU64,

    /// Store failures and scheduling failures
    pub errors: AtomicU64,

    /// Requests naming an event outside the registry
    pub unknown_events: AtomicU64,

    /// Critical requests that skipped debouncing
    pub critical_bypasses: AtomicU64,

    /// Administrative force invalidations
    pub forced_invalidations: AtomicU64,

    /// Bursts flushed early because max_delay ran out
    pub max_delay_flushes: AtomicU64,

    started: Instant,
    started_at: DateTime<Utc>,
}

impl Default for InvalidationStats {
    fn default() -> Self {
        Self {
            invalidations_requested: AtomicU64::new(0),
            invalidations_executed: AtomicU64::new(0),
            invalidations_debounced: AtomicU64::new(0),
            cache_operations: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            unknown_events: AtomicU64::new(0),
            critical_bypasses: AtomicU64::new(0),
            forced_invalidations: AtomicU64::new(0),
            max_delay_flushes: AtomicU64::new(0),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

impl InvalidationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_requested(&self) {
        self.invalidations_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_debounced(&self) {
        self.invalidations_debounced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_execution(&self, keys_attempted: u64) {
        self.invalidations_executed.fetch_add(1, Ordering::Relaxed);
        self.cache_operations
            .fetch_add(keys_attempted, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unknown_event(&self) {
        self.unknown_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_critical_bypass(&self) {
        self.critical_bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forced(&self) {
        self.forced_invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_max_delay_flush(&self) {
        self.max_delay_flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the counters together with the coordinator-owned gauges.
    pub fn snapshot(&self, pending_count: usize, store_available: bool) -> InvalidationStatsSnapshot {
        let requested = self.invalidations_requested.load(Ordering::Relaxed);
        let debounced = self.invalidations_debounced.load(Ordering::Relaxed);

        InvalidationStatsSnapshot {
            requested,
            executed: self.invalidations_executed.load(Ordering::Relaxed),
            debounced,
            cache_operations: self.cache_operations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            unknown_events: self.unknown_events.load(Ordering::Relaxed),
            critical_bypasses: self.critical_bypasses.load(Ordering::Relaxed),
            forced_invalidations: self.forced_invalidations.load(Ordering::Relaxed),
            max_delay_flushes: self.max_delay_flushes.load(Ordering::Relaxed),
            debounce_efficiency_percent: debounce_efficiency_percent(debounced, requested),
            pending_count,
            store_available,
            uptime_seconds: self.started.elapsed().as_secs(),
            started_at: self.started_at,
        }
    }
}

fn debounce_efficiency_percent(debounced: u64, requested: u64) -> f64 {
    if requested == 0 {
        0.0
    } else {
        debounced as f64 / requested as f64 * 100.0
    }
}

/// Read-only view of [`InvalidationStats`] for dashboards and health checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidationStatsSnapshot {
    pub requested: u64,
    pub executed: u64,
    pub debounced: u64,
    pub cache_operations: u64,
    pub errors: u64,
    pub unknown_events: u64,
    pub critical_bypasses: u64,
    pub forced_invalidations: u64,
    pub max_delay_flushes: u64,
    pub debounce_efficiency_percent: f64,
    pub pending_count: usize,
    pub store_available: bool,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = InvalidationStats::new();
        let snapshot = stats.snapshot(0, true);
        assert_eq!(snapshot.requested, 0);
        assert_eq!(snapshot.executed, 0);
        assert_eq!(snapshot.debounce_efficiency_percent, 0.0);
        assert!(snapshot.store_available);
    }

    #[test]
    fn test_debounce_efficiency() {
        let stats = InvalidationStats::new();
        for _ in 0..4 {
            stats.record_requested();
        }
        for _ in 0..3 {
            stats.record_debounced();
        }
        let snapshot = stats.snapshot(1, false);
        assert!((snapshot.debounce_efficiency_percent - 75.0).abs() < 0.001);
        assert_eq!(snapshot.pending_count, 1);
        assert!(!snapshot.store_available);
    }

    #[test]
    fn test_record_execution_counts_keys() {
        let stats = InvalidationStats::new();
        stats.record_execution(3);
        stats.record_execution(2);
        let snapshot = stats.snapshot(0, true);
        assert_eq!(snapshot.executed, 2);
        assert_eq!(snapshot.cache_operations, 5);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = InvalidationStats::new();
        stats.record_error();
        let json = serde_json::to_value(stats.snapshot(0, true)).unwrap();
        assert_eq!(json["errors"], 1);
        assert!(json.get("debounce_efficiency_percent").is_some());
        assert!(json.get("uptime_seconds").is_some());
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = std::sync::Arc::new(InvalidationStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = std::sync::Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_requested();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot(0, true).requested, 8000);
    }
}
