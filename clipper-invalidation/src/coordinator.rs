//! Debounce coordinator.
//!
//! Accepts invalidation requests, coalesces bursts of the same event into a
//! single pending invalidation and executes it once the event's debounce
//! window has elapsed with no further requests (or once `max_delay` since the
//! first request runs out). Critical events skip this machinery entirely.
//!
//! Pending bursts live in a sharded [`DashMap`] keyed by event. All
//! check-merge-reschedule logic for one event happens under that event's entry
//! lock, so concurrent producers of different events never contend and
//! concurrent producers of the same event can never lose keys or fire twice.
//! No lock is held across store I/O.
//!
//! Each burst owns one worker task. The worker sleeps until the burst's
//! deadline, then re-checks under the entry lock: a deadline that moved out
//! means sleep again, a deadline that passed means remove the entry and
//! execute. The burst id stops a stale worker from touching a newer burst.

use clipper_core::{
    CacheKeySet, ClipperResult, InvalidationConfig, InvalidationError, InvalidationEvent,
    RuleTable,
};
use clipper_storage::CacheStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::executor::{BatchExecutor, ExecutionOrigin, ExecutionResult};
use crate::metrics::with_metrics;
use crate::repopulate::CacheRepopulator;
use crate::stats::{InvalidationStats, InvalidationStatsSnapshot};

/// How a submitted request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Critical event, already executed against the store.
    Executed(ExecutionResult),
    /// Started a new burst that fires at `deadline` unless extended.
    Scheduled { deadline: Instant },
    /// Merged into an already pending burst, which now fires at `deadline`.
    Coalesced { deadline: Instant },
}

impl Submission {
    pub fn is_executed(&self) -> bool {
        matches!(self, Submission::Executed(_))
    }
}

/// A burst of requests for one event awaiting execution.
#[derive(Debug)]
struct PendingInvalidation {
    accumulated_keys: CacheKeySet,
    first_request_time: Instant,
    deadline: Instant,
    max_deadline: Instant,
    request_count: u64,
    hit_max_delay: bool,
    burst_id: u64,
    timer: Option<JoinHandle<()>>,
}

/// State shared between the coordinator and its burst workers.
struct BurstContext {
    pending: Arc<DashMap<InvalidationEvent, PendingInvalidation>>,
    executor: Arc<BatchExecutor>,
    stats: Arc<InvalidationStats>,
}

/// Debounced, priority-aware cache invalidation coordinator.
///
/// Built once by the composition root and shared as
/// `Arc<InvalidationCoordinator>`. All methods take `&self`.
pub struct InvalidationCoordinator {
    rules: Arc<RuleTable>,
    config: InvalidationConfig,
    pending: Arc<DashMap<InvalidationEvent, PendingInvalidation>>,
    executor: Arc<BatchExecutor>,
    stats: Arc<InvalidationStats>,
    next_burst_id: AtomicU64,
    accepting: AtomicBool,
}

impl InvalidationCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, rules: RuleTable, config: InvalidationConfig) -> Self {
        let stats = Arc::new(InvalidationStats::new());
        let executor = BatchExecutor::new(store, Arc::clone(&stats));
        Self::from_parts(executor, stats, rules, config)
    }

    /// Like [`InvalidationCoordinator::new`], handing deleted keys to
    /// `repopulator` when `config.repopulate_after_invalidation` is set.
    pub fn with_repopulator(
        store: Arc<dyn CacheStore>,
        rules: RuleTable,
        config: InvalidationConfig,
        repopulator: Arc<dyn CacheRepopulator>,
    ) -> Self {
        let stats = Arc::new(InvalidationStats::new());
        let mut executor = BatchExecutor::new(store, Arc::clone(&stats));
        if config.repopulate_after_invalidation {
            executor = executor.with_repopulator(repopulator);
        } else {
            tracing::debug!("Repopulator supplied but repopulation is disabled");
        }
        Self::from_parts(executor, stats, rules, config)
    }

    fn from_parts(
        executor: BatchExecutor,
        stats: Arc<InvalidationStats>,
        rules: RuleTable,
        config: InvalidationConfig,
    ) -> Self {
        tracing::info!(
            rules = rules.len(),
            backend = executor.store().backend_name(),
            high_priority_cap_ms = config.high_priority_cap.as_millis() as u64,
            "Invalidation coordinator initialized"
        );
        Self {
            rules: Arc::new(rules),
            config,
            pending: Arc::new(DashMap::new()),
            executor: Arc::new(executor),
            stats,
            next_burst_id: AtomicU64::new(1),
            accepting: AtomicBool::new(true),
        }
    }

    /// Request invalidation for `event_name`.
    ///
    /// Returns `false` for unknown events and when the burst could not be
    /// scheduled. Non-critical requests return as soon as they are recorded;
    /// critical requests return after the store delete has completed, and
    /// return `true` even when the store failed (the failure is counted in
    /// `errors`).
    pub async fn invalidate(&self, event_name: &str, extra_keys: &[String]) -> bool {
        let event = match event_name.parse::<InvalidationEvent>() {
            Ok(event) => event,
            Err(_) => {
                self.stats.record_unknown_event();
                with_metrics(|m| m.record_request("unknown", "rejected"));
                tracing::warn!(event = event_name, "Unknown invalidation event");
                return false;
            }
        };

        match self.submit(event, extra_keys).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, event = %event, "Invalidation request rejected");
                false
            }
        }
    }

    /// Typed form of [`InvalidationCoordinator::invalidate`].
    pub async fn submit(
        &self,
        event: InvalidationEvent,
        extra_keys: &[String],
    ) -> ClipperResult<Submission> {
        let Some(rule) = self.rules.lookup(event) else {
            self.stats.record_unknown_event();
            return Err(InvalidationError::UnknownEvent {
                event_name: event.to_string(),
            }
            .into());
        };

        let keys = rule.resolve_keys(extra_keys);
        self.stats.record_requested();

        if rule.priority.bypasses_debounce() {
            self.stats.record_critical_bypass();
            with_metrics(|m| m.record_request(event.as_str(), "critical"));
            tracing::info!(event = %event, keys = keys.len(), "Critical invalidation, bypassing debounce");
            let result = self.executor.execute(&keys, ExecutionOrigin::Critical).await;
            return Ok(Submission::Executed(result));
        }

        let window = rule.effective_window(self.config.high_priority_cap);
        match self.schedule(event, keys, window, rule.max_delay) {
            Ok(submission) => {
                with_metrics(|m| m.record_request(event.as_str(), "debounced"));
                Ok(submission)
            }
            Err(e) => {
                self.stats.record_error();
                with_metrics(|m| m.record_request(event.as_str(), "rejected"));
                Err(e)
            }
        }
    }

    /// Merge into the pending burst for `event` or start a new one.
    ///
    /// Synchronous so the entry guard can never be held across an await.
    fn schedule(
        &self,
        event: InvalidationEvent,
        keys: CacheKeySet,
        window: Duration,
        max_delay: Duration,
    ) -> ClipperResult<Submission> {
        let now = Instant::now();

        let submission = match self.pending.entry(event) {
            Entry::Occupied(mut occupied) => {
                let burst = occupied.get_mut();
                burst.accumulated_keys.extend(keys);
                burst.request_count += 1;

                let proposed = now + window;
                if proposed > burst.max_deadline {
                    burst.hit_max_delay = true;
                }
                burst.deadline = burst.deadline.max(proposed.min(burst.max_deadline));
                self.stats.record_debounced();

                tracing::trace!(
                    event = %event,
                    requests = burst.request_count,
                    keys = burst.accumulated_keys.len(),
                    "Coalesced invalidation into pending burst"
                );
                Submission::Coalesced {
                    deadline: burst.deadline,
                }
            }
            Entry::Vacant(vacant) => {
                if !self.accepting.load(Ordering::SeqCst) {
                    return Err(InvalidationError::SchedulingFailed {
                        event,
                        reason: "coordinator is shut down".to_string(),
                    }
                    .into());
                }
                let handle = Handle::try_current().map_err(|e| InvalidationError::SchedulingFailed {
                    event,
                    reason: e.to_string(),
                })?;

                let burst_id = self.next_burst_id.fetch_add(1, Ordering::Relaxed);
                let max_deadline = now + max_delay.max(window);
                let deadline = (now + window).min(max_deadline);
                let context = BurstContext {
                    pending: Arc::clone(&self.pending),
                    executor: Arc::clone(&self.executor),
                    stats: Arc::clone(&self.stats),
                };
                let timer = handle.spawn(run_burst(event, burst_id, deadline, context));

                vacant.insert(PendingInvalidation {
                    accumulated_keys: keys,
                    first_request_time: now,
                    deadline,
                    max_deadline,
                    request_count: 1,
                    hit_max_delay: false,
                    burst_id,
                    timer: Some(timer),
                });
                Submission::Scheduled { deadline }
            }
        };

        if let Submission::Scheduled { deadline } = submission {
            with_metrics(|m| m.pending_bursts.inc());
            tracing::debug!(
                event = %event,
                window_ms = window.as_millis() as u64,
                fires_in_ms = deadline.saturating_duration_since(now).as_millis() as u64,
                "Scheduled invalidation burst"
            );
        }
        Ok(submission)
    }

    /// Delete `keys` immediately, with no rule lookup or debouncing.
    ///
    /// Returns `true` when the store accepted the batch, including when some
    /// or all keys were already absent.
    pub async fn force_invalidate(&self, keys: &[String]) -> bool {
        self.force_invalidate_with_result(keys).await.succeeded()
    }

    pub async fn force_invalidate_with_result(&self, keys: &[String]) -> ExecutionResult {
        self.stats.record_forced();
        let keys: CacheKeySet = keys.iter().cloned().collect();
        tracing::info!(keys = keys.len(), "Forced invalidation");
        self.executor.execute(&keys, ExecutionOrigin::Force).await
    }

    /// Execute every pending burst now, in event order.
    pub async fn flush_pending(&self) -> Vec<(InvalidationEvent, ExecutionResult)> {
        let mut events: Vec<InvalidationEvent> = self.pending.iter().map(|e| *e.key()).collect();
        events.sort();

        let mut results = Vec::with_capacity(events.len());
        for event in events {
            let Some((_, mut burst)) = self.pending.remove(&event) else {
                // Its worker claimed it first.
                continue;
            };
            if let Some(timer) = burst.timer.take() {
                timer.abort();
            }
            with_metrics(|m| m.pending_bursts.dec());

            tracing::debug!(
                event = %event,
                requests = burst.request_count,
                waited_ms = burst.first_request_time.elapsed().as_millis() as u64,
                "Flushing pending invalidation"
            );
            let result = self
                .executor
                .execute(&burst.accumulated_keys, ExecutionOrigin::Flush)
                .await;
            results.push((event, result));
        }
        results
    }

    /// Stop accepting new bursts and flush the ones already pending.
    ///
    /// Requests merging into a burst that is still pending are accepted until
    /// that burst is flushed; critical and forced invalidations keep working.
    pub async fn shutdown(&self) -> Vec<(InvalidationEvent, ExecutionResult)> {
        self.accepting.store(false, Ordering::SeqCst);
        let flushed = self.flush_pending().await;
        tracing::info!(flushed = flushed.len(), "Invalidation coordinator shut down");
        flushed
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Events with a burst currently pending, in event order.
    pub fn pending_events(&self) -> Vec<InvalidationEvent> {
        let mut events: Vec<InvalidationEvent> = self.pending.iter().map(|e| *e.key()).collect();
        events.sort();
        events
    }

    /// Snapshot statistics, probing the store for availability.
    pub async fn get_stats(&self) -> InvalidationStatsSnapshot {
        let store_available = self.executor.store().ping().await;
        self.stats.snapshot(self.pending.len(), store_available)
    }

    pub fn stats(&self) -> &Arc<InvalidationStats> {
        &self.stats
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn config(&self) -> &InvalidationConfig {
        &self.config
    }
}

enum BurstState {
    Due(PendingInvalidation),
    Extended(Instant),
    Gone,
}

/// Inspect the burst under its entry lock; remove it only if it is due.
fn claim_if_due(
    pending: &DashMap<InvalidationEvent, PendingInvalidation>,
    event: InvalidationEvent,
    burst_id: u64,
) -> BurstState {
    match pending.entry(event) {
        Entry::Occupied(occupied) if occupied.get().burst_id == burst_id => {
            let deadline = occupied.get().deadline;
            if deadline > Instant::now() {
                BurstState::Extended(deadline)
            } else {
                BurstState::Due(occupied.remove())
            }
        }
        _ => BurstState::Gone,
    }
}

/// Burst worker: wait out the debounce window, then execute exactly once.
async fn run_burst(
    event: InvalidationEvent,
    burst_id: u64,
    deadline: Instant,
    context: BurstContext,
) {
    let mut wake_at = deadline;
    loop {
        tokio::time::sleep_until(wake_at).await;

        match claim_if_due(&context.pending, event, burst_id) {
            BurstState::Extended(next) => wake_at = next,
            BurstState::Gone => return,
            BurstState::Due(burst) => {
                with_metrics(|m| m.pending_bursts.dec());
                if burst.hit_max_delay {
                    context.stats.record_max_delay_flush();
                    tracing::debug!(event = %event, "Burst hit max delay");
                }
                tracing::debug!(
                    event = %event,
                    requests = burst.request_count,
                    keys = burst.accumulated_keys.len(),
                    waited_ms = burst.first_request_time.elapsed().as_millis() as u64,
                    "Executing debounced invalidation"
                );
                context
                    .executor
                    .execute(&burst.accumulated_keys, ExecutionOrigin::Burst)
                    .await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipper_core::{InvalidationRule, Priority};
    use clipper_storage::InMemoryCacheStore;

    fn coordinator_with(store: Arc<InMemoryCacheStore>) -> InvalidationCoordinator {
        InvalidationCoordinator::new(store, RuleTable::defaults(), InvalidationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_schedules_then_coalesces() {
        let coordinator = coordinator_with(Arc::new(InMemoryCacheStore::new()));
        let start = Instant::now();

        let first = coordinator
            .submit(InvalidationEvent::JobCreated, &[])
            .await
            .unwrap();
        assert_eq!(
            first,
            Submission::Scheduled {
                deadline: start + Duration::from_millis(2000)
            }
        );

        tokio::time::advance(Duration::from_millis(500)).await;
        let second = coordinator
            .submit(InvalidationEvent::JobCreated, &[])
            .await
            .unwrap();
        assert_eq!(
            second,
            Submission::Coalesced {
                deadline: start + Duration::from_millis(2500)
            }
        );
        assert_eq!(coordinator.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_window_is_capped() {
        let rules = RuleTable::defaults()
            .with_overrides(
                &clipper_core::RuleOverrides::from_toml(
                    "[rules.\"job:failed\"]\ndebounce_ms = 4000\nmax_delay_ms = 8000\n",
                )
                .unwrap(),
            )
            .unwrap();
        let coordinator = InvalidationCoordinator::new(
            Arc::new(InMemoryCacheStore::new()),
            rules,
            InvalidationConfig::default(),
        );
        let start = Instant::now();

        let rule = coordinator.rules().lookup(InvalidationEvent::JobFailed).unwrap();
        assert_eq!(rule.debounce_window, Duration::from_millis(4000));
        assert_eq!(
            rule.effective_window(coordinator.config().high_priority_cap),
            Duration::from_millis(1000)
        );

        let submission = coordinator
            .submit(InvalidationEvent::JobFailed, &[])
            .await
            .unwrap();
        assert_eq!(
            submission,
            Submission::Scheduled {
                deadline: start + Duration::from_millis(1000)
            }
        );
    }

    struct NoopWake;

    impl std::task::Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    #[test]
    fn test_invalidate_outside_runtime_fails_to_schedule() {
        use std::future::Future;
        use std::task::{Context, Poll, Waker};

        let coordinator = coordinator_with(Arc::new(InMemoryCacheStore::new()));
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);

        let mut request = std::pin::pin!(coordinator.invalidate("job:created", &[]));
        match request.as_mut().poll(&mut cx) {
            Poll::Ready(accepted) => assert!(!accepted),
            Poll::Pending => panic!("debounced request should not wait"),
        }

        let snapshot = coordinator.stats().snapshot(coordinator.pending_count(), true);
        assert_eq!(snapshot.requested, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.pending_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_executes_inline() {
        let store = Arc::new(InMemoryCacheStore::with_keys(["queue:status", "system:health"]));
        let coordinator = coordinator_with(Arc::clone(&store));

        let submission = coordinator
            .submit(InvalidationEvent::QueuePaused, &[])
            .await
            .unwrap();

        match submission {
            Submission::Executed(result) => {
                assert_eq!(result.deleted_count, 2);
                assert!(result.succeeded());
            }
            other => panic!("expected inline execution, got {:?}", other),
        }
        assert!(store.is_empty());
        assert_eq!(coordinator.pending_count(), 0);
        assert_eq!(
            coordinator.stats().critical_bypasses.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_event_is_rejected() {
        let coordinator = coordinator_with(Arc::new(InMemoryCacheStore::new()));

        assert!(!coordinator.invalidate("job:exploded", &[]).await);

        let stats = coordinator.get_stats().await;
        assert_eq!(stats.unknown_events, 1);
        assert_eq!(stats.requested, 0);
        assert_eq!(stats.pending_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extended_deadline_is_clamped_to_max_delay() {
        let coordinator = coordinator_with(Arc::new(InMemoryCacheStore::new()));
        let start = Instant::now();

        coordinator
            .submit(InvalidationEvent::QueueResumed, &[])
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;
        coordinator
            .submit(InvalidationEvent::QueueResumed, &[])
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;
        coordinator
            .submit(InvalidationEvent::QueueResumed, &[])
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;
        coordinator
            .submit(InvalidationEvent::QueueResumed, &[])
            .await
            .unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;
        let last = coordinator
            .submit(InvalidationEvent::QueueResumed, &[])
            .await
            .unwrap();

        assert_eq!(
            last,
            Submission::Coalesced {
                deadline: start + Duration::from_millis(2000)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_rejects_new_bursts() {
        let coordinator = coordinator_with(Arc::new(InMemoryCacheStore::new()));
        coordinator
            .submit(InvalidationEvent::FileUploaded, &[])
            .await
            .unwrap();

        let flushed = coordinator.shutdown().await;
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].0, InvalidationEvent::FileUploaded);
        assert!(!coordinator.is_accepting());

        let err = coordinator
            .submit(InvalidationEvent::FileUploaded, &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("shut down"));
        assert_eq!(coordinator.stats().errors.load(Ordering::Relaxed), 1);
        assert_eq!(coordinator.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_rule_table() {
        let mut rules: Vec<InvalidationRule> = RuleTable::defaults().iter().cloned().collect();
        for rule in &mut rules {
            if rule.event == InvalidationEvent::AgentConfigChanged {
                rule.priority = Priority::Critical;
                rule.debounce_window = Duration::ZERO;
                rule.max_delay = Duration::ZERO;
            }
        }
        let coordinator = InvalidationCoordinator::new(
            Arc::new(InMemoryCacheStore::with_keys(["agents:status"])),
            RuleTable::new(rules).unwrap(),
            InvalidationConfig::default(),
        );

        let submission = coordinator
            .submit(InvalidationEvent::AgentConfigChanged, &[])
            .await
            .unwrap();
        assert!(submission.is_executed());
    }
}
