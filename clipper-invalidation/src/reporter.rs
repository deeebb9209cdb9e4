//! Stats Reporter Background Task
//!
//! Periodically logs an invalidation stats snapshot so operators can watch
//! debounce efficiency and store health without a metrics scrape. Runs until
//! the shutdown channel flips to `true` or its sender goes away.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::coordinator::InvalidationCoordinator;
use crate::stats::InvalidationStatsSnapshot;

/// Log stats every `every` until shutdown. Returns the last snapshot taken.
pub async fn stats_reporter_task(
    coordinator: Arc<InvalidationCoordinator>,
    every: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> InvalidationStatsSnapshot {
    let mut report_interval = interval(every);
    report_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; nothing to report yet.
    report_interval.tick().await;

    tracing::info!(interval_secs = every.as_secs(), "Stats reporter started");

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    tracing::info!("Shutdown sender dropped, stats reporter stopping");
                    break;
                }
                if *shutdown_rx.borrow() {
                    tracing::info!("Stats reporter shutting down");
                    break;
                }
            }

            _ = report_interval.tick() => {
                report(&coordinator.get_stats().await);
            }
        }
    }

    let snapshot = coordinator.get_stats().await;
    report(&snapshot);
    snapshot
}

fn report(snapshot: &InvalidationStatsSnapshot) {
    tracing::info!(
        requested = snapshot.requested,
        executed = snapshot.executed,
        debounced = snapshot.debounced,
        cache_operations = snapshot.cache_operations,
        errors = snapshot.errors,
        unknown_events = snapshot.unknown_events,
        critical_bypasses = snapshot.critical_bypasses,
        max_delay_flushes = snapshot.max_delay_flushes,
        debounce_efficiency_percent = snapshot.debounce_efficiency_percent,
        pending = snapshot.pending_count,
        store_available = snapshot.store_available,
        uptime_seconds = snapshot.uptime_seconds,
        "Invalidation stats"
    );
    if !snapshot.store_available {
        tracing::warn!("Cache store is not answering pings");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipper_core::{InvalidationConfig, RuleTable};
    use clipper_storage::InMemoryCacheStore;

    #[tokio::test(start_paused = true)]
    async fn test_reporter_stops_on_shutdown() {
        let coordinator = Arc::new(InvalidationCoordinator::new(
            Arc::new(InMemoryCacheStore::new()),
            RuleTable::defaults(),
            InvalidationConfig::default(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(stats_reporter_task(
            Arc::clone(&coordinator),
            Duration::from_secs(10),
            shutdown_rx,
        ));

        assert!(coordinator.invalidate("job:created", &[]).await);
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown_tx.send(true).unwrap();

        let snapshot = task.await.unwrap();
        assert_eq!(snapshot.requested, 1);
        assert_eq!(snapshot.executed, 1);
        assert!(snapshot.store_available);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_stops_when_sender_dropped() {
        let coordinator = Arc::new(InvalidationCoordinator::new(
            Arc::new(InMemoryCacheStore::new()),
            RuleTable::defaults(),
            InvalidationConfig::default(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(stats_reporter_task(
            Arc::clone(&coordinator),
            Duration::from_secs(10),
            shutdown_rx,
        ));
        drop(shutdown_tx);

        let snapshot = tokio::time::timeout(Duration::from_secs(60), task)
            .await
            .expect("reporter kept running after its sender was dropped")
            .unwrap();
        assert_eq!(snapshot.requested, 0);
    }
}
