//! Clipper Invalidator Entry Point
//!
//! Builds the cache store and coordinator from the environment, then reads
//! invalidation commands from stdin until EOF or ctrl-c. Pending bursts are
//! flushed before exit so no invalidation is lost.

use std::sync::Arc;

use clipper_core::{ClipperError, ClipperResult, InvalidationConfig};
use clipper_invalidation::{
    init_tracing, stats_reporter_task, Command, InvalidationCoordinator, NoopRepopulator,
    TelemetryConfig,
};
use clipper_storage::{CacheStore, InMemoryCacheStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ClipperResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let config = InvalidationConfig::from_env();
    config.validate()?;
    let rules = config.load_rules()?;
    let store = build_store(&config).await?;

    let coordinator = Arc::new(InvalidationCoordinator::with_repopulator(
        store,
        rules,
        config.clone(),
        Arc::new(NoopRepopulator),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = tokio::spawn(stats_reporter_task(
        Arc::clone(&coordinator),
        config.stats_report_interval,
        shutdown_rx,
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&coordinator, &line).await?,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    coordinator.shutdown().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Stats reporter already stopped");
    }
    if let Err(e) = reporter.await {
        tracing::warn!(error = %e, "Stats reporter task failed");
    }
    Ok(())
}

async fn build_store(config: &InvalidationConfig) -> ClipperResult<Arc<dyn CacheStore>> {
    match &config.redis_url {
        #[cfg(feature = "redis")]
        Some(url) => {
            let store = clipper_storage::RedisCacheStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => Err(clipper_core::ConfigError::InvalidValue {
            field: clipper_core::constants::ENV_REDIS_URL.to_string(),
            value: "<set>".to_string(),
            reason: "built without the redis feature".to_string(),
        }
        .into()),
        None => {
            tracing::warn!("No Redis URL configured, using in-memory cache store");
            Ok(Arc::new(InMemoryCacheStore::new()))
        }
    }
}

async fn handle_line(coordinator: &InvalidationCoordinator, line: &str) -> ClipperResult<()> {
    let Some(command) = Command::parse(line) else {
        return Ok(());
    };

    match command {
        Command::Invalidate { event, extra_keys } => {
            let accepted = coordinator.invalidate(&event, &extra_keys).await;
            println!("{} {}", if accepted { "ok" } else { "rejected" }, event);
        }
        Command::Force { keys } if keys.is_empty() => {
            println!("usage: force <key>[,<key>...]");
        }
        Command::Force { keys } => {
            let result = coordinator.force_invalidate_with_result(&keys).await;
            println!(
                "{} deleted={} attempted={}",
                if result.succeeded() { "ok" } else { "failed" },
                result.deleted_count,
                result.attempted_count
            );
        }
        Command::Stats => {
            let snapshot = coordinator.get_stats().await;
            let json = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| ClipperError::internal(format!("Failed to encode stats: {}", e)))?;
            println!("{}", json);
        }
        Command::Flush => {
            for (event, result) in coordinator.flush_pending().await {
                println!("flushed {} deleted={}", event, result.deleted_count);
            }
        }
    }
    Ok(())
}
