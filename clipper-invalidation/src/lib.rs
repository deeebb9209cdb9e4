//! Clipper Invalidation - Debounced Cache Invalidation Engine
//!
//! Translates domain events (job created, queue paused, file uploaded, ...)
//! into batched deletes of the cache keys those events stale. Bursts of the
//! same event are coalesced behind a per-event debounce window so a flurry of
//! job updates costs one round-trip to the cache store instead of dozens.
//! Critical events skip the debounce and are deleted before the call returns.
//!
//! The [`InvalidationCoordinator`] is the entry point; it is constructed by
//! the composition root and shared behind an `Arc`.

pub mod command;
pub mod coordinator;
pub mod executor;
pub mod metrics;
pub mod reporter;
pub mod repopulate;
pub mod stats;
pub mod telemetry;

pub use command::Command;
pub use coordinator::{InvalidationCoordinator, Submission};
pub use executor::{BatchExecutor, ExecutionOrigin, ExecutionResult};
pub use metrics::{render_metrics, InvalidationMetrics, METRICS};
pub use reporter::stats_reporter_task;
pub use repopulate::{CacheRepopulator, NoopRepopulator};
pub use stats::{InvalidationStats, InvalidationStatsSnapshot};
pub use telemetry::{init_tracing, TelemetryConfig};
