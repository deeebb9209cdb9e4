//! Prometheus Metrics Definitions
//!
//! Mirrors [`crate::InvalidationStats`] into the global Prometheus registry so
//! the surrounding service can expose them on its scrape endpoint.

use clipper_core::{ClipperError, ClipperResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, register_int_gauge,
    CounterVec, Encoder, Histogram, IntCounter, IntGauge, TextEncoder,
};

/// Store delete latency buckets (seconds)
const DELETE_LATENCY_BUCKETS: &[f64] =
    &[0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ClipperResult<InvalidationMetrics>> = Lazy::new(InvalidationMetrics::new);

/// Container for all invalidation metrics.
#[derive(Clone)]
pub struct InvalidationMetrics {
    /// Invalidation requests - labels: event, path (debounced/critical/rejected)
    pub requests_total: CounterVec,

    /// Store batches - labels: origin (burst/critical/force/flush), status (success/error)
    pub executions_total: CounterVec,

    /// Keys actually removed from the store
    pub keys_deleted_total: IntCounter,

    /// Batched delete latency
    pub delete_duration_seconds: Histogram,

    /// Bursts waiting on their debounce window
    pub pending_bursts: IntGauge,
}

impl InvalidationMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ClipperResult<Self> {
        Ok(Self {
            requests_total: register_counter_vec!(
                "clipper_invalidation_requests_total",
                "Total number of invalidation requests",
                &["event", "path"]
            )
            .map_err(|e| ClipperError::internal(format!("Failed to register requests_total: {}", e)))?,

            executions_total: register_counter_vec!(
                "clipper_invalidation_executions_total",
                "Total number of batched invalidations sent to the cache store",
                &["origin", "status"]
            )
            .map_err(|e| ClipperError::internal(format!("Failed to register executions_total: {}", e)))?,

            keys_deleted_total: register_int_counter!(
                "clipper_invalidation_keys_deleted_total",
                "Total number of cache keys removed by invalidation"
            )
            .map_err(|e| ClipperError::internal(format!("Failed to register keys_deleted_total: {}", e)))?,

            delete_duration_seconds: register_histogram!(
                "clipper_invalidation_delete_duration_seconds",
                "Batched cache delete duration in seconds",
                DELETE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| ClipperError::internal(format!("Failed to register delete_duration_seconds: {}", e)))?,

            pending_bursts: register_int_gauge!(
                "clipper_invalidation_pending_bursts",
                "Current number of debounced bursts awaiting execution"
            )
            .map_err(|e| ClipperError::internal(format!("Failed to register pending_bursts: {}", e)))?,
        })
    }

    pub fn record_request(&self, event: &str, path: &str) {
        self.requests_total.with_label_values(&[event, path]).inc();
    }

    pub fn record_execution(&self, origin: &str, success: bool, deleted: u64, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.executions_total
            .with_label_values(&[origin, status])
            .inc();
        self.keys_deleted_total.inc_by(deleted);
        self.delete_duration_seconds.observe(duration_secs);
    }
}

/// Run `f` against the global metrics if they registered successfully.
pub(crate) fn with_metrics(f: impl FnOnce(&InvalidationMetrics)) {
    if let Ok(metrics) = METRICS.as_ref() {
        f(metrics);
    }
}

/// Render every registered metric in Prometheus text format.
pub fn render_metrics() -> ClipperResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ClipperError::internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ClipperError::internal(format!("Metrics output not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e))?;
        assert!(!metrics.requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_and_render() -> Result<(), String> {
        let metrics = METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e))?;
        metrics.record_request("job:deleted", "debounced");
        metrics.record_execution("burst", true, 2, 0.002);
        metrics.record_execution("force", false, 0, 0.001);

        let rendered = render_metrics().map_err(|e| e.to_string())?;
        assert!(rendered.contains("clipper_invalidation_requests_total"));
        assert!(rendered.contains("clipper_invalidation_executions_total"));
        Ok(())
    }
}
