//! Constants for Clipper
//!
//! Default values for the invalidation engine. Environment variables in
//! [`crate::InvalidationConfig::from_env`] fall back to these.

// ============================================================================
// DEBOUNCING
// ============================================================================

/// Upper bound on the debounce window of high-priority rules (1 second)
pub const DEFAULT_HIGH_PRIORITY_CAP_MS: u64 = 1000;

// ============================================================================
// REPOPULATION
// ============================================================================

/// Whether invalidated keys are handed to the repopulator by default
pub const DEFAULT_REPOPULATE_AFTER_INVALIDATION: bool = false;

// ============================================================================
// OBSERVABILITY
// ============================================================================

/// How often the stats reporter logs a snapshot (1 minute)
pub const DEFAULT_STATS_REPORT_INTERVAL_SECS: u64 = 60;

// ============================================================================
// ENVIRONMENT VARIABLES
// ============================================================================

pub const ENV_HIGH_PRIORITY_CAP_MS: &str = "CLIPPER_HIGH_PRIORITY_CAP_MS";
pub const ENV_REPOPULATE: &str = "CLIPPER_REPOPULATE";
pub const ENV_STATS_INTERVAL_SECS: &str = "CLIPPER_STATS_INTERVAL_SECS";
pub const ENV_RULES_PATH: &str = "CLIPPER_RULES_PATH";
pub const ENV_REDIS_URL: &str = "CLIPPER_REDIS_URL";
