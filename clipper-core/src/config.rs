//! Configuration types

use crate::constants::*;
use crate::{ClipperResult, ConfigError, RuleTable};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the invalidation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidationConfig {
    /// Debounce window ceiling for high-priority rules (default: 1 second)
    pub high_priority_cap: Duration,

    /// Hand invalidated keys to the repopulator after each successful batch
    /// (default: false)
    pub repopulate_after_invalidation: bool,

    /// How often the stats reporter logs a snapshot (default: 60 seconds)
    pub stats_report_interval: Duration,

    /// Optional TOML file with rule overrides
    pub rules_path: Option<PathBuf>,

    /// Redis connection URL. In-memory store when absent.
    pub redis_url: Option<String>,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            high_priority_cap: Duration::from_millis(DEFAULT_HIGH_PRIORITY_CAP_MS),
            repopulate_after_invalidation: DEFAULT_REPOPULATE_AFTER_INVALIDATION,
            stats_report_interval: Duration::from_secs(DEFAULT_STATS_REPORT_INTERVAL_SECS),
            rules_path: None,
            redis_url: None,
        }
    }
}

impl InvalidationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create InvalidationConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CLIPPER_HIGH_PRIORITY_CAP_MS`: High-priority debounce ceiling (default: 1000)
    /// - `CLIPPER_REPOPULATE`: Repopulate after invalidation (default: false)
    /// - `CLIPPER_STATS_INTERVAL_SECS`: Stats report interval (default: 60)
    /// - `CLIPPER_RULES_PATH`: Rule override file (default: none)
    /// - `CLIPPER_REDIS_URL`: Redis URL (default: none, in-memory store)
    pub fn from_env() -> Self {
        let high_priority_cap = Duration::from_millis(
            std::env::var(ENV_HIGH_PRIORITY_CAP_MS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_HIGH_PRIORITY_CAP_MS),
        );

        let repopulate_after_invalidation = std::env::var(ENV_REPOPULATE)
            .ok()
            .map(|s| s == "true" || s == "1")
            .unwrap_or(DEFAULT_REPOPULATE_AFTER_INVALIDATION);

        let stats_report_interval = Duration::from_secs(
            std::env::var(ENV_STATS_INTERVAL_SECS)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_STATS_REPORT_INTERVAL_SECS),
        );

        let rules_path = std::env::var(ENV_RULES_PATH)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let redis_url = std::env::var(ENV_REDIS_URL).ok().filter(|s| !s.is_empty());

        Self {
            high_priority_cap,
            repopulate_after_invalidation,
            stats_report_interval,
            rules_path,
            redis_url,
        }
    }

    /// Short report interval for local runs.
    pub fn development() -> Self {
        Self {
            stats_report_interval: Duration::from_secs(10),
            ..Self::default()
        }
    }

    pub fn with_high_priority_cap(mut self, cap: Duration) -> Self {
        self.high_priority_cap = cap;
        self
    }

    pub fn with_repopulation(mut self, enabled: bool) -> Self {
        self.repopulate_after_invalidation = enabled;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_report_interval = interval;
        self
    }

    pub fn with_rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    pub fn validate(&self) -> ClipperResult<()> {
        if self.high_priority_cap.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "high_priority_cap".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        if self.stats_report_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "stats_report_interval".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Build the rule table, applying the override file if one is configured.
    pub fn load_rules(&self) -> ClipperResult<RuleTable> {
        match &self.rules_path {
            Some(path) => {
                let source = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidValue {
                    field: ENV_RULES_PATH.to_string(),
                    value: path.display().to_string(),
                    reason: e.to_string(),
                })?;
                RuleTable::from_toml_overrides(&source)
            }
            None => Ok(RuleTable::defaults()),
        }
    }
}
