//! Invalidation rule table.
//!
//! A static mapping from [`InvalidationEvent`] to the cache keys it stales and
//! the debounce policy that governs how quickly those keys are deleted. The
//! table is built once at startup (built-in registry plus optional TOML
//! overrides), validated, and never mutated afterwards.

use crate::{
    CacheKeySet, ClipperResult, ConfigError, InvalidationEvent, Priority,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

/// Invalidation policy for a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRule {
    pub event: InvalidationEvent,
    pub cache_keys: CacheKeySet,
    /// Quiet period after the last request before the burst executes.
    pub debounce_window: Duration,
    /// Upper bound between the first request of a burst and its execution.
    pub max_delay: Duration,
    pub priority: Priority,
}

impl InvalidationRule {
    pub fn new(
        event: InvalidationEvent,
        cache_keys: &[&str],
        debounce_ms: u64,
        max_delay_ms: u64,
        priority: Priority,
    ) -> Self {
        Self {
            event,
            cache_keys: cache_keys.iter().map(|k| k.to_string()).collect(),
            debounce_window: Duration::from_millis(debounce_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            priority,
        }
    }

    /// Debounce window actually applied by the coordinator.
    ///
    /// Critical rules never wait; high-priority rules are capped at
    /// `high_priority_cap`.
    pub fn effective_window(&self, high_priority_cap: Duration) -> Duration {
        match self.priority {
            Priority::Critical => Duration::ZERO,
            Priority::High => self.debounce_window.min(high_priority_cap),
            Priority::Normal | Priority::Low => self.debounce_window,
        }
    }

    /// Union of the rule's keys and caller-supplied extras.
    pub fn resolve_keys<'a, I>(&self, extra_keys: I) -> CacheKeySet
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut keys = self.cache_keys.clone();
        keys.extend(extra_keys.into_iter().cloned());
        keys
    }

    fn validate(&self) -> ClipperResult<()> {
        if self.cache_keys.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: format!("rules.{}.cache_keys", self.event),
                value: "[]".to_string(),
                reason: "rule must invalidate at least one cache key".to_string(),
            }
            .into());
        }

        if self.priority.bypasses_debounce() {
            return Ok(());
        }

        if self.debounce_window.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: format!("rules.{}.debounce_ms", self.event),
                value: "0".to_string(),
                reason: "only critical rules may skip debouncing".to_string(),
            }
            .into());
        }

        if self.max_delay < self.debounce_window {
            return Err(ConfigError::InvalidValue {
                field: format!("rules.{}.max_delay_ms", self.event),
                value: self.max_delay.as_millis().to_string(),
                reason: format!(
                    "must be at least the debounce window ({}ms)",
                    self.debounce_window.as_millis()
                ),
            }
            .into());
        }

        Ok(())
    }
}

/// Per-event override loaded from the rules file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverride {
    pub debounce_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub priority: Option<Priority>,
    /// Keys added to the rule's built-in key set.
    #[serde(default)]
    pub extra_keys: Vec<String>,
}

/// Top-level shape of the rules override document.
///
/// ```toml
/// [rules."job:deleted"]
/// debounce_ms = 500
/// extra_keys = ["clips:recent"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOverrides {
    #[serde(default)]
    pub rules: BTreeMap<String, RuleOverride>,
}

impl RuleOverrides {
    pub fn from_toml(source: &str) -> ClipperResult<Self> {
        toml::from_str(source).map_err(|e| {
            ConfigError::ParseFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Validated event → rule lookup.
#[derive(Debug, Clone)]
pub struct RuleTable {
    rules: HashMap<InvalidationEvent, InvalidationRule>,
}

impl RuleTable {
    /// Build a table from explicit rules.
    ///
    /// Fails if any registered event lacks a rule or any rule is malformed.
    pub fn new(rules: impl IntoIterator<Item = InvalidationRule>) -> ClipperResult<Self> {
        let table = Self {
            rules: rules.into_iter().map(|rule| (rule.event, rule)).collect(),
        };
        table.validate()?;
        Ok(table)
    }

    /// The built-in registry.
    pub fn defaults() -> Self {
        use InvalidationEvent::*;
        use Priority::*;

        let rules = [
            InvalidationRule::new(
                JobCreated,
                &["dashboard:stats", "jobs:list", "queue:status"],
                2000,
                10_000,
                Normal,
            ),
            InvalidationRule::new(
                JobStatusChanged,
                &["dashboard:stats", "jobs:list", "queue:status"],
                1000,
                5000,
                Normal,
            ),
            InvalidationRule::new(
                JobCompleted,
                &["dashboard:stats", "jobs:list", "analytics:summary"],
                2000,
                10_000,
                Normal,
            ),
            InvalidationRule::new(
                JobFailed,
                &["dashboard:stats", "jobs:list", "system:errors"],
                500,
                3000,
                High,
            ),
            InvalidationRule::new(
                JobRetryRequested,
                &["jobs:list", "queue:status"],
                1500,
                8000,
                Normal,
            ),
            InvalidationRule::new(
                JobDeleted,
                &["dashboard:stats", "jobs:list", "analytics:summary"],
                1000,
                5000,
                High,
            ),
            InvalidationRule::new(
                QueueCleared,
                &["queue:status", "jobs:list", "dashboard:stats"],
                0,
                0,
                Critical,
            ),
            InvalidationRule::new(QueuePaused, &["queue:status", "system:health"], 0, 0, Critical),
            InvalidationRule::new(
                QueueResumed,
                &["queue:status", "system:health"],
                500,
                2000,
                High,
            ),
            InvalidationRule::new(
                FileUploaded,
                &["files:list", "storage:usage"],
                3000,
                15_000,
                Low,
            ),
            InvalidationRule::new(
                FileDeleted,
                &["files:list", "storage:usage"],
                3000,
                15_000,
                Low,
            ),
            InvalidationRule::new(
                AgentConfigChanged,
                &["agents:status", "system:health"],
                1000,
                5000,
                Normal,
            ),
            InvalidationRule::new(
                SystemMaintenance,
                &["system:health", "dashboard:stats"],
                0,
                0,
                Critical,
            ),
        ];

        Self {
            rules: rules.into_iter().map(|rule| (rule.event, rule)).collect(),
        }
    }

    /// Apply overrides on top of this table and re-validate.
    pub fn with_overrides(mut self, overrides: &RuleOverrides) -> ClipperResult<Self> {
        for (name, patch) in &overrides.rules {
            let event = InvalidationEvent::from_str(name).map_err(|_| ConfigError::InvalidValue {
                field: "rules".to_string(),
                value: name.clone(),
                reason: "not a registered invalidation event".to_string(),
            })?;
            let rule = self
                .rules
                .get_mut(&event)
                .ok_or(ConfigError::MissingRule { event })?;

            if let Some(ms) = patch.debounce_ms {
                rule.debounce_window = Duration::from_millis(ms);
            }
            if let Some(ms) = patch.max_delay_ms {
                rule.max_delay = Duration::from_millis(ms);
            }
            if let Some(priority) = patch.priority {
                rule.priority = priority;
            }
            rule.cache_keys.extend(patch.extra_keys.iter().cloned());
        }

        self.validate()?;
        Ok(self)
    }

    /// Built-in registry with a TOML override document applied.
    pub fn from_toml_overrides(source: &str) -> ClipperResult<Self> {
        Self::defaults().with_overrides(&RuleOverrides::from_toml(source)?)
    }

    pub fn validate(&self) -> ClipperResult<()> {
        for event in InvalidationEvent::ALL {
            match self.rules.get(&event) {
                Some(rule) => rule.validate()?,
                None => return Err(ConfigError::MissingRule { event }.into()),
            }
        }
        Ok(())
    }

    pub fn lookup(&self, event: InvalidationEvent) -> Option<&InvalidationRule> {
        self.rules.get(&event)
    }

    /// Look up by raw event name. Unknown names yield `None`.
    pub fn lookup_name(&self, event_name: &str) -> Option<&InvalidationRule> {
        InvalidationEvent::from_str(event_name)
            .ok()
            .and_then(|event| self.lookup(event))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InvalidationRule> {
        self.rules.values()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::defaults()
    }
}
