//! Invalidation events and priority classes.
//!
//! Every state change in the backend that can stale cached dashboard data is
//! represented by an [`InvalidationEvent`]. The set is closed: producers that
//! still speak in event-name strings go through [`InvalidationEvent::from_str`],
//! which rejects anything outside the registry.

use crate::error::InvalidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Events that trigger cache invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InvalidationEvent {
    #[serde(rename = "job:created")]
    JobCreated,
    #[serde(rename = "job:status_changed")]
    JobStatusChanged,
    #[serde(rename = "job:completed")]
    JobCompleted,
    #[serde(rename = "job:failed")]
    JobFailed,
    #[serde(rename = "job:retry_requested")]
    JobRetryRequested,
    #[serde(rename = "job:deleted")]
    JobDeleted,
    #[serde(rename = "queue:cleared")]
    QueueCleared,
    #[serde(rename = "queue:paused")]
    QueuePaused,
    #[serde(rename = "queue:resumed")]
    QueueResumed,
    #[serde(rename = "file:uploaded")]
    FileUploaded,
    #[serde(rename = "file:deleted")]
    FileDeleted,
    #[serde(rename = "agent:config_changed")]
    AgentConfigChanged,
    #[serde(rename = "system:maintenance")]
    SystemMaintenance,
}

impl InvalidationEvent {
    /// Every registered event, in declaration order.
    pub const ALL: [InvalidationEvent; 13] = [
        InvalidationEvent::JobCreated,
        InvalidationEvent::JobStatusChanged,
        InvalidationEvent::JobCompleted,
        InvalidationEvent::JobFailed,
        InvalidationEvent::JobRetryRequested,
        InvalidationEvent::JobDeleted,
        InvalidationEvent::QueueCleared,
        InvalidationEvent::QueuePaused,
        InvalidationEvent::QueueResumed,
        InvalidationEvent::FileUploaded,
        InvalidationEvent::FileDeleted,
        InvalidationEvent::AgentConfigChanged,
        InvalidationEvent::SystemMaintenance,
    ];

    /// Canonical event name as raised by producers.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationEvent::JobCreated => "job:created",
            InvalidationEvent::JobStatusChanged => "job:status_changed",
            InvalidationEvent::JobCompleted => "job:completed",
            InvalidationEvent::JobFailed => "job:failed",
            InvalidationEvent::JobRetryRequested => "job:retry_requested",
            InvalidationEvent::JobDeleted => "job:deleted",
            InvalidationEvent::QueueCleared => "queue:cleared",
            InvalidationEvent::QueuePaused => "queue:paused",
            InvalidationEvent::QueueResumed => "queue:resumed",
            InvalidationEvent::FileUploaded => "file:uploaded",
            InvalidationEvent::FileDeleted => "file:deleted",
            InvalidationEvent::AgentConfigChanged => "agent:config_changed",
            InvalidationEvent::SystemMaintenance => "system:maintenance",
        }
    }
}

impl fmt::Display for InvalidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationEvent {
    type Err = InvalidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvalidationEvent::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| InvalidationError::UnknownEvent {
                event_name: s.to_string(),
            })
    }
}

/// Priority class of an invalidation rule.
///
/// `Critical` bypasses debouncing entirely; `High` has its debounce window
/// capped; `Normal` and `Low` use the configured window as-is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Whether requests of this priority skip the debounce coordinator.
    pub fn bypasses_debounce(&self) -> bool {
        matches!(self, Priority::Critical)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_event_names_are_unique() {
        let mut names: Vec<&str> = InvalidationEvent::ALL.iter().map(|e| e.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), InvalidationEvent::ALL.len());
    }

    #[test]
    fn test_parse_known_event() {
        let event: InvalidationEvent = "job:retry_requested".parse().unwrap();
        assert_eq!(event, InvalidationEvent::JobRetryRequested);
    }

    #[test]
    fn test_parse_unknown_event() {
        let err = "nonexistent:event".parse::<InvalidationEvent>().unwrap_err();
        assert_eq!(
            err,
            InvalidationError::UnknownEvent {
                event_name: "nonexistent:event".to_string()
            }
        );
    }

    #[test]
    fn test_serde_uses_event_name() {
        #[derive(Deserialize)]
        struct Wrapper {
            event: InvalidationEvent,
            priority: Priority,
        }
        let parsed: Wrapper =
            toml::from_str("event = \"queue:cleared\"\npriority = \"critical\"").unwrap();
        assert_eq!(parsed.event, InvalidationEvent::QueueCleared);
        assert_eq!(parsed.priority, Priority::Critical);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert!(Priority::Critical.bypasses_debounce());
        assert!(!Priority::High.bypasses_debounce());
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(idx in 0usize..InvalidationEvent::ALL.len()) {
            let event = InvalidationEvent::ALL[idx];
            let parsed: InvalidationEvent = event.to_string().parse().unwrap();
            prop_assert_eq!(parsed, event);
        }

        #[test]
        fn prop_unregistered_names_rejected(name in "[a-z]{1,8}:[a-z_]{1,12}") {
            let known = InvalidationEvent::ALL.iter().any(|e| e.as_str() == name);
            prop_assert_eq!(name.parse::<InvalidationEvent>().is_ok(), known);
        }
    }
}
