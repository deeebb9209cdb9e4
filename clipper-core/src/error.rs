//! Error types for Clipper operations

use crate::InvalidationEvent;
use thiserror::Error;

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Cache store command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Cache store lock poisoned")]
    LockPoisoned,
}

/// Invalidation request errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidationError {
    #[error("Unknown invalidation event: {event_name}")]
    UnknownEvent { event_name: String },

    #[error("Failed to schedule invalidation for {event}: {reason}")]
    SchedulingFailed {
        event: InvalidationEvent,
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("No invalidation rule registered for {event}")]
    MissingRule { event: InvalidationEvent },

    #[error("Failed to parse rule overrides: {reason}")]
    ParseFailed { reason: String },
}

/// Master error type for all Clipper errors.
#[derive(Debug, Clone, Error)]
pub enum ClipperError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalidation error: {0}")]
    Invalidation(#[from] InvalidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClipperError {
    pub fn internal(message: impl Into<String>) -> Self {
        ClipperError::Internal(message.into())
    }
}

/// Result type alias for Clipper operations.
pub type ClipperResult<T> = Result<T, ClipperError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_unavailable() {
        let err = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("unavailable"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_invalidation_error_display_unknown_event() {
        let err = InvalidationError::UnknownEvent {
            event_name: "nonexistent:event".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Unknown invalidation event"));
        assert!(msg.contains("nonexistent:event"));
    }

    #[test]
    fn test_invalidation_error_display_scheduling_failed() {
        let err = InvalidationError::SchedulingFailed {
            event: InvalidationEvent::JobDeleted,
            reason: "coordinator shut down".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("job:deleted"));
        assert!(msg.contains("coordinator shut down"));
    }

    #[test]
    fn test_config_error_display_missing_rule() {
        let err = ConfigError::MissingRule {
            event: InvalidationEvent::QueueCleared,
        };
        assert!(format!("{}", err).contains("queue:cleared"));
    }

    #[test]
    fn test_clipper_error_from_variants() {
        let store = ClipperError::from(StoreError::LockPoisoned);
        assert!(matches!(store, ClipperError::Store(_)));

        let invalidation = ClipperError::from(InvalidationError::UnknownEvent {
            event_name: "x".to_string(),
        });
        assert!(matches!(invalidation, ClipperError::Invalidation(_)));

        let config = ClipperError::from(ConfigError::ParseFailed {
            reason: "bad toml".to_string(),
        });
        assert!(matches!(config, ClipperError::Config(_)));
    }
}
