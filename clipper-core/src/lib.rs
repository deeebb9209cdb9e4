//! Clipper Core - Invalidation Types
//!
//! Pure data structures shared by the invalidation engine: the closed set of
//! invalidation events, their rules, configuration and the error taxonomy.
//! This crate contains no I/O beyond reading the optional rules file.

use std::collections::BTreeSet;

pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod rule;

pub use config::InvalidationConfig;
pub use error::{ClipperError, ClipperResult, ConfigError, InvalidationError, StoreError};
pub use event::{InvalidationEvent, Priority};
pub use rule::{InvalidationRule, RuleOverride, RuleOverrides, RuleTable};

/// Ordered set of cache keys. Ordering keeps batches and logs deterministic.
pub type CacheKeySet = BTreeSet<String>;
