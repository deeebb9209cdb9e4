//! In-process cache store.
//!
//! Used when no Redis URL is configured and as the backing store in tests.
//! Entries may carry a TTL; expired entries behave as absent.

use async_trait::async_trait;
use clipper_core::{ClipperResult, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::CacheStore;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-memory cache store.
#[derive(Debug)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    available: AtomicBool,
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `keys`, each holding a placeholder value.
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.write() {
            for key in keys {
                entries.insert(
                    key.into(),
                    StoredValue {
                        value: "cached".to_string(),
                        expires_at: None,
                    },
                );
            }
        }
        store
    }

    /// Simulate the store going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|v| v.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> ClipperResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            }
            .into())
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn delete(&self, keys: &[String]) -> ClipperResult<u64> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let deleted = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|value| value.is_live(now))
            .count();
        Ok(deleted as u64)
    }

    async fn exists(&self, key: &str) -> ClipperResult<bool> {
        self.check_available()?;
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries
            .get(key)
            .is_some_and(|value| value.is_live(Instant::now())))
    }

    async fn ping(&self) -> bool {
        self.is_available()
    }

    async fn get(&self, key: &str) -> ClipperResult<Option<String>> {
        self.check_available()?;
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|value| value.is_live(now))
            .map(|value| value.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> ClipperResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
