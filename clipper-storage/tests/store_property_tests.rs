//! Property-Based Tests for Cache Store Deletes
//!
//! For any set of cached keys and any batch of keys to delete, a batched
//! delete SHALL report exactly the number of requested keys that were cached,
//! and SHALL leave every other cached key in place.

use clipper_storage::{CacheStore, InMemoryCacheStore};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}:[a-z]{1,6}"
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build runtime")
}

proptest! {
    #[test]
    fn prop_delete_counts_intersection(
        cached in prop::collection::btree_set(key_strategy(), 0..12),
        requested in prop::collection::btree_set(key_strategy(), 0..12),
    ) {
        let rt = runtime();
        let store: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::with_keys(cached.clone()));
        let batch: Vec<String> = requested.iter().cloned().collect();

        let deleted = rt.block_on(store.delete(&batch)).unwrap();
        let expected = cached.intersection(&requested).count() as u64;
        prop_assert_eq!(deleted, expected);

        let survivors: BTreeSet<&String> = cached.difference(&requested).collect();
        for key in &cached {
            let still_there = rt.block_on(store.exists(key)).unwrap();
            prop_assert_eq!(still_there, survivors.contains(key));
        }
    }

    #[test]
    fn prop_delete_is_idempotent(
        cached in prop::collection::btree_set(key_strategy(), 1..8),
    ) {
        let rt = runtime();
        let store = InMemoryCacheStore::with_keys(cached.clone());
        let batch: Vec<String> = cached.iter().cloned().collect();

        prop_assert_eq!(rt.block_on(store.delete(&batch)).unwrap(), cached.len() as u64);
        prop_assert_eq!(rt.block_on(store.delete(&batch)).unwrap(), 0);
        prop_assert!(store.is_empty());
    }
}
