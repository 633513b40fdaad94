// src/session/cache.rs

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// One memoized result and when it was fetched.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: Arc<V>,
    pub fetched_at: DateTime<Utc>,
}

/// Session-scoped fetch memoization.
///
/// One entry per configuration key, returned untouched on every later call,
/// invalidated only by `invalidate`/`clear` (the manual refresh action).
/// The mutex makes the at-most-one-fetch guarantee hold even if a session
/// is ever shared.
pub struct FetchCache<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K: Eq + Hash + Clone, V> FetchCache<K, V> {
    pub fn new() -> Self {
        FetchCache { entries: Mutex::new(HashMap::new()) }
    }

    /// Return the cached value for `key`, running `fetch` only if the key
    /// has never been fetched (or was invalidated). The lock is held across
    /// the fetch so a key is never fetched twice.
    pub fn get_or_fetch(&self, key: &K, fetch: impl FnOnce() -> V) -> Arc<V> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(key) {
            return entry.value.clone();
        }
        let value = Arc::new(fetch());
        entries.insert(
            key.clone(),
            CacheEntry { value: value.clone(), fetched_at: Utc::now() },
        );
        value
    }

    /// When `key` was fetched, if it is currently cached.
    pub fn fetched_at(&self, key: &K) -> Option<DateTime<Utc>> {
        self.entries.lock().unwrap().get(key).map(|e| e.fetched_at)
    }

    /// Drop one entry; the next `get_or_fetch` for it fetches again.
    pub fn invalidate(&self, key: &K) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl<K: Eq + Hash + Clone, V> Default for FetchCache<K, V> {
    fn default() -> Self {
        FetchCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fetch_runs_at_most_once_per_key() {
        let cache: FetchCache<&str, String> = FetchCache::new();
        let calls = AtomicUsize::new(0);

        let first = cache.get_or_fetch(&"stats", || {
            calls.fetch_add(1, Ordering::SeqCst);
            "table".to_string()
        });
        let second = cache.get_or_fetch(&"stats", || {
            calls.fetch_add(1, Ordering::SeqCst);
            "table".to_string()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Bit-identical: the same allocation comes back, not an equal copy.
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn distinct_keys_fetch_independently() {
        let cache: FetchCache<u32, u32> = FetchCache::new();
        let a = cache.get_or_fetch(&1, || 10);
        let b = cache.get_or_fetch(&2, || 20);
        assert_eq!((*a, *b), (10, 20));
    }

    #[test]
    fn invalidate_forces_a_refetch() {
        let cache: FetchCache<&str, u32> = FetchCache::new();
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        };

        cache.get_or_fetch(&"k", fetch);
        assert!(cache.fetched_at(&"k").is_some());
        assert!(cache.invalidate(&"k"));
        assert!(cache.fetched_at(&"k").is_none());
        cache.get_or_fetch(&"k", fetch);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.invalidate(&"missing"));
    }

    #[test]
    fn clear_empties_every_key() {
        let cache: FetchCache<u32, u32> = FetchCache::new();
        cache.get_or_fetch(&1, || 1);
        cache.get_or_fetch(&2, || 2);
        cache.clear();
        assert!(cache.fetched_at(&1).is_none());
        assert!(cache.fetched_at(&2).is_none());
    }
}
