//! In-memory grouped cache store
//!
//! LRU-bounded, optionally TTL-expiring implementation of [`CacheStore`].
//! Entries of abandoned cache groups are never deleted explicitly; they age
//! out through LRU eviction or TTL like in any object cache.

use crate::config::MemoryStoreConfig;
use crate::store::{CacheStore, StoreError, StoreResult};
use ahash::RandomState;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Composite address of an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StoreKey {
    group: String,
    key: String,
}

impl StoreKey {
    fn new(key: &str, group: &str) -> Self {
        Self {
            group: group.to_string(),
            key: key.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    created_at: Instant,
}

impl StoredEntry {
    fn new(value: Value) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.created_at.elapsed() > ttl)
    }
}

/// Thread-safe in-memory cache store
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<StoreKey, StoredEntry, RandomState>>,
    config: MemoryStoreConfig,
    available: AtomicBool,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl MemoryCacheStore {
    /// Create a new store with the given configuration
    pub fn new(config: MemoryStoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::with_hasher(capacity, RandomState::new())),
            config,
            available: AtomicBool::new(true),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Create a store with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MemoryStoreConfig::default())
    }

    /// Simulate an outage: while unavailable every operation fails
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store offline".to_string()))
        }
    }

    /// Whether an unexpired entry exists, without touching LRU order
    pub fn contains(&self, key: &str, group: &str) -> bool {
        let entries = self.entries.lock();
        entries
            .peek(&StoreKey::new(key, group))
            .is_some_and(|entry| !entry.is_expired(self.config.ttl()))
    }

    /// Number of entries across all groups
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of entries in one group
    pub fn group_len(&self, group: &str) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(key, _)| key.group == group)
            .count()
    }

    /// Entries dropped to respect capacity
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Entries dropped because their TTL elapsed
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Expire entries that have exceeded TTL
    pub fn expire_stale(&self) -> usize {
        let ttl = self.config.ttl();
        let mut entries = self.entries.lock();

        let expired_keys: Vec<StoreKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            entries.pop(key);
        }
        self.expirations
            .fetch_add(expired_keys.len() as u64, Ordering::Relaxed);
        expired_keys.len()
    }

    /// Get the store configuration
    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    fn insert(
        &self,
        entries: &mut LruCache<StoreKey, StoredEntry, RandomState>,
        key: StoreKey,
        entry: StoredEntry,
    ) {
        if let Some((evicted_key, _)) = entries.push(key.clone(), entry) {
            // push returns the replaced entry for an existing key too
            if evicted_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str, group: &str) -> StoreResult<Option<Value>> {
        self.ensure_available()?;

        let store_key = StoreKey::new(key, group);
        let mut entries = self.entries.lock();

        let expired = match entries.get(&store_key) {
            Some(entry) if !entry.is_expired(self.config.ttl()) => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&store_key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }
        Ok(None)
    }

    fn set(&self, key: &str, group: &str, value: Value) -> StoreResult<()> {
        self.ensure_available()?;

        let mut entries = self.entries.lock();
        self.insert(&mut entries, StoreKey::new(key, group), StoredEntry::new(value));
        Ok(())
    }

    fn increment(&self, key: &str, group: &str, amount: u64) -> StoreResult<u64> {
        self.ensure_available()?;

        let store_key = StoreKey::new(key, group);
        let mut entries = self.entries.lock();

        let entry = match entries.get_mut(&store_key) {
            Some(entry) if !entry.is_expired(self.config.ttl()) => entry,
            _ => {
                return Err(StoreError::NotFound {
                    key: key.to_string(),
                    group: group.to_string(),
                })
            }
        };

        let current = entry.value.as_u64().ok_or_else(|| StoreError::NotNumeric {
            key: key.to_string(),
            group: group.to_string(),
        })?;

        let next = current.saturating_add(amount);
        entry.value = Value::from(next);
        Ok(next)
    }
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore")
            .field("max_entries", &self.config.max_entries)
            .field("ttl", &self.config.ttl())
            .field("current_entries", &self.len())
            .field("available", &self.available.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_get() {
        let store = MemoryCacheStore::with_defaults();
        store.set("abc", "group_1", json!([1, 2, 3])).unwrap();

        assert_eq!(store.get("abc", "group_1").unwrap(), Some(json!([1, 2, 3])));
        assert_eq!(store.get("abc", "group_2").unwrap(), None);
        assert_eq!(store.get("missing", "group_1").unwrap(), None);
    }

    #[test]
    fn test_groups_are_separate_namespaces() {
        let store = MemoryCacheStore::with_defaults();
        store.set("k", "a", json!(1)).unwrap();
        store.set("k", "b", json!(2)).unwrap();

        assert_eq!(store.get("k", "a").unwrap(), Some(json!(1)));
        assert_eq!(store.get("k", "b").unwrap(), Some(json!(2)));
        assert_eq!(store.group_len("a"), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_increment() {
        let store = MemoryCacheStore::with_defaults();
        store.set("counter", "incr", json!(41)).unwrap();

        assert_eq!(store.increment("counter", "incr", 1).unwrap(), 42);
        assert_eq!(store.get("counter", "incr").unwrap(), Some(json!(42)));
    }

    #[test]
    fn test_increment_missing_key() {
        let store = MemoryCacheStore::with_defaults();
        let err = store.increment("counter", "incr", 1).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_increment_non_numeric() {
        let store = MemoryCacheStore::with_defaults();
        store.set("counter", "incr", json!("eleven")).unwrap();
        let err = store.increment("counter", "incr", 1).unwrap_err();
        assert!(matches!(err, StoreError::NotNumeric { .. }));
    }

    #[test]
    fn test_unavailable() {
        let store = MemoryCacheStore::with_defaults();
        store.set("k", "g", json!(1)).unwrap();
        store.set_available(false);

        assert!(matches!(store.get("k", "g"), Err(StoreError::Unavailable(_))));
        assert!(store.set("k", "g", json!(2)).is_err());
        assert!(store.increment("k", "g", 1).is_err());

        store.set_available(true);
        assert_eq!(store.get("k", "g").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_lru_eviction() {
        let store = MemoryCacheStore::new(MemoryStoreConfig::default().with_max_entries(3));

        for i in 0..4 {
            store.set(&format!("k{}", i), "g", json!(i)).unwrap();
        }

        assert_eq!(store.len(), 3);
        assert_eq!(store.evictions(), 1);
        assert!(!store.contains("k0", "g"));
        assert!(store.contains("k3", "g"));
    }

    #[test]
    fn test_overwrite_is_not_eviction() {
        let store = MemoryCacheStore::new(MemoryStoreConfig::default().with_max_entries(2));
        store.set("k", "g", json!(1)).unwrap();
        store.set("k", "g", json!(2)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.evictions(), 0);
        assert_eq!(store.get("k", "g").unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_ttl_expiration() {
        let store = MemoryCacheStore::new(MemoryStoreConfig::new(100, 1));
        store.set("k", "g", json!(1)).unwrap();
        assert!(store.get("k", "g").unwrap().is_some());

        thread::sleep(Duration::from_millis(1100));

        assert_eq!(store.get("k", "g").unwrap(), None);
        assert_eq!(store.expirations(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_expire_stale() {
        let store = MemoryCacheStore::new(MemoryStoreConfig::new(100, 1));
        for i in 0..5 {
            store.set(&format!("k{}", i), "g", json!(i)).unwrap();
        }

        thread::sleep(Duration::from_millis(1100));

        assert_eq!(store.expire_stale(), 5);
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_increments() {
        let store = Arc::new(MemoryCacheStore::with_defaults());
        store.set("counter", "incr", json!(0)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.increment("counter", "incr", 1).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get("counter", "incr").unwrap(), Some(json!(800)));
    }
}
