//! Identifier-list lookup and priming
//!
//! Identifier lists are stored as JSON arrays under
//! `(tenant:fingerprint, prefix + generation)`. A present entry, even an
//! empty array, means the query was already answered in this generation.
//! Any failure to read an entry is reported as a miss.

use crate::config::{CacheConfig, FoundCountSource};
use crate::fingerprint::Fingerprint;
use crate::generation::GenerationTracker;
use crate::scope::{LookupAddress, QueryScope};
use crate::stats::CacheStats;
use crate::store::CacheStore;
use listcache_core::ObjectId;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads and writes cached identifier lists for the active generation
pub struct IdentifierCache {
    store: Arc<dyn CacheStore>,
    tracker: Arc<GenerationTracker>,
    config: Arc<CacheConfig>,
    stats: Arc<CacheStats>,
}

impl IdentifierCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        tracker: Arc<GenerationTracker>,
        config: Arc<CacheConfig>,
        stats: Arc<CacheStats>,
    ) -> Self {
        Self {
            store,
            tracker,
            config,
            stats,
        }
    }

    /// Look up the identifier list cached for `normalized_query`.
    ///
    /// Records the fingerprint and group in `scope` whatever the outcome, so
    /// the miss path primes exactly the entry that was looked up.
    pub fn lookup(&self, scope: &mut QueryScope, normalized_query: &str) -> Option<Vec<ObjectId>> {
        let address = LookupAddress {
            tenant: self.tracker.tenant(),
            group: self.tracker.current_group(),
            fingerprint: Fingerprint::of(normalized_query),
        };
        let key = address.fingerprint.ids_key(address.tenant);

        let value = match self.store.get(&key, address.group.as_str()) {
            Ok(Some(value)) => value,
            Ok(None) => {
                self.stats.record_miss();
                scope.record_miss(Some(address));
                return None;
            }
            Err(err) => {
                self.stats.record_store_error();
                self.stats.record_miss();
                warn!(
                    key = %key,
                    group = %address.group,
                    error = %err,
                    "Identifier lookup failed, treating as miss"
                );
                scope.record_miss(Some(address));
                return None;
            }
        };

        match serde_json::from_value::<Vec<ObjectId>>(value) {
            Ok(ids) => {
                let stored_count = match self.config.found_count_source {
                    FoundCountSource::Stored => self.read_found_count(&address),
                    FoundCountSource::IdentifierLength => None,
                };
                self.stats.record_hit();
                debug!(
                    key = %key,
                    group = %address.group,
                    ids = ids.len(),
                    "Identifier list cache hit"
                );
                scope.record_hit(address, ids.clone(), stored_count);
                Some(ids)
            }
            Err(err) => {
                self.stats.record_malformed();
                self.stats.record_miss();
                warn!(
                    key = %key,
                    group = %address.group,
                    error = %err,
                    "Malformed identifier list, treating as miss"
                );
                scope.record_miss(Some(address));
                None
            }
        }
    }

    /// Store the identifiers of a freshly executed query at the address
    /// recorded by [`lookup`](Self::lookup). Returns whether an entry was written.
    ///
    /// No-op after a hit, without a prior lookup, or when the scope was
    /// already primed.
    pub fn prime_on_miss(&self, scope: &mut QueryScope, ids: &[ObjectId]) -> bool {
        if scope.is_hit() || scope.is_primed() {
            debug!("Prime skipped: scope is a hit or already primed");
            return false;
        }
        let Some(address) = scope.address().cloned() else {
            debug!("Prime skipped: no lookup recorded for this scope");
            return false;
        };
        scope.mark_primed();

        let key = address.fingerprint.ids_key(address.tenant);
        let value = Value::Array(ids.iter().map(|id| Value::from(id.get())).collect());

        match self.store.set(&key, address.group.as_str(), value) {
            Ok(()) => {
                self.stats.record_prime();
                debug!(
                    key = %key,
                    group = %address.group,
                    ids = ids.len(),
                    "Primed identifier list"
                );
                true
            }
            Err(err) => {
                self.stats.record_store_error();
                warn!(
                    key = %key,
                    group = %address.group,
                    error = %err,
                    "Failed to prime identifier list"
                );
                false
            }
        }
    }

    /// Store the total count computed on the miss path next to the
    /// identifier list. Only used with [`FoundCountSource::Stored`].
    pub fn store_found_count(&self, scope: &QueryScope, count: u64) -> bool {
        if self.config.found_count_source != FoundCountSource::Stored || scope.is_hit() {
            return false;
        }
        let Some(address) = scope.address() else {
            return false;
        };

        let key = address.fingerprint.found_key(address.tenant);
        match self.store.set(&key, address.group.as_str(), Value::from(count)) {
            Ok(()) => true,
            Err(err) => {
                self.stats.record_store_error();
                warn!(
                    key = %key,
                    group = %address.group,
                    error = %err,
                    "Failed to store found count"
                );
                false
            }
        }
    }

    fn read_found_count(&self, address: &LookupAddress) -> Option<u64> {
        let key = address.fingerprint.found_key(address.tenant);
        match self.store.get(&key, address.group.as_str()) {
            Ok(value) => value.and_then(|value| value.as_u64()),
            Err(err) => {
                self.stats.record_store_error();
                debug!(key = %key, error = %err, "Failed to read found count");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCacheStore;
    use crate::scope::FoundCount;
    use listcache_core::TenantId;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryCacheStore>,
        tracker: Arc<GenerationTracker>,
        stats: Arc<CacheStats>,
        cache: IdentifierCache,
    }

    fn fixture(config: CacheConfig) -> Fixture {
        let store = Arc::new(MemoryCacheStore::with_defaults());
        store
            .set("1:advanced_post_cache", "cache_incrementors", json!(1))
            .unwrap();
        let config = Arc::new(config);
        let stats = Arc::new(CacheStats::new());
        let tracker = Arc::new(GenerationTracker::new(
            store.clone(),
            Arc::clone(&config),
            Arc::clone(&stats),
            TenantId(1),
        ));
        let cache = IdentifierCache::new(
            store.clone(),
            Arc::clone(&tracker),
            config,
            Arc::clone(&stats),
        );
        Fixture {
            store,
            tracker,
            stats,
            cache,
        }
    }

    fn ids(raw: &[u64]) -> Vec<ObjectId> {
        raw.iter().copied().map(ObjectId).collect()
    }

    const QUERY: &str =
        "SELECT ID FROM posts WHERE post_type = 'post' ORDER BY post_date DESC LIMIT 0, 10";

    #[test]
    fn test_miss_then_hit_round_trip() {
        let f = fixture(CacheConfig::default());

        let mut first = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut first, QUERY), None);
        assert!(f.cache.prime_on_miss(&mut first, &ids(&[5, 2, 9])));

        let mut second = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut second, QUERY), Some(ids(&[5, 2, 9])));
        assert_eq!(f.stats.misses(), 1);
        assert_eq!(f.stats.hits(), 1);
        assert_eq!(f.stats.primes(), 1);
    }

    #[test]
    fn test_idempotent_hit() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        f.cache.prime_on_miss(&mut scope, &ids(&[3, 1, 4, 1, 5]));

        for _ in 0..5 {
            let mut scope = QueryScope::new();
            assert_eq!(f.cache.lookup(&mut scope, QUERY), Some(ids(&[3, 1, 4, 1, 5])));
        }
    }

    #[test]
    fn test_empty_list_is_a_hit() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        f.cache.prime_on_miss(&mut scope, &[]);

        let mut scope = QueryScope::new();
        scope.set_count_applicable(true);
        assert_eq!(f.cache.lookup(&mut scope, QUERY), Some(Vec::new()));
        assert_eq!(scope.found_count(), FoundCount::Cached(0));
    }

    #[test]
    fn test_distinct_queries_are_isolated() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, "SELECT ID FROM posts WHERE author = 1");
        f.cache.prime_on_miss(&mut scope, &ids(&[1]));

        let mut scope = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut scope, "SELECT ID FROM posts WHERE author = 2"), None);
        f.cache.prime_on_miss(&mut scope, &ids(&[2]));

        let mut scope = QueryScope::new();
        assert_eq!(
            f.cache.lookup(&mut scope, "SELECT ID FROM posts WHERE author = 1"),
            Some(ids(&[1]))
        );
    }

    #[test]
    fn test_advance_makes_entries_unreachable() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        f.cache.prime_on_miss(&mut scope, &ids(&[7]));
        let old_key = scope.address().unwrap().fingerprint.ids_key(TenantId(1));

        f.tracker.advance_generation();

        let mut scope = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut scope, QUERY), None);
        // the old entry is still physically present
        assert!(f.store.contains(&old_key, "advanced_post_cache_1"));
    }

    #[test]
    fn test_prime_after_hit_is_noop() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        f.cache.prime_on_miss(&mut scope, &ids(&[1, 2]));

        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        assert!(!f.cache.prime_on_miss(&mut scope, &ids(&[9, 9, 9])));

        let mut scope = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut scope, QUERY), Some(ids(&[1, 2])));
    }

    #[test]
    fn test_prime_without_lookup_is_noop() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        assert!(!f.cache.prime_on_miss(&mut scope, &ids(&[1])));
        assert!(f.store.group_len("advanced_post_cache_1") == 0);
    }

    #[test]
    fn test_prime_only_once_per_scope() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        assert!(f.cache.prime_on_miss(&mut scope, &ids(&[1])));
        assert!(!f.cache.prime_on_miss(&mut scope, &ids(&[2])));
    }

    #[test]
    fn test_malformed_value_is_a_miss_and_reprimed() {
        let f = fixture(CacheConfig::default());
        let key = Fingerprint::of(QUERY).ids_key(TenantId(1));
        f.store
            .set(&key, "advanced_post_cache_1", json!({"not": "a list"}))
            .unwrap();

        let mut scope = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut scope, QUERY), None);
        assert_eq!(f.stats.malformed(), 1);
        assert!(f.cache.prime_on_miss(&mut scope, &ids(&[4, 2])));

        let mut scope = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut scope, QUERY), Some(ids(&[4, 2])));
    }

    #[test]
    fn test_negative_ids_are_malformed() {
        let f = fixture(CacheConfig::default());
        let key = Fingerprint::of(QUERY).ids_key(TenantId(1));
        f.store
            .set(&key, "advanced_post_cache_1", json!([1, -2]))
            .unwrap();

        let mut scope = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut scope, QUERY), None);
        assert_eq!(f.stats.malformed(), 1);
    }

    #[test]
    fn test_store_outage_degrades_to_miss() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        f.cache.prime_on_miss(&mut scope, &ids(&[1]));

        f.store.set_available(false);
        let mut scope = QueryScope::new();
        assert_eq!(f.cache.lookup(&mut scope, QUERY), None);
        assert!(!f.cache.prime_on_miss(&mut scope, &ids(&[1])));
        assert!(f.stats.store_errors() >= 2);
    }

    #[test]
    fn test_stored_found_count() {
        let f = fixture(CacheConfig::default().with_found_count_source(FoundCountSource::Stored));

        let mut scope = QueryScope::new();
        scope.set_count_applicable(true);
        f.cache.lookup(&mut scope, QUERY);
        f.cache.prime_on_miss(&mut scope, &ids(&[1, 2, 3]));
        assert!(f.cache.store_found_count(&scope, 57));

        let mut scope = QueryScope::new();
        scope.set_count_applicable(true);
        f.cache.lookup(&mut scope, QUERY);
        assert_eq!(scope.found_count(), FoundCount::Cached(57));
    }

    #[test]
    fn test_found_count_not_stored_by_default() {
        let f = fixture(CacheConfig::default());
        let mut scope = QueryScope::new();
        f.cache.lookup(&mut scope, QUERY);
        assert!(!f.cache.store_found_count(&scope, 57));
    }
}
