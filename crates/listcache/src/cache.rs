//! The list cache context
//!
//! [`ListCache`] bundles the generation tracker, identifier cache, result
//! assembler and invalidation trigger of one tenant context, and exposes the
//! extension points a host query engine calls while processing a list query.

use crate::assembly::{hydrate_all, Hydrator, Identified, ResultAssembler};
use crate::config::{CacheConfig, MemoryStoreConfig};
use crate::generation::{CacheGroup, Generation, GenerationTracker};
use crate::invalidation::{
    CacheInvalidator, ChangeBatch, DataChange, InvalidationOutcome, InvalidationTrigger,
    SuppressionGuard,
};
use crate::lookup::IdentifierCache;
use crate::memory::MemoryCacheStore;
use crate::scope::{FoundCount, QueryScope};
use crate::stats::CacheStats;
use crate::store::CacheStore;
use listcache_core::{ObjectId, RowLimit, TenantId};
use std::sync::Arc;
use tracing::debug;

/// Caching and invalidation context for one tenant
pub struct ListCache {
    config: Arc<CacheConfig>,
    stats: Arc<CacheStats>,
    tracker: Arc<GenerationTracker>,
    ids: Arc<IdentifierCache>,
    assembler: ResultAssembler,
    trigger: InvalidationTrigger,
}

impl ListCache {
    /// Create a context for `tenant` backed by `store`
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig, tenant: TenantId) -> Self {
        let config = Arc::new(config);
        let stats = Arc::new(CacheStats::new());
        let tracker = Arc::new(GenerationTracker::new(
            Arc::clone(&store),
            Arc::clone(&config),
            Arc::clone(&stats),
            tenant,
        ));
        let ids = Arc::new(IdentifierCache::new(
            store,
            Arc::clone(&tracker),
            Arc::clone(&config),
            Arc::clone(&stats),
        ));
        let assembler = ResultAssembler::new(Arc::clone(&ids));
        let trigger =
            InvalidationTrigger::new(Arc::clone(&tracker), Arc::clone(&config), Arc::clone(&stats));

        Self {
            config,
            stats,
            tracker,
            ids,
            assembler,
            trigger,
        }
    }

    /// Create a context over a private in-memory store
    pub fn with_memory_store(config: CacheConfig, tenant: TenantId) -> Self {
        let store = Arc::new(MemoryCacheStore::new(MemoryStoreConfig::default()));
        Self::new(store, config, tenant)
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Get cache statistics
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }

    pub fn tenant(&self) -> TenantId {
        self.tracker.tenant()
    }

    pub fn generation(&self) -> Generation {
        self.tracker.generation()
    }

    /// Active cache group
    pub fn current_group(&self) -> CacheGroup {
        self.tracker.current_group()
    }

    /// Advance the generation directly, bypassing suppression
    pub fn advance_generation(&self) -> Generation {
        self.tracker.advance_generation()
    }

    /// Tenant context switch notification from the host
    pub fn switch_tenant(&self, new: TenantId, previous: Option<TenantId>) -> bool {
        self.tracker.switch_tenant(new, previous)
    }

    /// Start a new query
    pub fn begin_query(&self) -> QueryScope {
        QueryScope::new()
    }

    /// Look up the identifier list cached for `normalized_query`
    pub fn lookup(&self, scope: &mut QueryScope, normalized_query: &str) -> Option<Vec<ObjectId>> {
        if !self.config.enabled {
            return None;
        }
        self.ids.lookup(scope, normalized_query)
    }

    /// Store the identifiers of a freshly executed query
    pub fn prime_on_miss(&self, scope: &mut QueryScope, ids: &[ObjectId]) -> bool {
        if !self.config.enabled {
            return false;
        }
        self.ids.prime_on_miss(scope, ids)
    }

    /// Extension point: the host is building the row-limit clause.
    ///
    /// Without a limit, or with count tracking disabled, no total count is
    /// computed for this query.
    pub fn post_limits_request(
        &self,
        scope: &mut QueryScope,
        limit: Option<&RowLimit>,
        no_found_rows: bool,
    ) {
        scope.set_count_applicable(limit.is_some() && !no_found_rows);
    }

    /// Extension point: the host is about to run the identifier query.
    ///
    /// Returns the query to run, or `None` when the identifiers are cached and
    /// the query must be skipped.
    pub fn request_ids<'q>(&self, scope: &mut QueryScope, sql: &'q str) -> Option<&'q str> {
        match self.lookup(scope, sql) {
            Some(_) => None,
            None => Some(sql),
        }
    }

    /// Extension point: raw results are available.
    ///
    /// On a hit `fresh` is ignored and the cached identifiers are hydrated; on
    /// a miss `fresh` is primed and hydrated.
    pub fn assemble<H: Hydrator>(
        &self,
        scope: &mut QueryScope,
        fresh: Vec<ObjectId>,
        hydrator: &H,
    ) -> Vec<H::Object> {
        if !self.config.enabled {
            return hydrate_all(&fresh, hydrator);
        }
        self.assembler.assemble(scope, fresh, hydrator)
    }

    /// [`assemble`](Self::assemble) over raw rows
    pub fn assemble_rows<R: Identified, H: Hydrator>(
        &self,
        scope: &mut QueryScope,
        rows: &[R],
        hydrator: &H,
    ) -> Vec<H::Object> {
        if !self.config.enabled {
            let fresh: Vec<ObjectId> = rows.iter().map(Identified::object_id).collect();
            return hydrate_all(&fresh, hydrator);
        }
        self.assembler.assemble_rows(scope, rows, hydrator)
    }

    /// Whether the host has to run its count query
    pub fn should_compute_count(&self, scope: &QueryScope) -> bool {
        scope.should_compute_count()
    }

    /// Extension point: the host is about to run the count query.
    ///
    /// Returns `None` when the count is already known or not applicable.
    pub fn found_rows_query<'q>(&self, scope: &QueryScope, sql: &'q str) -> Option<&'q str> {
        match scope.found_count() {
            FoundCount::Cached(count) => {
                self.stats.record_count_short_circuit();
                debug!(count, "Count query short-circuited");
                None
            }
            FoundCount::NotApplicable => None,
            FoundCount::Pending | FoundCount::Uninitialized => Some(sql),
        }
    }

    /// Extension point: the count is known.
    ///
    /// Returns the cached count on a hit, otherwise `candidate`, which is
    /// also stored when the found-count source is `Stored`.
    pub fn found_rows(&self, scope: &QueryScope, candidate: u64) -> u64 {
        if self.config.enabled && scope.found_count() == FoundCount::Pending {
            self.ids.store_found_count(scope, candidate);
        }
        scope.resolve_count(candidate)
    }

    /// Count to report for this query
    pub fn resolve_count(&self, scope: &QueryScope, candidate: u64) -> u64 {
        scope.resolve_count(candidate)
    }

    /// Invalidation trigger of this context
    pub fn trigger(&self) -> &InvalidationTrigger {
        &self.trigger
    }

    /// Report a data change
    pub fn on_data_changed(&self, change: &DataChange) -> InvalidationOutcome {
        self.trigger.on_data_changed(change)
    }

    pub fn suppress(&self) {
        self.trigger.suppress();
    }

    pub fn unsuppress(&self) {
        self.trigger.unsuppress();
    }

    pub fn force_unsuppress(&self) {
        self.trigger.force_unsuppress();
    }

    /// Suppress invalidation until the guard is dropped
    pub fn suppression_guard(&self) -> SuppressionGuard<'_> {
        self.trigger.suppression_guard()
    }

    /// Bracket host count maintenance so it does not invalidate
    pub fn begin_count_maintenance(&self) {
        self.trigger.begin_count_maintenance();
    }

    pub fn end_count_maintenance(&self) {
        self.trigger.end_count_maintenance();
    }

    /// Coalesce change notifications until the batch is dropped
    pub fn batch(&self) -> ChangeBatch<'_> {
        self.trigger.batch()
    }
}

impl CacheInvalidator for ListCache {
    fn on_data_changed(&self, change: &DataChange) -> InvalidationOutcome {
        self.trigger.on_data_changed(change)
    }
}

impl std::fmt::Debug for ListCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListCache")
            .field("enabled", &self.config.enabled)
            .field("group_prefix", &self.config.group_prefix)
            .field("tracker", &self.tracker)
            .field("suppression_depth", &self.trigger.suppression_depth())
            .finish()
    }
}
