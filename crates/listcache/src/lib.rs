//! Identifier-list caching for list queries
//!
//! This crate caches the ordered identifiers returned by list queries and
//! rebuilds full results from them, skipping both the identifier query and
//! the total-count query on a hit.
//!
//! # Features
//!
//! - **Versioned groups**: entries live in `prefix + generation`; any data
//!   change advances the generation and orphans every older entry in O(1)
//! - **Tenant isolation**: generation and entry keys are tenant-qualified
//! - **Count short-circuit**: a hit serves the total count without a query
//! - **Suppression**: nestable scopes, guards and batches for bulk writes
//! - **Pluggable store**: any [`CacheStore`]; an LRU/TTL [`MemoryCacheStore`] is included
//!
//! # Example
//!
//! ```ignore
//! use listcache::{CacheConfig, ListCache};
//! use listcache_core::{ObjectId, RowLimit, TenantId};
//!
//! let cache = ListCache::with_memory_store(CacheConfig::default(), TenantId(1));
//! let mut scope = cache.begin_query();
//! cache.post_limits_request(&mut scope, Some(&RowLimit::new(0, 10)), false);
//!
//! let fresh = match cache.request_ids(&mut scope, sql) {
//!     Some(sql) => run_id_query(sql)?,
//!     None => Vec::new(),
//! };
//! let posts = cache.assemble(&mut scope, fresh, &load_post);
//! ```

pub mod assembly;
pub mod cache;
pub mod config;
pub mod fingerprint;
pub mod generation;
pub mod invalidation;
pub mod lookup;
pub mod memory;
pub mod scope;
pub mod stats;
pub mod store;

pub use assembly::{hydrate_all, Hydrator, Identified, ResultAssembler};
pub use cache::ListCache;
pub use config::{CacheConfig, FoundCountSource, MemoryStoreConfig, SuppressionMode};
pub use fingerprint::Fingerprint;
pub use generation::{CacheGroup, Generation, GenerationTracker};
pub use invalidation::{
    CacheInvalidator, ChangeBatch, ChangeKind, ChangeOrigin, DataChange, InvalidationOutcome,
    InvalidationTrigger, SuppressionGuard,
};
pub use lookup::IdentifierCache;
pub use memory::MemoryCacheStore;
pub use scope::{FoundCount, LookupAddress, LookupOutcome, QueryScope};
pub use stats::CacheStats;
pub use store::{CacheStore, StoreError, StoreResult};
