//! Cache generation tracking
//!
//! Every cached entry lives in a group named `prefix + generation`. Advancing
//! the generation renames the addressable namespace, which makes everything
//! cached under the previous generation unreachable in O(1) without touching
//! the entries themselves. The counter is persisted in the store, outside any
//! versioned group, so every process sharing the store agrees on it.

use crate::config::CacheConfig;
use crate::stats::CacheStats;
use crate::store::CacheStore;
use listcache_core::TenantId;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Version tag of a cache namespace
pub type Generation = u64;

/// Addressable namespace derived from prefix + generation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheGroup(String);

impl CacheGroup {
    pub fn new(prefix: &str, generation: Generation) -> Self {
        Self(format!("{}{}", prefix, generation))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Loaded {
    generation: Generation,
    at: Instant,
}

#[derive(Debug)]
struct TrackerState {
    tenant: TenantId,
    loaded: Option<Loaded>,
}

/// Owns the generation counter of one tenant context
pub struct GenerationTracker {
    store: Arc<dyn CacheStore>,
    config: Arc<CacheConfig>,
    stats: Arc<CacheStats>,
    state: RwLock<TrackerState>,
}

impl GenerationTracker {
    /// Create a tracker for `tenant`. The generation is read lazily and, with
    /// `generation_refresh_ms` configured, re-read once it gets old. Without a
    /// refresh interval only this context's own advances are observed.
    pub fn new(
        store: Arc<dyn CacheStore>,
        config: Arc<CacheConfig>,
        stats: Arc<CacheStats>,
        tenant: TenantId,
    ) -> Self {
        Self {
            store,
            config,
            stats,
            state: RwLock::new(TrackerState {
                tenant,
                loaded: None,
            }),
        }
    }

    /// Tenant this tracker currently serves
    pub fn tenant(&self) -> TenantId {
        self.state.read().tenant
    }

    /// Current generation, loading it from the store on first use
    pub fn generation(&self) -> Generation {
        let (tenant, loaded) = {
            let state = self.state.read();
            (state.tenant, state.loaded)
        };

        if let Some(loaded) = loaded {
            let fresh = self
                .config
                .generation_refresh()
                .map_or(true, |interval| loaded.at.elapsed() < interval);
            if fresh {
                return loaded.generation;
            }
        }

        let generation = self.load(tenant);

        let mut state = self.state.write();
        if state.tenant != tenant {
            // Tenant switched while loading; the new tenant loads on its own.
            return generation;
        }
        state.loaded = Some(Loaded {
            generation,
            at: Instant::now(),
        });
        generation
    }

    /// Active cache group: prefix + current generation
    pub fn current_group(&self) -> CacheGroup {
        CacheGroup::new(&self.config.group_prefix, self.generation())
    }

    /// Advance the generation, invalidating everything cached under the
    /// previous one. Wraps to 0 when the new value is longer than
    /// `max_generation_len` digits.
    pub fn advance_generation(&self) -> Generation {
        let tenant = self.tenant();
        let key = self.generation_key(tenant);
        let group = self.config.incrementor_group.as_str();
        let current = self.generation();

        let next = match self.store.increment(&key, group, 1) {
            Ok(next) if next > current => next,
            Ok(stored) => {
                // The stored counter lags behind a fallback taken during an outage.
                let ahead = current.saturating_add(1);
                debug!(
                    tenant = %tenant,
                    stored,
                    generation = ahead,
                    "Stored generation behind, moving past it"
                );
                self.write_generation(&key, ahead);
                ahead
            }
            Err(err) => {
                self.stats.record_store_error();
                let fallback = self.fallback_generation(current);
                warn!(
                    tenant = %tenant,
                    error = %err,
                    fallback,
                    "Generation increment failed, moving to a fresh generation"
                );
                self.write_generation(&key, fallback);
                fallback
            }
        };

        let next = if self.exceeds_bound(next) {
            info!(tenant = %tenant, generation = next, "Generation wrapped to 0");
            self.write_generation(&key, 0);
            self.stats.record_reset();
            0
        } else {
            next
        };

        {
            let mut state = self.state.write();
            if state.tenant == tenant {
                state.loaded = Some(Loaded {
                    generation: next,
                    at: Instant::now(),
                });
            }
        }

        self.stats.record_advance();
        debug!(tenant = %tenant, generation = next, "Cache generation advanced");
        next
    }

    /// React to a tenant context switch. Re-reads the generation of `new`
    /// unless the switch is a no-op. Returns whether the context changed.
    pub fn switch_tenant(&self, new: TenantId, previous: Option<TenantId>) -> bool {
        if previous == Some(new) {
            return false;
        }

        {
            let mut state = self.state.write();
            state.tenant = new;
            state.loaded = None;
        }

        let generation = self.generation();
        debug!(tenant = %new, generation, "Switched cache tenant");
        true
    }

    /// Next generation when the store cannot increment. Jumps to the current
    /// time so other processes are unlikely to reuse it, unless that would
    /// exceed `max_generation_len` and wrap back onto groups of this cycle.
    fn fallback_generation(&self, current: Generation) -> Generation {
        let next = current.saturating_add(1);
        let seeded = next.max(unix_now());
        if self.exceeds_bound(seeded) {
            next
        } else {
            seeded
        }
    }

    fn exceeds_bound(&self, generation: Generation) -> bool {
        generation.to_string().len() > self.config.max_generation_len
    }

    fn generation_key(&self, tenant: TenantId) -> String {
        format!("{}:{}", tenant, self.config.generation_key)
    }

    fn load(&self, tenant: TenantId) -> Generation {
        let key = self.generation_key(tenant);
        let group = self.config.incrementor_group.as_str();

        match self.store.get(&key, group) {
            Ok(Some(value)) => {
                if let Some(generation) = value.as_u64() {
                    return generation;
                }
                warn!(
                    tenant = %tenant,
                    value = %value,
                    "Stored generation is not numeric, reseeding"
                );
            }
            Ok(None) => {}
            Err(err) => {
                self.stats.record_store_error();
                warn!(
                    tenant = %tenant,
                    error = %err,
                    "Failed to read generation, using current time"
                );
                return unix_now();
            }
        }

        let seeded = unix_now();
        self.write_generation(&key, seeded);
        debug!(tenant = %tenant, generation = seeded, "Seeded cache generation");
        seeded
    }

    fn write_generation(&self, key: &str, generation: Generation) {
        if let Err(err) = self
            .store
            .set(key, &self.config.incrementor_group, Value::from(generation))
        {
            self.stats.record_store_error();
            warn!(error = %err, generation, "Failed to persist cache generation");
        }
    }
}

impl fmt::Debug for GenerationTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("GenerationTracker")
            .field("tenant", &state.tenant)
            .field("generation", &state.loaded.map(|l| l.generation))
            .field("refresh", &self.config.generation_refresh())
            .finish()
    }
}

fn unix_now() -> Generation {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
