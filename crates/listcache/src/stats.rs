//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for cache behaviour
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Identifier-list lookups answered from cache
    hits: AtomicU64,
    /// Identifier-list lookups that fell through to the engine
    misses: AtomicU64,
    /// Identifier lists written after a miss
    primes: AtomicU64,
    /// Cached values with the wrong shape, treated as misses
    malformed: AtomicU64,
    /// Store operations that failed and were degraded
    store_errors: AtomicU64,
    /// Generation advances
    advances: AtomicU64,
    /// Generation wraparounds to 0
    resets: AtomicU64,
    /// Invalidations skipped while suppressed
    suppressed: AtomicU64,
    /// Invalidations skipped for preview/autosave changes
    exempt: AtomicU64,
    /// Count queries skipped because the count was cached
    count_short_circuits: AtomicU64,
}

impl CacheStats {
    /// Create new cache statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an identifier list written to the cache
    pub fn record_prime(&self) {
        self.primes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cached value with the wrong shape
    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed store operation
    pub fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a generation advance
    pub fn record_advance(&self) {
        self.advances.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a generation wraparound
    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invalidation skipped while suppressed
    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invalidation skipped for an exempt change
    pub fn record_exempt(&self) {
        self.exempt.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped count query
    pub fn record_count_short_circuit(&self) {
        self.count_short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    /// Get number of cache hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get number of cache misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get number of primed identifier lists
    pub fn primes(&self) -> u64 {
        self.primes.load(Ordering::Relaxed)
    }

    /// Get number of malformed cached values
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Get number of failed store operations
    pub fn store_errors(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    /// Get number of generation advances
    pub fn advances(&self) -> u64 {
        self.advances.load(Ordering::Relaxed)
    }

    /// Get number of generation wraparounds
    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::Relaxed)
    }

    /// Get number of suppressed invalidations
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Get number of exempt invalidations
    pub fn exempt(&self) -> u64 {
        self.exempt.load(Ordering::Relaxed)
    }

    /// Get number of skipped count queries
    pub fn count_short_circuits(&self) -> u64 {
        self.count_short_circuits.load(Ordering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get total lookups (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Reset all statistics
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn counters(&self) -> [&AtomicU64; 10] {
        [
            &self.hits,
            &self.misses,
            &self.primes,
            &self.malformed,
            &self.store_errors,
            &self.advances,
            &self.resets,
            &self.suppressed,
            &self.exempt,
            &self.count_short_circuits,
        ]
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            primes: AtomicU64::new(self.primes()),
            malformed: AtomicU64::new(self.malformed()),
            store_errors: AtomicU64::new(self.store_errors()),
            advances: AtomicU64::new(self.advances()),
            resets: AtomicU64::new(self.resets()),
            suppressed: AtomicU64::new(self.suppressed()),
            exempt: AtomicU64::new(self.exempt()),
            count_short_circuits: AtomicU64::new(self.count_short_circuits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_recording() {
        let stats = CacheStats::new();

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_advance();

        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.advances(), 1);
        assert_eq!(stats.total_requests(), 3);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();

        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_suppressed();
        stats.record_count_short_circuit();

        stats.reset();

        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.suppressed(), 0);
        assert_eq!(stats.count_short_circuits(), 0);
    }

    #[test]
    fn test_clone() {
        let stats = CacheStats::new();
        stats.record_hit();
        stats.record_prime();
        stats.record_exempt();

        let cloned = stats.clone();
        assert_eq!(cloned.hits(), 1);
        assert_eq!(cloned.primes(), 1);
        assert_eq!(cloned.exempt(), 1);
    }
}
