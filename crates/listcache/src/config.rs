//! Cache configuration options

use listcache_core::{ListCacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_GROUP_PREFIX: &str = "advanced_post_cache_";
const DEFAULT_GENERATION_KEY: &str = "advanced_post_cache";
const DEFAULT_INCREMENTOR_GROUP: &str = "cache_incrementors";
const DEFAULT_MAX_GENERATION_LEN: usize = 10;

/// How nested suppression scopes combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionMode {
    /// Each suppress adds a level; invalidation resumes when all levels are released
    #[default]
    Depth,
    /// Single boolean; any unsuppress fully re-enables invalidation
    Flag,
}

/// Where a cache hit takes its total-count value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoundCountSource {
    /// Length of the cached identifier list
    #[default]
    IdentifierLength,
    /// Count computed on the miss path, stored next to the identifier list.
    /// Falls back to the identifier list length when nothing was stored.
    Stored,
}

/// Configuration for the list cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Prefix of the versioned cache group (`prefix + generation`)
    pub group_prefix: String,
    /// Store key holding the generation counter
    pub generation_key: String,
    /// Unversioned group holding the generation counter
    pub incrementor_group: String,
    /// Maximum decimal length of the generation before it wraps to 0
    pub max_generation_len: usize,
    /// Nesting behaviour of invalidation suppression
    pub suppression_mode: SuppressionMode,
    /// Source of the total count served on a cache hit
    pub found_count_source: FoundCountSource,
    /// Milliseconds a loaded generation is trusted before it is re-read from
    /// the store. `None` reads it once per context; `Some(0)` on every use.
    pub generation_refresh_ms: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group_prefix: DEFAULT_GROUP_PREFIX.to_string(),
            generation_key: DEFAULT_GENERATION_KEY.to_string(),
            incrementor_group: DEFAULT_INCREMENTOR_GROUP.to_string(),
            max_generation_len: DEFAULT_MAX_GENERATION_LEN,
            suppression_mode: SuppressionMode::default(),
            found_count_source: FoundCountSource::default(),
            generation_refresh_ms: None,
        }
    }
}

impl CacheConfig {
    /// Create a disabled cache configuration
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: CacheConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can address a cache group
    pub fn validate(&self) -> Result<()> {
        if self.max_generation_len == 0 {
            return Err(ListCacheError::ConfigError(
                "max_generation_len must be at least 1".to_string(),
            ));
        }
        if self.generation_key.is_empty() {
            return Err(ListCacheError::ConfigError(
                "generation_key must not be empty".to_string(),
            ));
        }
        if self.incrementor_group.is_empty() {
            return Err(ListCacheError::ConfigError(
                "incrementor_group must not be empty".to_string(),
            ));
        }
        let collides = self
            .incrementor_group
            .strip_prefix(self.group_prefix.as_str())
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
        if collides {
            return Err(ListCacheError::ConfigError(format!(
                "incrementor_group '{}' collides with versioned group prefix '{}'",
                self.incrementor_group, self.group_prefix
            )));
        }
        Ok(())
    }

    /// Set the versioned group prefix
    pub fn with_group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_prefix = prefix.into();
        self
    }

    /// Set the maximum generation length
    pub fn with_max_generation_len(mut self, len: usize) -> Self {
        self.max_generation_len = len;
        self
    }

    /// Set the suppression mode
    pub fn with_suppression_mode(mut self, mode: SuppressionMode) -> Self {
        self.suppression_mode = mode;
        self
    }

    /// Set the found-count source
    pub fn with_found_count_source(mut self, source: FoundCountSource) -> Self {
        self.found_count_source = source;
        self
    }

    /// Re-read the generation from the store once it is older than `interval`
    pub fn with_generation_refresh(mut self, interval: Duration) -> Self {
        self.generation_refresh_ms = Some(interval.as_millis() as u64);
        self
    }

    /// Refresh interval of the in-memory generation
    pub fn generation_refresh(&self) -> Option<Duration> {
        self.generation_refresh_ms.map(Duration::from_millis)
    }

    /// Enable or disable the cache
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Configuration for [`MemoryCacheStore`](crate::memory::MemoryCacheStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    /// Maximum number of entries across all groups
    pub max_entries: usize,
    /// Time-to-live in seconds; 0 keeps entries until evicted
    pub ttl_secs: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl_secs: 0,
        }
    }
}

impl MemoryStoreConfig {
    pub fn new(max_entries: usize, ttl_secs: u64) -> Self {
        Self {
            max_entries,
            ttl_secs,
        }
    }

    /// TTL as a duration, `None` when entries never expire
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    /// Set the maximum number of entries
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the TTL duration (whole seconds)
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }
}
