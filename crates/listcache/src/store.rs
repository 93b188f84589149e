//! Cache store collaborator
//!
//! The engine never owns cached data. It addresses entries in an external
//! key/value store by `(key, group)` and relies on the store for atomic
//! increments. Values travel as JSON so any backend that can hold a string
//! can serve as a store.

use listcache_core::ListCacheError;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Failures reported by a [`CacheStore`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Increment of a key that does not exist
    #[error("Key not found: {group}/{key}")]
    NotFound { key: String, group: String },

    /// Increment of a value that is not an unsigned integer
    #[error("Value is not numeric: {group}/{key}")]
    NotNumeric { key: String, group: String },
}

impl From<StoreError> for ListCacheError {
    fn from(err: StoreError) -> Self {
        ListCacheError::StoreError(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Grouped key/value store with atomic increment
pub trait CacheStore: Send + Sync {
    /// Read a value. `Ok(None)` when absent or expired.
    fn get(&self, key: &str, group: &str) -> StoreResult<Option<Value>>;

    /// Write a value, replacing any previous one (last writer wins)
    fn set(&self, key: &str, group: &str, value: Value) -> StoreResult<()>;

    /// Atomically add `amount` to an existing unsigned integer value and
    /// return the new value
    fn increment(&self, key: &str, group: &str, amount: u64) -> StoreResult<u64>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, key: &str, group: &str) -> StoreResult<Option<Value>> {
        (**self).get(key, group)
    }

    fn set(&self, key: &str, group: &str, value: Value) -> StoreResult<()> {
        (**self).set(key, group, value)
    }

    fn increment(&self, key: &str, group: &str, amount: u64) -> StoreResult<u64> {
        (**self).increment(key, group, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            key: "advanced_post_cache".to_string(),
            group: "cache_incrementors".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Key not found: cache_incrementors/advanced_post_cache"
        );
    }

    #[test]
    fn test_into_list_cache_error() {
        let err: ListCacheError = StoreError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(
            err,
            ListCacheError::StoreError(msg) if msg.contains("connection refused")
        ));
    }
}
