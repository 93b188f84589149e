//! Query fingerprints
//!
//! A fingerprint is the XXH3-128 hash of the exact query text. No semantic
//! normalization is applied: two queries that differ only in whitespace or
//! literal formatting get different fingerprints and separate cache entries.
//! The hash is stable across processes, so every node sharing a store
//! addresses the same entry for the same query.

use listcache_core::TenantId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 128-bit hash of a normalized query string
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    /// Fingerprint a query string
    pub fn of(query: &str) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(query.as_bytes());
        Self(hash.to_le_bytes())
    }

    /// Store key of the identifier list for this fingerprint
    pub fn ids_key(&self, tenant: TenantId) -> String {
        format!("{}:{}", tenant, self)
    }

    /// Store key of the stored found-count for this fingerprint
    pub fn found_key(&self, tenant: TenantId) -> String {
        format!("{}:found_{}", tenant, self)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}
