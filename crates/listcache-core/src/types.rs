use serde::{Deserialize, Serialize};
use std::fmt;

/// Lightweight reference to a domain object. Cached in place of the object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the tenant (site, blog, database) whose data a cache context serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u64);

impl Default for TenantId {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row-limiting clause (`LIMIT offset, count`) of a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLimit {
    pub offset: u64,
    pub count: u64,
}

impl RowLimit {
    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }

    /// Limit for a 1-based page of `per_page` rows
    pub fn page(page: u64, per_page: u64) -> Self {
        Self {
            offset: page.saturating_sub(1) * per_page,
            count: per_page,
        }
    }

    /// Render as a SQL clause
    pub fn to_sql(&self) -> String {
        format!("LIMIT {}, {}", self.offset, self.count)
    }
}

/// A list query split into its identifier query and its total-count companion.
///
/// The identifier query must select only identifiers; objects are hydrated
/// separately so that cached identifier lists can be rehydrated later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Normalized identifier query text, without the limit clause
    pub ids_sql: String,
    /// Query returning the total number of matching rows
    pub count_sql: String,
    /// Optional row-limiting clause
    pub limit: Option<RowLimit>,
    /// Caller opted out of total-count computation
    pub no_found_rows: bool,
}

impl ListQuery {
    pub fn new(ids_sql: impl Into<String>, count_sql: impl Into<String>) -> Self {
        Self {
            ids_sql: ids_sql.into(),
            count_sql: count_sql.into(),
            limit: None,
            no_found_rows: false,
        }
    }

    pub fn with_limit(mut self, limit: RowLimit) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_no_found_rows(mut self, no_found_rows: bool) -> Self {
        self.no_found_rows = no_found_rows;
        self
    }

    /// Full identifier query text including the limit clause.
    ///
    /// This is the text that gets fingerprinted, so two pages of the same
    /// listing are distinct cache entries.
    pub fn request_sql(&self) -> String {
        match &self.limit {
            Some(limit) => format!("{} {}", self.ids_sql, limit.to_sql()),
            None => self.ids_sql.clone(),
        }
    }
}
