//! Per-query state
//!
//! A [`QueryScope`] is created when the host starts building a list query and
//! is passed to every extension point of that query. It records what the
//! identifier lookup found and whether the query has a row limit, and derives
//! the found-count state from those two facts. Nothing about one query leaks
//! into another through the shared cache context.

use crate::fingerprint::Fingerprint;
use crate::generation::CacheGroup;
use listcache_core::{ObjectId, TenantId};

/// Found-count state of one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundCount {
    /// Neither the limit clause nor the lookup outcome is known yet
    Uninitialized,
    /// No limit clause, or count tracking disabled: no count is computed
    NotApplicable,
    /// The identifier list was a miss; the real count query must run
    Pending,
    /// The identifier list was a hit; the count is served from cache
    Cached(u64),
}

/// Outcome of the identifier-list lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    NotLooked,
    Hit(Vec<ObjectId>),
    Miss,
}

/// Where a lookup was made, so later stages reuse the same address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupAddress {
    pub tenant: TenantId,
    pub group: CacheGroup,
    pub fingerprint: Fingerprint,
}

/// State threaded through the extension points of a single query
#[derive(Debug, Clone)]
pub struct QueryScope {
    count_applicable: Option<bool>,
    outcome: LookupOutcome,
    address: Option<LookupAddress>,
    stored_count: Option<u64>,
    primed: bool,
}

impl Default for QueryScope {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryScope {
    pub fn new() -> Self {
        Self {
            count_applicable: None,
            outcome: LookupOutcome::NotLooked,
            address: None,
            stored_count: None,
            primed: false,
        }
    }

    /// Record whether the query has a row limit that makes a total count meaningful
    pub fn set_count_applicable(&mut self, applicable: bool) {
        self.count_applicable = Some(applicable);
    }

    /// Current found-count state.
    ///
    /// Derived from the limit decision and the lookup outcome, so it does not
    /// depend on the order in which the host reported them.
    pub fn found_count(&self) -> FoundCount {
        if self.count_applicable == Some(false) {
            return FoundCount::NotApplicable;
        }
        match &self.outcome {
            LookupOutcome::Hit(ids) => {
                FoundCount::Cached(self.stored_count.unwrap_or(ids.len() as u64))
            }
            LookupOutcome::Miss => FoundCount::Pending,
            LookupOutcome::NotLooked => FoundCount::Uninitialized,
        }
    }

    /// Whether the host must run its count query
    pub fn should_compute_count(&self) -> bool {
        matches!(
            self.found_count(),
            FoundCount::Pending | FoundCount::Uninitialized
        )
    }

    /// Count to report: the cached one on a hit, otherwise `candidate`
    pub fn resolve_count(&self, candidate: u64) -> u64 {
        match self.found_count() {
            FoundCount::Cached(count) => count,
            _ => candidate,
        }
    }

    pub fn outcome(&self) -> &LookupOutcome {
        &self.outcome
    }

    pub fn is_hit(&self) -> bool {
        matches!(self.outcome, LookupOutcome::Hit(_))
    }

    /// Cached identifiers when the lookup was a hit
    pub fn cached_ids(&self) -> Option<&[ObjectId]> {
        match &self.outcome {
            LookupOutcome::Hit(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn address(&self) -> Option<&LookupAddress> {
        self.address.as_ref()
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub(crate) fn record_hit(
        &mut self,
        address: LookupAddress,
        ids: Vec<ObjectId>,
        stored_count: Option<u64>,
    ) {
        self.address = Some(address);
        self.outcome = LookupOutcome::Hit(ids);
        self.stored_count = stored_count;
        self.primed = false;
    }

    pub(crate) fn record_miss(&mut self, address: Option<LookupAddress>) {
        self.address = address;
        self.outcome = LookupOutcome::Miss;
        self.stored_count = None;
        self.primed = false;
    }

    pub(crate) fn mark_primed(&mut self) {
        self.primed = true;
    }
}
