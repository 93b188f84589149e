//! Cache invalidation
//!
//! Mutation sites report changes to an [`InvalidationTrigger`], which
//! advances the cache generation. Individual entries are never deleted.
//!
//! Two mechanisms keep cascades of change notifications from producing a
//! flood of advances:
//!
//! - suppression, for notifications that are side effects of bookkeeping
//!   (e.g. comment-count maintenance) rather than real content changes;
//! - batches, for one logical operation that reports many changes (e.g. an
//!   object and all of its descendants). A batch advances at most once, when
//!   it ends.

use crate::config::{CacheConfig, SuppressionMode};
use crate::generation::{Generation, GenerationTracker};
use crate::stats::CacheStats;
use listcache_core::ObjectId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Where a change notification comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeOrigin {
    /// A persisted change to real content
    #[default]
    Persistent,
    /// A preview render that is never persisted
    Preview,
    /// An autosave revision
    Autosave,
}

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    ObjectChanged(ObjectId),
    ObjectRemoved(ObjectId),
    /// A taxonomy term that list queries may filter on
    TermChanged(u64),
}

/// A change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataChange {
    pub kind: ChangeKind,
    pub origin: ChangeOrigin,
}

impl DataChange {
    pub fn object_changed(id: impl Into<ObjectId>) -> Self {
        Self {
            kind: ChangeKind::ObjectChanged(id.into()),
            origin: ChangeOrigin::Persistent,
        }
    }

    pub fn object_removed(id: impl Into<ObjectId>) -> Self {
        Self {
            kind: ChangeKind::ObjectRemoved(id.into()),
            origin: ChangeOrigin::Persistent,
        }
    }

    pub fn term_changed(term_id: u64) -> Self {
        Self {
            kind: ChangeKind::TermChanged(term_id),
            origin: ChangeOrigin::Persistent,
        }
    }

    pub fn with_origin(mut self, origin: ChangeOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Previews and autosaves never invalidate
    pub fn is_exempt(&self) -> bool {
        matches!(self.origin, ChangeOrigin::Preview | ChangeOrigin::Autosave)
    }
}

/// What a change notification did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// The generation advanced to the given value
    Advanced(Generation),
    /// Invalidation is suppressed
    Suppressed,
    /// The change origin is exempt
    Exempt,
    /// Recorded in an open batch; applied when the batch ends
    Deferred,
    /// Caching is disabled
    Disabled,
}

/// Trait for components that react to data changes
pub trait CacheInvalidator: Send + Sync {
    fn on_data_changed(&self, change: &DataChange) -> InvalidationOutcome;
}

/// Advances the cache generation when data changes
pub struct InvalidationTrigger {
    tracker: Arc<GenerationTracker>,
    config: Arc<CacheConfig>,
    stats: Arc<CacheStats>,
    suppression: AtomicUsize,
    batch_depth: AtomicUsize,
    batch_pending: AtomicBool,
}

impl InvalidationTrigger {
    pub fn new(
        tracker: Arc<GenerationTracker>,
        config: Arc<CacheConfig>,
        stats: Arc<CacheStats>,
    ) -> Self {
        Self {
            tracker,
            config,
            stats,
            suppression: AtomicUsize::new(0),
            batch_depth: AtomicUsize::new(0),
            batch_pending: AtomicBool::new(false),
        }
    }

    /// Whether invalidation is currently suppressed
    pub fn is_suppressed(&self) -> bool {
        self.suppression.load(Ordering::Acquire) > 0
    }

    /// Current suppression depth (0 or 1 in [`SuppressionMode::Flag`])
    pub fn suppression_depth(&self) -> usize {
        self.suppression.load(Ordering::Acquire)
    }

    /// Stop invalidating until the matching [`unsuppress`](Self::unsuppress)
    pub fn suppress(&self) {
        match self.config.suppression_mode {
            SuppressionMode::Depth => {
                self.suppression.fetch_add(1, Ordering::AcqRel);
            }
            SuppressionMode::Flag => self.suppression.store(1, Ordering::Release),
        }
    }

    /// Release one level of suppression. In [`SuppressionMode::Flag`] this
    /// re-enables invalidation regardless of how many times `suppress` ran.
    pub fn unsuppress(&self) {
        match self.config.suppression_mode {
            SuppressionMode::Depth => {
                let _ = self
                    .suppression
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                        Some(depth.saturating_sub(1))
                    });
            }
            SuppressionMode::Flag => self.suppression.store(0, Ordering::Release),
        }
    }

    /// Re-enable invalidation regardless of nesting depth
    pub fn force_unsuppress(&self) {
        self.suppression.store(0, Ordering::Release);
    }

    /// Suppress for the lifetime of the returned guard
    pub fn suppression_guard(&self) -> SuppressionGuard<'_> {
        self.suppress();
        SuppressionGuard { trigger: self }
    }

    /// Count maintenance is starting: its change notifications are not content changes
    pub fn begin_count_maintenance(&self) {
        self.suppress();
    }

    /// Count maintenance finished
    pub fn end_count_maintenance(&self) {
        self.unsuppress();
    }

    /// Open a batch that coalesces change notifications into at most one
    /// advance, applied when the outermost batch is dropped
    pub fn batch(&self) -> ChangeBatch<'_> {
        self.batch_depth.fetch_add(1, Ordering::AcqRel);
        ChangeBatch { trigger: self }
    }

    fn end_batch(&self) {
        let previous = self
            .batch_depth
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                Some(depth.saturating_sub(1))
            })
            .unwrap_or(0);

        if previous <= 1 && self.batch_pending.swap(false, Ordering::AcqRel) {
            let generation = self.tracker.advance_generation();
            debug!(generation, "Applied coalesced invalidation");
        }
    }

    /// Handle a change notification
    pub fn on_data_changed(&self, change: &DataChange) -> InvalidationOutcome {
        if !self.config.enabled {
            return InvalidationOutcome::Disabled;
        }

        if self.is_suppressed() {
            self.stats.record_suppressed();
            debug!(change = ?change.kind, "Invalidation suppressed");
            return InvalidationOutcome::Suppressed;
        }

        if change.is_exempt() {
            self.stats.record_exempt();
            debug!(
                change = ?change.kind,
                origin = ?change.origin,
                "Invalidation skipped for exempt change"
            );
            return InvalidationOutcome::Exempt;
        }

        if self.batch_depth.load(Ordering::Acquire) > 0 {
            self.batch_pending.store(true, Ordering::Release);
            return InvalidationOutcome::Deferred;
        }

        InvalidationOutcome::Advanced(self.tracker.advance_generation())
    }
}

impl CacheInvalidator for InvalidationTrigger {
    fn on_data_changed(&self, change: &DataChange) -> InvalidationOutcome {
        InvalidationTrigger::on_data_changed(self, change)
    }
}

/// Releases one level of suppression on drop
#[must_use = "suppression ends when the guard is dropped"]
pub struct SuppressionGuard<'a> {
    trigger: &'a InvalidationTrigger,
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.trigger.unsuppress();
    }
}

/// Coalesces change notifications until dropped
#[must_use = "the batch is applied when it is dropped"]
pub struct ChangeBatch<'a> {
    trigger: &'a InvalidationTrigger,
}

impl ChangeBatch<'_> {
    /// Report a change inside this batch
    pub fn changed(&self, change: &DataChange) -> InvalidationOutcome {
        self.trigger.on_data_changed(change)
    }
}

impl Drop for ChangeBatch<'_> {
    fn drop(&mut self) {
        self.trigger.end_batch();
    }
}
