//! Result assembly
//!
//! Both the hit path and the miss path end in the same hydration step, so the
//! output shape never depends on cache state. Hydration results, including
//! "not found" for objects deleted since priming, are returned untouched.

use crate::lookup::IdentifierCache;
use crate::scope::QueryScope;
use listcache_core::ObjectId;
use std::sync::Arc;

/// Resolves an identifier into a full domain object
pub trait Hydrator {
    type Object;

    fn hydrate(&self, id: ObjectId) -> Self::Object;
}

impl<F, T> Hydrator for F
where
    F: Fn(ObjectId) -> T,
{
    type Object = T;

    fn hydrate(&self, id: ObjectId) -> T {
        self(id)
    }
}

/// A raw result row that carries an object identifier
pub trait Identified {
    fn object_id(&self) -> ObjectId;
}

impl Identified for ObjectId {
    fn object_id(&self) -> ObjectId {
        *self
    }
}

/// Turns cached or fresh identifiers into ordered objects
pub struct ResultAssembler {
    ids: Arc<IdentifierCache>,
}

impl ResultAssembler {
    pub fn new(ids: Arc<IdentifierCache>) -> Self {
        Self { ids }
    }

    /// Produce the final object list for a query.
    ///
    /// On a hit `fresh` is ignored and the cached identifiers are used. On a
    /// miss `fresh` is primed into the cache first.
    pub fn assemble<H: Hydrator>(
        &self,
        scope: &mut QueryScope,
        fresh: Vec<ObjectId>,
        hydrator: &H,
    ) -> Vec<H::Object> {
        let ids = match scope.cached_ids() {
            Some(cached) => cached.to_vec(),
            None => {
                self.ids.prime_on_miss(scope, &fresh);
                fresh
            }
        };
        hydrate_all(&ids, hydrator)
    }

    /// [`assemble`](Self::assemble) for raw rows, extracting identifiers in row order
    pub fn assemble_rows<R: Identified, H: Hydrator>(
        &self,
        scope: &mut QueryScope,
        rows: &[R],
        hydrator: &H,
    ) -> Vec<H::Object> {
        let fresh = rows.iter().map(Identified::object_id).collect();
        self.assemble(scope, fresh, hydrator)
    }
}

/// Hydrate identifiers in order
pub fn hydrate_all<H: Hydrator>(ids: &[ObjectId], hydrator: &H) -> Vec<H::Object> {
    ids.iter().map(|id| hydrator.hydrate(*id)).collect()
}
