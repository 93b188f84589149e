//! Cached List Executor
//!
//! Runs split list queries against a [`ListQueryEngine`], consulting a
//! [`ListCache`] at every extension point so cached identifier lists skip both
//! the identifier query and the count query.

use crate::engine::ListQueryEngine;
use crate::ids::{extract_ids, DEFAULT_ID_COLUMN};
use listcache::{
    CacheConfig, CacheStats, DataChange, FoundCount, Hydrator, InvalidationOutcome, ListCache,
};
use listcache_core::{ListQuery, Result, TenantId};
use std::sync::Arc;
use tracing::debug;

/// Objects of one list query plus its total count
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult<T> {
    pub objects: Vec<T>,
    /// Total matching rows, `None` when the query has no limit or opted out
    pub found_rows: Option<u64>,
    /// Whether the identifiers came from the cache
    pub from_cache: bool,
}

/// A list query executor with built-in caching support
pub struct CachedListExecutor<E> {
    engine: E,
    cache: Arc<ListCache>,
    id_column: String,
}

impl<E: ListQueryEngine> CachedListExecutor<E> {
    /// Create an executor over a private in-memory cache
    pub fn new(engine: E, config: CacheConfig, tenant: TenantId) -> Self {
        Self::with_cache(engine, Arc::new(ListCache::with_memory_store(config, tenant)))
    }

    /// Create an executor with a shared cache
    pub fn with_cache(engine: E, cache: Arc<ListCache>) -> Self {
        Self {
            engine,
            cache,
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }

    /// Read identifiers from `column` instead of `id`
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Execute a list query with caching support.
    ///
    /// Both engine queries run before anything is written, so an engine error
    /// is returned unchanged and leaves no entry behind for this query.
    pub async fn execute<H: Hydrator>(
        &self,
        query: &ListQuery,
        hydrator: &H,
    ) -> Result<ListResult<H::Object>> {
        let mut scope = self.cache.begin_query();
        self.cache
            .post_limits_request(&mut scope, query.limit.as_ref(), query.no_found_rows);

        let request_sql = query.request_sql();
        let fresh = match self.cache.request_ids(&mut scope, &request_sql) {
            Some(sql) => {
                let batches = self.engine.query_ids(sql).await?;
                extract_ids(&batches, &self.id_column)?
            }
            None => Vec::new(),
        };
        let from_cache = scope.is_hit();

        let found_rows = match self.cache.found_rows_query(&scope, &query.count_sql) {
            Some(count_sql) => {
                let total = self.engine.count_rows(count_sql).await?;
                Some(self.cache.found_rows(&scope, total))
            }
            None => match scope.found_count() {
                FoundCount::Cached(count) => Some(count),
                _ => None,
            },
        };

        // Primes on a miss; the count entry, if any, is already in place.
        let objects = self.cache.assemble(&mut scope, fresh, hydrator);

        debug!(
            from_cache,
            objects = objects.len(),
            found_rows,
            "List query executed"
        );

        Ok(ListResult {
            objects,
            found_rows,
            from_cache,
        })
    }

    /// Execute without consulting or priming the cache
    pub async fn execute_uncached<H: Hydrator>(
        &self,
        query: &ListQuery,
        hydrator: &H,
    ) -> Result<ListResult<H::Object>> {
        let batches = self.engine.query_ids(&query.request_sql()).await?;
        let ids = extract_ids(&batches, &self.id_column)?;
        let objects = listcache::hydrate_all(&ids, hydrator);

        let found_rows = if query.limit.is_some() && !query.no_found_rows {
            Some(self.engine.count_rows(&query.count_sql).await?)
        } else {
            None
        };

        Ok(ListResult {
            objects,
            found_rows,
            from_cache: false,
        })
    }

    /// Report a data change to the cache
    pub fn on_data_changed(&self, change: &DataChange) -> InvalidationOutcome {
        self.cache.on_data_changed(change)
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> Arc<CacheStats> {
        self.cache.stats()
    }

    /// Get the underlying cache
    pub fn cache(&self) -> &Arc<ListCache> {
        &self.cache
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Check if caching is enabled
    pub fn is_cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use async_trait::async_trait;
    use listcache_core::{ListCacheError, ObjectId, RowLimit};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEngine {
        ids: Vec<i64>,
        total: u64,
        id_queries: AtomicUsize,
        count_queries: AtomicUsize,
    }

    impl FixedEngine {
        fn new(ids: Vec<i64>, total: u64) -> Self {
            Self {
                ids,
                total,
                id_queries: AtomicUsize::new(0),
                count_queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ListQueryEngine for FixedEngine {
        async fn query_ids(&self, _sql: &str) -> Result<Vec<RecordBatch>> {
            self.id_queries.fetch_add(1, Ordering::SeqCst);
            let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
            let array = Arc::new(Int64Array::from(self.ids.clone()));
            Ok(vec![RecordBatch::try_new(schema, vec![array])?])
        }

        async fn count_rows(&self, _sql: &str) -> Result<u64> {
            self.count_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.total)
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl ListQueryEngine for FailingEngine {
        async fn query_ids(&self, _sql: &str) -> Result<Vec<RecordBatch>> {
            Err(ListCacheError::ExecutionError("connection reset".to_string()))
        }

        async fn count_rows(&self, _sql: &str) -> Result<u64> {
            Err(ListCacheError::ExecutionError("connection reset".to_string()))
        }
    }

    fn query() -> ListQuery {
        ListQuery::new(
            "SELECT id FROM posts WHERE status = 'publish' ORDER BY date DESC",
            "SELECT COUNT(*) FROM posts WHERE status = 'publish'",
        )
        .with_limit(RowLimit::new(0, 2))
    }

    fn title(id: ObjectId) -> String {
        format!("post-{}", id)
    }

    #[tokio::test]
    async fn test_cached_execution() {
        let executor = CachedListExecutor::new(
            FixedEngine::new(vec![4, 1], 12),
            CacheConfig::default(),
            TenantId(1),
        );

        let first = executor.execute(&query(), &title).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.objects, vec!["post-4", "post-1"]);
        assert_eq!(first.found_rows, Some(12));

        let second = executor.execute(&query(), &title).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.objects, first.objects);
        assert_eq!(second.found_rows, Some(2));

        assert_eq!(executor.engine().id_queries.load(Ordering::SeqCst), 1);
        assert_eq!(executor.engine().count_queries.load(Ordering::SeqCst), 1);
        assert_eq!(executor.cache_stats().hits(), 1);
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let executor = CachedListExecutor::new(
            FixedEngine::new(vec![4, 1], 12),
            CacheConfig::disabled(),
            TenantId(1),
        );
        assert!(!executor.is_cache_enabled());

        executor.execute(&query(), &title).await.unwrap();
        let second = executor.execute(&query(), &title).await.unwrap();
        assert!(!second.from_cache);
        assert_eq!(second.found_rows, Some(12));
        assert_eq!(executor.engine().id_queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_execute_uncached_bypasses_cache() {
        let executor = CachedListExecutor::new(
            FixedEngine::new(vec![3], 1),
            CacheConfig::default(),
            TenantId(1),
        );

        let result = executor.execute_uncached(&query(), &title).await.unwrap();
        assert_eq!(result.objects, vec!["post-3"]);
        assert_eq!(executor.cache_stats().total_requests(), 0);
        assert_eq!(executor.cache_stats().primes(), 0);
    }

    #[tokio::test]
    async fn test_engine_error_passes_through() {
        let executor =
            CachedListExecutor::new(FailingEngine, CacheConfig::default(), TenantId(1));

        let err = executor.execute(&query(), &title).await.unwrap_err();
        assert!(matches!(err, ListCacheError::ExecutionError(_)));
        assert_eq!(executor.cache_stats().primes(), 0);
    }
}
