//! Host query engine seam

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use listcache_core::Result;
use std::sync::Arc;

/// A query engine that can run the two halves of a split list query
#[async_trait]
pub trait ListQueryEngine: Send + Sync {
    /// Run an identifier query. The result must contain the id column.
    async fn query_ids(&self, sql: &str) -> Result<Vec<RecordBatch>>;

    /// Run a total-count query
    async fn count_rows(&self, sql: &str) -> Result<u64>;
}

#[async_trait]
impl<E: ListQueryEngine + ?Sized> ListQueryEngine for Arc<E> {
    async fn query_ids(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        (**self).query_ids(sql).await
    }

    async fn count_rows(&self, sql: &str) -> Result<u64> {
        (**self).count_rows(sql).await
    }
}
