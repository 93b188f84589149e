//! In-memory blog backend used by the demos

use arrow::array::UInt64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use listcache::Hydrator;
use listcache_core::{ListQuery, ObjectId, Result, RowLimit};
use listcache_executor::ListQueryEngine;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: u64,
    pub title: String,
}

/// Published posts, newest id first
#[derive(Default)]
pub struct Blog {
    posts: RwLock<BTreeMap<u64, String>>,
    queries: AtomicUsize,
}

impl Blog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, id: u64, title: impl Into<String>) {
        self.posts.write().insert(id, title.into());
    }

    pub fn remove(&self, id: u64) -> bool {
        self.posts.write().remove(&id).is_some()
    }

    /// Queries that reached the backend so far
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn page(&self, limit: Option<RowLimit>) -> Vec<u64> {
        let posts = self.posts.read();
        let newest_first = posts.keys().rev().copied();
        match limit {
            Some(limit) => newest_first
                .skip(limit.offset as usize)
                .take(limit.count as usize)
                .collect(),
            None => newest_first.collect(),
        }
    }
}

/// The front-page listing of `page`
pub fn front_page(page: u64, per_page: u64) -> ListQuery {
    ListQuery::new(
        "SELECT ID FROM posts WHERE post_status = 'publish' ORDER BY post_date DESC",
        "SELECT COUNT(*) FROM posts WHERE post_status = 'publish'",
    )
    .with_limit(RowLimit::page(page, per_page))
}

fn parse_limit(sql: &str) -> Option<RowLimit> {
    let (_, clause) = sql.rsplit_once("LIMIT ")?;
    let (offset, count) = clause.split_once(',')?;
    Some(RowLimit::new(
        offset.trim().parse().ok()?,
        count.trim().parse().ok()?,
    ))
}

#[async_trait]
impl ListQueryEngine for Blog {
    async fn query_ids(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let ids = self.page(parse_limit(sql));
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::UInt64, false)]));
        Ok(vec![RecordBatch::try_new(
            schema,
            vec![Arc::new(UInt64Array::from(ids))],
        )?])
    }

    async fn count_rows(&self, _sql: &str) -> Result<u64> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.posts.read().len() as u64)
    }
}

impl Hydrator for Blog {
    type Object = Option<Post>;

    fn hydrate(&self, id: ObjectId) -> Option<Post> {
        self.posts.read().get(&id.get()).map(|title| Post {
            id: id.get(),
            title: title.clone(),
        })
    }
}
