pub mod cached_executor;
pub mod engine;
pub mod ids;

pub use cached_executor::{CachedListExecutor, ListResult};
pub use engine::ListQueryEngine;
pub use ids::{extract_ids, DEFAULT_ID_COLUMN};
