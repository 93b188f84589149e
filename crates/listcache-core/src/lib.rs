pub mod error;
pub mod types;

pub use error::{ListCacheError, Result};
pub use types::*;
