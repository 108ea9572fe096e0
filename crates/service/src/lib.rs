pub mod error;
mod key;
mod service;

pub use crate::key::CacheKey;
pub use crate::service::{DEFAULT_BACKFILL_CONCURRENCY, StatsService, filter_by_language};
