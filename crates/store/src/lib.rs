mod config;
mod reaper;
mod session;
mod store;

pub use crate::config::{REAP_INTERVAL, SESSION_TTL, STATE_TTL, STATS_TTL, StoreConfig};
pub use crate::session::Session;
pub use crate::store::{ReapReport, Store, StoreCounts, UserEntry};
