use std::time::Duration;

/// Default freshness window for cached aggregates.
pub const STATS_TTL: Duration = Duration::from_secs(10 * 60);
/// OAuth anti-forgery tokens are single-use and short-lived.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Lifetimes governing the [`Store`](crate::Store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub stats_ttl: Duration,
    pub state_ttl: Duration,
    pub session_ttl: Duration,
    pub reap_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { stats_ttl: STATS_TTL, state_ttl: STATE_TTL, session_ttl: SESSION_TTL, reap_interval: REAP_INTERVAL }
    }
}
