//! Country leaderboards and the global rank index.
//!
//! [`RankingService`] lazily caches one leaderboard per country behind its
//! own TTL and falls back to stale copies when the [`LeaderboardSource`] is
//! unavailable. Every successful fetch rebuilds a global index spanning all
//! cached countries.

mod country;
pub mod error;
mod index;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod models;
mod service;
mod source;

pub use crate::country::normalize_country;
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockLeaderboard;
pub use crate::models::{CacheState, CountryRanking, CountryUser, GlobalUser, UserRanking};
pub use crate::service::{COUNTRIES_TTL, RANKING_TTL, RankingConfig, RankingService};
pub use crate::source::{
    DEFAULT_BASE_URL, DEFAULT_COUNTRIES_URL, DEFAULT_TIMEOUT, HttpLeaderboard, LeaderboardHandle, LeaderboardOptions,
    LeaderboardSource,
};
