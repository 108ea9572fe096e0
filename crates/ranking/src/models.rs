use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One entry of a country leaderboard, as published upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub public_contributions: u64,
    #[serde(default)]
    pub private_contributions: u64,
}

/// A cached leaderboard. `users` is in upstream rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryRanking {
    pub country: String,
    pub users: Vec<CountryUser>,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalUser {
    pub login: String,
    pub country: String,
    pub public_contributions: u64,
}

/// Where a user sits, both within one country and across every cached one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRanking {
    /// Login as spelled upstream.
    pub username: String,
    pub country: String,
    /// 1-based.
    pub country_rank: usize,
    pub country_total: usize,
    /// 1-based; `0` when the user is missing from the global index.
    pub global_rank: usize,
    pub global_total: usize,
    pub public_contributions: u64,
    pub private_contributions: u64,
    pub followers: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    Absent,
    Fresh,
    Stale,
}
