//! The upstream API as seen by the rest of the workspace.

use crate::error::Result;
use crate::models::{Commit, ContributionCalendar, Profile, Repository, Visibility};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub type UpstreamHandle = Arc<dyn Upstream>;

/// Everything the caches need to pull from GitHub.
///
/// Implementations report failures with the [`ErrorKind`](crate::error::ErrorKind)
/// taxonomy so callers can tell a definitive "no such user" apart from an
/// exhausted quota or a flaky network.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Public profile of `username`.
    async fn profile(&self, username: &str) -> Result<Profile>;

    /// Non-fork, non-archived repositories owned by `username`, filtered to
    /// the requested [`Visibility`].
    async fn repositories(&self, username: &str, visibility: Visibility) -> Result<Vec<Repository>>;

    /// The last year of daily contribution counts.
    async fn contribution_calendar(&self, username: &str) -> Result<ContributionCalendar>;

    /// Every commit on the default branch of `owner/repo`, in upstream order.
    async fn commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>>;

    /// Language name to display color, across the user's repositories.
    async fn language_colors(&self, username: &str) -> Result<HashMap<String, String>>;

    /// Users matching `query`, best match first. Search results carry only
    /// the summary fields of a [`Profile`].
    async fn search_users(&self, query: &str) -> Result<Vec<Profile>>;

    /// The first page of accounts following `username`.
    async fn followers(&self, username: &str) -> Result<Vec<Profile>>;

    /// The first page of accounts `username` follows.
    async fn following(&self, username: &str) -> Result<Vec<Profile>>;
}
