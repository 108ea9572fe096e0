use ghstats_github::models::{Commit, Repository};
#[cfg(feature = "serde")]
use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Commit activity within a single repository.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct RepoStats {
    pub repository: Repository,
    pub commits: Vec<Commit>,
    pub total_commits: usize,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub first_commit: Option<OffsetDateTime>,
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub last_commit: Option<OffsetDateTime>,
    /// Keyed by English weekday name.
    pub commits_by_day: BTreeMap<String, u32>,
    pub commits_by_hour: BTreeMap<u8, u32>,
}

/// Selects the commits belonging to `repository` (name compared
/// case-insensitively) and summarizes them.
pub fn repo_stats(repository: &Repository, commits: &[Commit]) -> RepoStats {
    let commits: Vec<Commit> =
        commits.iter().filter(|commit| commit.repo.eq_ignore_ascii_case(&repository.name)).cloned().collect();
    let mut commits_by_day: BTreeMap<String, u32> = BTreeMap::new();
    let mut commits_by_hour: BTreeMap<u8, u32> = BTreeMap::new();
    for commit in &commits {
        *commits_by_day.entry(commit.date.weekday().to_string()).or_default() += 1;
        *commits_by_hour.entry(commit.date.hour()).or_default() += 1;
    }
    RepoStats {
        repository: repository.clone(),
        total_commits: commits.len(),
        first_commit: commits.iter().map(|commit| commit.date).min(),
        last_commit: commits.iter().map(|commit| commit.date).max(),
        commits,
        commits_by_day,
        commits_by_hour,
    }
}
