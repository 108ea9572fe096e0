use crate::histogram::{Histograms, percentage};
use crate::streak::longest_commit_streak;
use ghstats_github::models::Commit;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::collections::BTreeMap;
use time::Weekday;

/// Commit-rhythm trivia derived from a user's full commit history.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct FunStats {
    pub most_productive_hour: u8,
    /// English weekday name, empty when there are no commits.
    pub most_productive_day: String,
    pub commits_by_hour: BTreeMap<u8, u32>,
    pub commits_by_day_of_week: BTreeMap<String, u32>,
    pub commits_by_month: BTreeMap<String, u32>,
    pub average_commits_per_day: f64,
    pub longest_coding_streak: u32,
    pub total_commits: usize,
    pub total_repositories: usize,
    pub most_active_repo: String,
    pub most_active_repo_commits: u32,
    pub weekend_warrior_percent: f64,
    pub night_owl_percent: f64,
    pub early_bird_percent: f64,
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Saturday | Weekday::Sunday)
}

/// 22:00 through 05:59.
fn is_night(hour: u8) -> bool {
    hour >= 22 || hour < 6
}

/// 05:00 through 08:59. Overlaps the night window for the 05:00 hour.
fn is_early(hour: u8) -> bool {
    (5..9).contains(&hour)
}

/// Assembles [`FunStats`] from commits and the number of repositories they
/// were collected from. An empty commit list yields zeroed stats, not an
/// error.
pub fn fun_stats(commits: &[Commit], total_repositories: usize) -> FunStats {
    let histograms = Histograms::from_commits(commits);
    let total = histograms.total;
    let count = |predicate: &dyn Fn(&Commit) -> bool| commits.iter().filter(|commit| predicate(commit)).count();
    let (most_active_repo, most_active_repo_commits) =
        histograms.most_active_repo().map(|(repo, commits)| (repo.to_string(), commits)).unwrap_or_default();

    FunStats {
        most_productive_hour: histograms.most_productive_hour().unwrap_or_default(),
        most_productive_day: histograms.most_productive_weekday().map(|day| day.to_string()).unwrap_or_default(),
        commits_by_hour: histograms.hours(),
        commits_by_day_of_week: histograms.weekdays(),
        commits_by_month: histograms.by_month.clone(),
        average_commits_per_day: histograms.average_per_day(),
        longest_coding_streak: longest_commit_streak(commits),
        total_commits: total,
        total_repositories,
        most_active_repo,
        most_active_repo_commits,
        weekend_warrior_percent: percentage(count(&|commit| is_weekend(commit.date.weekday())), total),
        night_owl_percent: percentage(count(&|commit| is_night(commit.date.hour())), total),
        early_bird_percent: percentage(count(&|commit| is_early(commit.date.hour())), total),
    }
}
