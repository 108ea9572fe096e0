//! GitHub data models.
//!
//! These are the values that flow from the upstream client into the caches
//! and analytics. Field names follow the REST API where the upstream provides
//! them directly; the derived records ([`Stats`], [`StreakStats`],
//! [`LanguageStats`]) are assembled by the service layer.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "html_url", default)]
    pub url: String,
    #[serde(rename = "stargazers_count", default)]
    pub stars: u64,
    #[serde(rename = "forks_count", default)]
    pub forks: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub owner: Option<RepositoryOwner>,
}
impl Repository {
    /// Whether the listing names `login` as the owner. Repositories without
    /// owner information are never attributed.
    pub fn is_owned_by(&self, login: &str) -> bool {
        self.owner.as_ref().is_some_and(|owner| owner.login.eq_ignore_ascii_case(login))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// A single commit, flattened from the upstream commit listing.
///
/// `date` keeps the offset the author recorded, so hour-of-day and weekday
/// analytics reflect the author's local time rather than UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub url: String,
    pub repo: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: Date,
    pub count: u32,
    /// Intensity bucket, `0` (none) through `4` (fourth quartile).
    pub level: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionWeek {
    pub days: Vec<ContributionDay>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionCalendar {
    pub weeks: Vec<ContributionWeek>,
    pub total: u32,
}
impl ContributionCalendar {
    pub fn days(&self) -> impl Iterator<Item = &ContributionDay> {
        self.weeks.iter().flat_map(|week| week.days.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub name: String,
    pub percentage: u32,
    pub color: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_contributions: u32,
}

/// The aggregate record cached per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub profile: Profile,
    pub repositories: Vec<Repository>,
    pub contributions: Vec<ContributionWeek>,
    pub languages: Vec<LanguageStats>,
    pub streak: StreakStats,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Which of a user's repositories to include.
///
/// Anything other than [`Public`](Self::Public) requires the viewer's own
/// credentials, since it lists through the authenticated `/user/repos`
/// endpoint.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    #[display("public")]
    Public,
    #[display("private")]
    Private,
    #[display("all")]
    All,
}
impl Visibility {
    /// Whether a repository belongs in a listing of this visibility.
    pub fn admits(&self, repository: &Repository) -> bool {
        match self {
            Self::Public => !repository.private,
            Self::Private => repository.private,
            Self::All => true,
        }
    }

    pub fn requires_authentication(&self) -> bool {
        !matches!(self, Self::Public)
    }
}
impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "all" => Ok(Self::All),
            other => Err(format!("unknown visibility: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("public", Visibility::Public)]
    #[case("", Visibility::Public)]
    #[case("PRIVATE", Visibility::Private)]
    #[case(" all ", Visibility::All)]
    fn test_visibility_from_str(#[case] input: &str, #[case] expected: Visibility) {
        assert_eq!(input.parse::<Visibility>().unwrap(), expected);
    }

    #[test]
    fn test_visibility_from_str_invalid() {
        assert!("internal".parse::<Visibility>().is_err());
    }

    #[rstest]
    #[case(Visibility::Public, false, true)]
    #[case(Visibility::Public, true, false)]
    #[case(Visibility::Private, true, true)]
    #[case(Visibility::Private, false, false)]
    #[case(Visibility::All, true, true)]
    #[case(Visibility::All, false, true)]
    fn test_visibility_admits(#[case] visibility: Visibility, #[case] private: bool, #[case] expected: bool) {
        let repository = Repository { name: "repo".to_string(), private, ..Default::default() };
        assert_eq!(visibility.admits(&repository), expected);
    }

    #[test]
    fn test_repository_deserializes_rest_payload() {
        let json = r#"{
            "name": "ghstats",
            "description": null,
            "html_url": "https://github.com/octocat/ghstats",
            "stargazers_count": 42,
            "forks_count": 3,
            "language": "Rust",
            "updated_at": "2025-01-02T03:04:05Z",
            "fork": false,
            "archived": false,
            "private": false,
            "some_unused_field": true
        }"#;
        let repository: Repository = serde_json::from_str(json).unwrap();
        assert_eq!(repository.name, "ghstats");
        assert_eq!(repository.stars, 42);
        assert_eq!(repository.language.as_deref(), Some("Rust"));
        assert!(repository.description.is_none());
        assert!(repository.updated_at.is_some());
    }

    #[test]
    fn test_contribution_day_uses_iso_dates() {
        let day: ContributionDay = serde_json::from_str(r#"{"date":"2025-03-04","count":7,"level":2}"#).unwrap();
        assert_eq!(day.date, Date::from_calendar_date(2025, time::Month::March, 4).unwrap());
        assert_eq!(serde_json::to_string(&day).unwrap(), r#"{"date":"2025-03-04","count":7,"level":2}"#);
    }
}
