//! In-memory upstream for testing.

use crate::error::{ErrorKind, Result};
use crate::models::{Commit, ContributionCalendar, Profile, Repository, Visibility};
use crate::upstream::Upstream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
struct MockUser {
    profile: Profile,
    repositories: Vec<Repository>,
    calendar: ContributionCalendar,
    colors: HashMap<String, String>,
}

/// Canned upstream responses keyed by (case-insensitive) login.
///
/// Unknown users answer [`ErrorKind::NotFound`]. A failure installed with
/// [`fail_with`](Self::fail_with) short-circuits every call until cleared,
/// which lets tests flip the upstream from healthy to broken mid-scenario.
#[derive(Debug, Default)]
pub struct MockUpstream {
    users: HashMap<String, MockUser>,
    commits: HashMap<(String, String), Vec<Commit>>,
    failing_repos: HashSet<String>,
    /// (follower, followed) login pairs, as given.
    follows: Vec<(String, String)>,
    failure: Mutex<Option<ErrorKind>>,
    profile_calls: AtomicUsize,
    commit_calls: AtomicUsize,
}

impl MockUpstream {
    pub fn with_user(mut self, profile: Profile, repositories: Vec<Repository>, calendar: ContributionCalendar) -> Self {
        let key = profile.login.to_lowercase();
        let colors = self.users.remove(&key).map(|user| user.colors).unwrap_or_default();
        self.users.insert(key, MockUser { profile, repositories, calendar, colors });
        self
    }

    pub fn with_colors(mut self, username: &str, colors: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
        let user = self.users.entry(username.to_lowercase()).or_default();
        user.colors.extend(colors.into_iter().map(|(name, color)| (name.to_string(), color.to_string())));
        self
    }

    pub fn with_commits(mut self, owner: &str, repo: &str, commits: Vec<Commit>) -> Self {
        self.commits.insert((owner.to_lowercase(), repo.to_lowercase()), commits);
        self
    }

    /// Make commit listings for `repo` fail with a transient error.
    pub fn with_failing_repo(mut self, repo: &str) -> Self {
        self.failing_repos.insert(repo.to_lowercase());
        self
    }

    /// Record that `follower` follows `followed`.
    pub fn with_follow(mut self, follower: &str, followed: &str) -> Self {
        self.follows.push((follower.to_string(), followed.to_string()));
        self
    }

    pub fn fail_with(&self, failure: Option<ErrorKind>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = failure;
    }

    /// Number of profile lookups served so far, including failed ones.
    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        match self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            Some(kind) => Err(exn::Exn::from(kind)),
            None => Ok(()),
        }
    }

    fn user(&self, username: &str) -> Result<&MockUser> {
        self.check_failure()?;
        self.users
            .get(&username.to_lowercase())
            .filter(|user| !user.profile.login.is_empty())
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(username.to_string())))
    }

    fn summary(&self, login: &str) -> Profile {
        match self.users.get(&login.to_lowercase()).filter(|user| !user.profile.login.is_empty()) {
            Some(user) => user.profile.clone(),
            None => Profile { login: login.to_string(), ..Default::default() },
        }
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn profile(&self, username: &str) -> Result<Profile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.user(username)?.profile.clone())
    }

    async fn repositories(&self, username: &str, visibility: Visibility) -> Result<Vec<Repository>> {
        Ok(self
            .user(username)?
            .repositories
            .iter()
            .filter(|repo| !repo.fork && !repo.archived && visibility.admits(repo))
            .cloned()
            .collect())
    }

    async fn contribution_calendar(&self, username: &str) -> Result<ContributionCalendar> {
        Ok(self.user(username)?.calendar.clone())
    }

    async fn commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        if self.failing_repos.contains(&repo.to_lowercase()) {
            exn::bail!(ErrorKind::Transient(format!("{owner}/{repo}")));
        }
        Ok(self.commits.get(&(owner.to_lowercase(), repo.to_lowercase())).cloned().unwrap_or_default())
    }

    async fn language_colors(&self, username: &str) -> Result<HashMap<String, String>> {
        Ok(self.user(username)?.colors.clone())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<Profile>> {
        self.check_failure()?;
        let query = query.trim().to_lowercase();
        let mut matches: Vec<Profile> = self
            .users
            .values()
            .filter(|user| !user.profile.login.is_empty() && user.profile.login.to_lowercase().contains(&query))
            .map(|user| user.profile.clone())
            .collect();
        matches.sort_by(|a, b| a.login.cmp(&b.login));
        matches.truncate(20);
        Ok(matches)
    }

    async fn followers(&self, username: &str) -> Result<Vec<Profile>> {
        self.user(username)?;
        Ok(self
            .follows
            .iter()
            .filter(|(_, followed)| followed.eq_ignore_ascii_case(username))
            .map(|(follower, _)| self.summary(follower))
            .collect())
    }

    async fn following(&self, username: &str) -> Result<Vec<Profile>> {
        self.user(username)?;
        Ok(self
            .follows
            .iter()
            .filter(|(follower, _)| follower.eq_ignore_ascii_case(username))
            .map(|(_, followed)| self.summary(followed))
            .collect())
    }
}
