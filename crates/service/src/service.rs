use crate::error::{ErrorKind, Result};
use crate::key::CacheKey;
use exn::OptionExt;
use futures::StreamExt;
use ghstats_analytics::{FunStats, RepoStats, calendar_streak, fun_stats, has_languages, language_breakdown, repo_stats};
use ghstats_clock::ClockHandle;
use ghstats_github::models::{Commit, Repository, Stats, Visibility};
use ghstats_github::UpstreamHandle;
use ghstats_github::error::ErrorKind as UpstreamErrorKind;
use ghstats_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Upper bound on concurrent commit listings during a backfill.
pub const DEFAULT_BACKFILL_CONCURRENCY: usize = 4;

enum Lookup {
    Hit(Stats),
    Miss(CacheKey, Stats),
}

/// Cache-aside access to per-user stats, plus the analytics derived from
/// them.
///
/// The upstream client is passed per call rather than held, because the
/// right client depends on who is asking: a signed-in viewer brings their own
/// token, which is what makes private visibilities reachable.
#[derive(Debug, Clone)]
pub struct StatsService {
    store: Arc<Store>,
    clock: ClockHandle,
    backfill_concurrency: usize,
}

impl StatsService {
    pub fn new(store: Arc<Store>, clock: ClockHandle) -> Self {
        Self { store, clock, backfill_concurrency: DEFAULT_BACKFILL_CONCURRENCY }
    }

    pub fn with_backfill_concurrency(mut self, concurrency: usize) -> Self {
        self.backfill_concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Stats for `username`, served from the store while fresh.
    ///
    /// On a miss the aggregate is fetched, cached and returned, and a detached
    /// task starts filling in the commit history. The returned stats never
    /// wait for that backfill. Concurrent misses for the same key each fetch
    /// independently; the last write wins.
    pub async fn stats(&self, upstream: &UpstreamHandle, username: &str, visibility: Visibility) -> Result<Stats> {
        match self.lookup(upstream, username, visibility).await? {
            Lookup::Hit(stats) => Ok(stats),
            Lookup::Miss(key, stats) => {
                self.spawn_backfill(Arc::clone(upstream), key, stats.profile.login.clone(), stats.repositories.clone());
                Ok(stats)
            },
        }
    }

    /// Like [`stats`](Self::stats), but a miss leaves the commit history
    /// alone. For short-lived callers that would abort a detached backfill.
    pub async fn aggregate(&self, upstream: &UpstreamHandle, username: &str, visibility: Visibility) -> Result<Stats> {
        match self.lookup(upstream, username, visibility).await? {
            Lookup::Hit(stats) | Lookup::Miss(_, stats) => Ok(stats),
        }
    }

    /// Like [`stats`](Self::stats), but a miss awaits the commit backfill
    /// before returning, so derived analytics see the whole history.
    pub async fn stats_with_history(
        &self,
        upstream: &UpstreamHandle,
        username: &str,
        visibility: Visibility,
    ) -> Result<Stats> {
        match self.lookup(upstream, username, visibility).await? {
            Lookup::Hit(stats) => Ok(stats),
            Lookup::Miss(key, stats) => {
                self.backfill_commits(upstream, &key, &stats.profile.login, &stats.repositories).await;
                Ok(stats)
            },
        }
    }

    #[instrument(skip(self, upstream))]
    async fn lookup(&self, upstream: &UpstreamHandle, username: &str, visibility: Visibility) -> Result<Lookup> {
        let key = CacheKey::new(username, visibility);
        if let Some(stats) = self.store.get_aggregate(key.as_str()).await {
            tracing::debug!(%key, "Stats cache hit");
            return Ok(Lookup::Hit(stats));
        }

        let stats = match self.fetch_stats(upstream, username, visibility).await {
            Ok(stats) => stats,
            Err(err) if matches!(&*err, ErrorKind::Upstream(UpstreamErrorKind::Transient(_))) => {
                // The record outlives its TTL until the reaper removes it.
                let Some(stale) = self.store.user_entry(key.as_str()).await.and_then(|entry| entry.stats) else {
                    return Err(err);
                };
                tracing::warn!(%key, error = %err, updated_at = %stale.updated_at, "Serving stale stats");
                return Ok(Lookup::Hit(stale));
            },
            Err(err) => return Err(err),
        };
        self.store.set_aggregate(key.as_str(), stats.clone()).await;
        tracing::info!(%key, repositories = stats.repositories.len(), "Cached fresh stats");
        Ok(Lookup::Miss(key, stats))
    }

    async fn fetch_stats(&self, upstream: &UpstreamHandle, username: &str, visibility: Visibility) -> Result<Stats> {
        let (profile, repositories, calendar) = tokio::try_join!(
            async { upstream.profile(username).await.map_err(ErrorKind::upstream) },
            async { upstream.repositories(username, visibility).await.map_err(ErrorKind::upstream) },
            async { upstream.contribution_calendar(username).await.map_err(ErrorKind::upstream) },
        )?;

        let colors = if has_languages(&repositories) {
            upstream.language_colors(username).await.unwrap_or_else(|err| {
                tracing::warn!(username, error = %err, "Language colors unavailable; using fallback");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };

        let now = self.clock.now();
        Ok(Stats {
            streak: calendar_streak(&calendar, now.date()),
            languages: language_breakdown(&repositories, &colors),
            contributions: calendar.weeks,
            profile,
            repositories,
            updated_at: now,
        })
    }

    /// Runs [`backfill_commits`](Self::backfill_commits) on a detached task.
    /// Nothing is reported back; the only effect is a later store write.
    pub fn spawn_backfill(
        &self,
        upstream: UpstreamHandle,
        key: CacheKey,
        owner: String,
        repositories: Vec<Repository>,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            service.backfill_commits(&upstream, &key, &owner, &repositories).await;
        })
    }

    /// Collects the commits of every repository owned by `owner`, newest first,
    /// and attaches them to `key`. Repositories whose listing fails are
    /// skipped. Returns how many commits were stored.
    #[instrument(skip(self, upstream, repositories), fields(repositories = repositories.len()))]
    pub async fn backfill_commits(
        &self,
        upstream: &UpstreamHandle,
        key: &CacheKey,
        owner: &str,
        repositories: &[Repository],
    ) -> usize {
        let owner: Arc<str> = Arc::from(owner);
        let names: Vec<String> = repositories.iter().map(|repo| repo.name.clone()).collect();
        let mut commits: Vec<Commit> = futures::stream::iter(names)
            .map(|repo| {
                let upstream = Arc::clone(upstream);
                let owner = Arc::clone(&owner);
                async move {
                    match upstream.commits(&owner, &repo).await {
                        Ok(commits) => Some(commits),
                        Err(err) => {
                            tracing::warn!(%owner, %repo, error = %err, "Skipping repository during commit backfill");
                            None
                        },
                    }
                }
            })
            .buffer_unordered(self.backfill_concurrency)
            .filter_map(futures::future::ready)
            .concat()
            .await;
        commits.sort_by(|a, b| b.date.cmp(&a.date));
        let total = commits.len();
        self.store.set_commits(key.as_str(), commits).await;
        tracing::info!(%key, commits = total, "Commit backfill complete");
        total
    }

    async fn cached(&self, key: &CacheKey) -> Result<Stats> {
        self.store.get_aggregate(key.as_str()).await.ok_or_raise(|| ErrorKind::NotCached(key.to_string()))
    }

    /// Commit-rhythm stats for a cached user. Until the backfill lands they
    /// are computed over an empty history.
    pub async fn fun_stats(&self, key: &CacheKey) -> Result<FunStats> {
        let stats = self.cached(key).await?;
        let commits = self.store.get_commits(key.as_str()).await.unwrap_or_default();
        Ok(fun_stats(&commits, stats.repositories.len()))
    }

    pub async fn repo_stats(&self, key: &CacheKey, repo: &str) -> Result<RepoStats> {
        let stats = self.cached(key).await?;
        let repository = stats
            .repositories
            .iter()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(repo))
            .ok_or_raise(|| ErrorKind::RepositoryNotFound(repo.to_string()))?;
        let commits = self.store.get_commits(key.as_str()).await.unwrap_or_default();
        Ok(repo_stats(repository, &commits))
    }

    /// Cached repositories, optionally narrowed to those whose name,
    /// description or language contains `query` (case-insensitive).
    pub async fn repositories(&self, key: &CacheKey, query: Option<&str>) -> Result<Vec<Repository>> {
        let stats = self.cached(key).await?;
        let query = query.map(str::trim).filter(|query| !query.is_empty()).map(str::to_lowercase);
        let Some(query) = query else {
            return Ok(stats.repositories);
        };
        let matches = |field: Option<&str>| field.is_some_and(|value| value.to_lowercase().contains(&query));
        Ok(stats
            .repositories
            .into_iter()
            .filter(|repo| {
                matches(Some(&repo.name)) || matches(repo.description.as_deref()) || matches(repo.language.as_deref())
            })
            .collect())
    }
}

/// Repositories whose primary language is `language` (case-insensitive).
pub fn filter_by_language(stats: &Stats, language: &str) -> Vec<Repository> {
    stats
        .repositories
        .iter()
        .filter(|repo| repo.language.as_deref().is_some_and(|candidate| candidate.eq_ignore_ascii_case(language)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghstats_clock::ManualClock;
    use ghstats_github::MockUpstream;
    use ghstats_github::error::ErrorKind as UpstreamErrorKind;
    use ghstats_github::models::{ContributionCalendar, ContributionDay, ContributionWeek, Profile};
    use ghstats_store::StoreConfig;
    use time::macros::datetime;
    use time::{Duration, OffsetDateTime};

    fn repo(name: &str, language: Option<&str>) -> Repository {
        Repository {
            name: name.to_string(),
            description: Some(format!("The {name} project")),
            language: language.map(str::to_string),
            ..Default::default()
        }
    }

    fn commit(repo: &str, date: OffsetDateTime) -> Commit {
        Commit {
            sha: format!("{repo}-{}", date.unix_timestamp()),
            message: "work".to_string(),
            author: "Octo".to_string(),
            email: "octo@example.com".to_string(),
            date,
            url: String::new(),
            repo: repo.to_string(),
        }
    }

    struct Fixture {
        service: StatsService,
        mock: Arc<MockUpstream>,
        upstream: UpstreamHandle,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::starting_at(datetime!(2025-03-10 12:00 UTC));
        let calendar = ContributionCalendar {
            weeks: vec![ContributionWeek {
                days: vec![
                    ContributionDay { date: time::macros::date!(2025-03-09), count: 2, level: 1 },
                    ContributionDay { date: time::macros::date!(2025-03-10), count: 1, level: 1 },
                ],
            }],
            total: 3,
        };
        let mock = Arc::new(
            MockUpstream::default()
                .with_user(
                    Profile { login: "Octocat".to_string(), ..Default::default() },
                    vec![repo("engine", Some("Rust")), repo("site", Some("TypeScript")), repo("broken", None)],
                    calendar,
                )
                .with_colors("octocat", [("Rust", "#dea584")])
                .with_commits(
                    "Octocat",
                    "engine",
                    vec![commit("engine", datetime!(2025-03-01 10:00 UTC)), commit("engine", datetime!(2025-03-08 22:30 UTC))],
                )
                .with_commits("Octocat", "site", vec![commit("site", datetime!(2025-03-05 07:00 UTC))])
                .with_failing_repo("broken"),
        );
        let store = Arc::new(Store::new(Arc::new(clock.clone()), StoreConfig::default()));
        let service = StatsService::new(store, Arc::new(clock.clone()));
        Fixture { service, upstream: mock.clone(), mock, clock }
    }

    async fn wait_for_commits(service: &StatsService, key: &CacheKey) -> Vec<Commit> {
        for _ in 0..100 {
            if let Some(commits) = service.store().get_commits(key.as_str()).await.filter(|c| !c.is_empty()) {
                return commits;
            }
            tokio::task::yield_now().await;
        }
        panic!("commit backfill never landed for {key}");
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let f = fixture();
        let stats = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        assert_eq!(stats.profile.login, "Octocat");
        assert_eq!(stats.streak.current_streak, 2);
        assert_eq!(stats.streak.total_contributions, 3);
        assert_eq!(stats.languages.len(), 2);
        assert_eq!(stats.languages[0].percentage, 50);
        let again = f.service.stats(&f.upstream, "OctoCat", Visibility::Public).await.unwrap();
        assert_eq!(again, stats);
        assert_eq!(f.mock.profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_stats_are_refetched() {
        let f = fixture();
        f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        f.clock.advance(Duration::minutes(11));
        f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        assert_eq!(f.mock.profile_calls(), 2);
    }

    #[tokio::test]
    async fn test_visibilities_are_cached_separately() {
        let f = fixture();
        f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        f.service.stats(&f.upstream, "octocat", Visibility::All).await.unwrap();
        assert_eq!(f.mock.profile_calls(), 2);
        assert!(f.service.store().user_entry("octocat:all").await.is_some());
    }

    #[tokio::test]
    async fn test_upstream_errors_keep_their_kind() {
        let f = fixture();
        let err = f.service.stats(&f.upstream, "ghost", Visibility::Public).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Upstream(UpstreamErrorKind::NotFound(_))));

        f.mock.fail_with(Some(UpstreamErrorKind::RateLimited));
        let err = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::Upstream(UpstreamErrorKind::RateLimited));
        assert!(f.service.store().user_entry("octocat").await.is_none());
    }

    #[tokio::test]
    async fn test_transient_failure_serves_stale_stats() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        let cached = f.service.aggregate(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        let cached_at = f.service.store().user_entry(key.as_str()).await.unwrap().updated_at;

        f.clock.advance(Duration::minutes(11));
        f.mock.fail_with(Some(UpstreamErrorKind::Transient("timeout".to_string())));
        let stale = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        assert_eq!(stale, cached);
        assert_eq!(f.mock.profile_calls(), 2);
        assert_eq!(f.service.store().user_entry(key.as_str()).await.unwrap().updated_at, cached_at);
        assert!(f.service.store().get_aggregate(key.as_str()).await.is_none());
    }

    #[tokio::test]
    async fn test_non_transient_failure_ignores_stale_stats() {
        let f = fixture();
        f.service.aggregate(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        f.clock.advance(Duration::minutes(11));
        f.mock.fail_with(Some(UpstreamErrorKind::RateLimited));
        let err = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap_err();
        assert_eq!(&*err, &ErrorKind::Upstream(UpstreamErrorKind::RateLimited));
    }

    #[tokio::test]
    async fn test_transient_failure_without_cache_is_an_error() {
        let f = fixture();
        f.mock.fail_with(Some(UpstreamErrorKind::Transient("timeout".to_string())));
        let err = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Upstream(UpstreamErrorKind::Transient(_))));
    }

    #[tokio::test]
    async fn test_aggregate_leaves_commits_alone() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        f.service.aggregate(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.mock.commit_calls(), 0);
        assert_eq!(f.service.store().get_commits(key.as_str()).await, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_spawned_backfill_completes() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        let repositories = vec![repo("engine", None), repo("site", None)];
        f.service.spawn_backfill(f.upstream.clone(), key.clone(), "Octocat".to_string(), repositories).await.unwrap();
        assert_eq!(f.service.store().get_commits(key.as_str()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_backfill_runs_after_miss() {
        let f = fixture();
        f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        let key = CacheKey::new("octocat", Visibility::Public);
        let commits = wait_for_commits(&f.service, &key).await;
        assert_eq!(commits.len(), 3);
        assert!(commits.windows(2).all(|pair| pair[0].date >= pair[1].date));
        assert_eq!(commits[0].date, datetime!(2025-03-08 22:30 UTC));
    }

    #[tokio::test]
    async fn test_stats_with_history_awaits_backfill() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        f.service.stats_with_history(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        assert_eq!(f.service.store().get_commits(key.as_str()).await.unwrap().len(), 3);
        assert_eq!(f.mock.commit_calls(), 3);

        f.service.stats_with_history(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        assert_eq!(f.mock.commit_calls(), 3);
        assert_eq!(f.mock.profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_backfill_skips_failing_repositories() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        let repositories = vec![repo("broken", None), repo("site", None)];
        let stored = f.service.backfill_commits(&f.upstream, &key, "octocat", &repositories).await;
        assert_eq!(stored, 1);
        assert_eq!(f.mock.commit_calls(), 2);
    }

    #[tokio::test]
    async fn test_fun_stats_requires_cached_stats() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        let err = f.service.fun_stats(&key).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotCached(_)));
    }

    #[tokio::test]
    async fn test_fun_stats_before_and_after_backfill() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        let stats = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        f.service.store().set_commits(key.as_str(), Vec::new()).await;
        let partial = f.service.fun_stats(&key).await.unwrap();
        assert_eq!(partial.total_commits, 0);
        assert_eq!(partial.total_repositories, stats.repositories.len());

        f.service.backfill_commits(&f.upstream, &key, "octocat", &stats.repositories).await;
        let full = f.service.fun_stats(&key).await.unwrap();
        assert_eq!(full.total_commits, 3);
        assert_eq!(full.most_active_repo, "engine");
    }

    #[tokio::test]
    async fn test_repo_stats() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        let stats = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        f.service.backfill_commits(&f.upstream, &key, "octocat", &stats.repositories).await;

        let engine = f.service.repo_stats(&key, "ENGINE").await.unwrap();
        assert_eq!(engine.total_commits, 2);
        assert_eq!(engine.first_commit, Some(datetime!(2025-03-01 10:00 UTC)));

        let err = f.service.repo_stats(&key, "nope").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RepositoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_repository_search() {
        let f = fixture();
        let key = CacheKey::new("octocat", Visibility::Public);
        f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();

        assert_eq!(f.service.repositories(&key, None).await.unwrap().len(), 3);
        assert_eq!(f.service.repositories(&key, Some("  ")).await.unwrap().len(), 3);
        let by_language = f.service.repositories(&key, Some("typescript")).await.unwrap();
        assert_eq!(by_language.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["site"]);
        let by_description = f.service.repositories(&key, Some("ENGINE project")).await.unwrap();
        assert_eq!(by_description.len(), 1);
        assert!(f.service.repositories(&key, Some("cobol")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filter_by_language() {
        let f = fixture();
        let stats = f.service.stats(&f.upstream, "octocat", Visibility::Public).await.unwrap();
        let rust = filter_by_language(&stats, "rust");
        assert_eq!(rust.len(), 1);
        assert_eq!(rust[0].name, "engine");
        assert!(filter_by_language(&stats, "Go").is_empty());
    }
}
