use crate::config::StoreConfig;
use crate::session::Session;
use ghstats_clock::{ClockHandle, ttl};
use ghstats_github::models::{Commit, Stats};
use rand::RngCore;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use tracing::instrument;

const STATE_TOKEN_BYTES: usize = 16;
const SESSION_ID_BYTES: usize = 32;

/// Everything cached for one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub stats: Option<Stats>,
    /// Newest first once populated. May lag behind `stats`.
    pub commits: Vec<Commit>,
    pub updated_at: OffsetDateTime,
}
impl UserEntry {
    fn empty(now: OffsetDateTime) -> Self {
        Self { stats: None, commits: Vec::new(), updated_at: now }
    }
}

/// What a single [`Store::reap`] sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub users: usize,
    pub sessions: usize,
    pub states: usize,
}
impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.users == 0 && self.sessions == 0 && self.states == 0
    }
}

/// Current number of records of each kind, expired or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub users: usize,
    pub sessions: usize,
    pub states: usize,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, UserEntry>,
    sessions: HashMap<String, Session>,
    states: HashMap<String, OffsetDateTime>,
}

/// Process-lifetime cache of per-user aggregates, OAuth states and sessions.
///
/// All three maps sit behind one reader/writer lock. Reads clone out of the
/// lock, so callers never hold references into cached state, and nothing
/// slow (random generation, logging of large values) happens while the lock
/// is held. Expired records read as absent immediately; physical removal is
/// left to [`reap`](Self::reap).
#[derive(Debug)]
pub struct Store {
    clock: ClockHandle,
    config: StoreConfig,
    inner: RwLock<Inner>,
}

impl Store {
    pub fn new(clock: ClockHandle, config: StoreConfig) -> Self {
        Self { clock, config, inner: RwLock::new(Inner::default()) }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn stats_ttl(&self) -> Duration {
        ttl(self.config.stats_ttl)
    }

    fn is_fresh(&self, entry: &UserEntry) -> bool {
        self.clock.is_within(entry.updated_at, self.stats_ttl())
    }

    /// Cached stats for `key`, provided they are still fresh.
    pub async fn get_aggregate(&self, key: &str) -> Option<Stats> {
        let guard = self.inner.read().await;
        guard.users.get(key).filter(|entry| self.is_fresh(entry)).and_then(|entry| entry.stats.clone())
    }

    /// Stores `stats` under `key` and restarts its freshness window.
    #[instrument(level = "debug", skip(self, stats))]
    pub async fn set_aggregate(&self, key: &str, stats: Stats) {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        let entry = guard.users.entry(key.to_string()).or_insert_with(|| UserEntry::empty(now));
        entry.stats = Some(stats);
        entry.updated_at = now;
    }

    /// Cached commits for `key`, gated by the same freshness as the stats.
    pub async fn get_commits(&self, key: &str) -> Option<Vec<Commit>> {
        let guard = self.inner.read().await;
        guard.users.get(key).filter(|entry| self.is_fresh(entry)).map(|entry| entry.commits.clone())
    }

    /// Attaches `commits` to the record for `key`.
    ///
    /// An existing record keeps its `updated_at`. A missing record is created
    /// fresh, without stats.
    #[instrument(level = "debug", skip(self, commits), fields(commits = commits.len()))]
    pub async fn set_commits(&self, key: &str, commits: Vec<Commit>) {
        let now = self.clock.now();
        let mut guard = self.inner.write().await;
        guard.users.entry(key.to_string()).or_insert_with(|| UserEntry::empty(now)).commits = commits;
    }

    /// `true` when there is no record, the record has no stats, or it is older
    /// than `max_age`.
    pub async fn is_stale(&self, key: &str, max_age: Duration) -> bool {
        let guard = self.inner.read().await;
        match guard.users.get(key) {
            Some(entry) if entry.stats.is_some() => !self.clock.is_within(entry.updated_at, max_age),
            _ => true,
        }
    }

    /// Drops the record for `key`, returning whether one existed.
    pub async fn invalidate(&self, key: &str) -> bool {
        self.inner.write().await.users.remove(key).is_some()
    }

    /// Raw snapshot of the record for `key`, regardless of freshness.
    pub async fn user_entry(&self, key: &str) -> Option<UserEntry> {
        self.inner.read().await.users.get(key).cloned()
    }

    pub async fn counts(&self) -> StoreCounts {
        let guard = self.inner.read().await;
        StoreCounts { users: guard.users.len(), sessions: guard.sessions.len(), states: guard.states.len() }
    }

    /// Issues a fresh OAuth anti-forgery token.
    pub async fn create_oauth_state(&self) -> String {
        let token = random_token(STATE_TOKEN_BYTES);
        let now = self.clock.now();
        self.inner.write().await.states.insert(token.clone(), now);
        token
    }

    /// Consumes `token`, returning `true` only if it was issued here and has
    /// not outlived the state TTL.
    ///
    /// The lookup and removal happen under one exclusive section, so
    /// concurrent validations of the same token succeed at most once. An
    /// expired token is removed and rejected.
    pub async fn validate_oauth_state(&self, token: &str) -> bool {
        let created = self.inner.write().await.states.remove(token);
        match created {
            Some(created) => self.clock.is_within(created, ttl(self.config.state_ttl)),
            None => false,
        }
    }

    /// Starts a session for `username`, valid for the session TTL.
    pub async fn create_session(
        &self,
        username: impl Into<String>,
        access_token: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Session {
        let now = self.clock.now();
        let session = Session {
            id: random_token(SESSION_ID_BYTES),
            username: username.into(),
            access_token: access_token.into(),
            avatar_url: avatar_url.into(),
            created_at: now,
            expires_at: now.saturating_add(ttl(self.config.session_ttl)),
        };
        self.inner.write().await.sessions.insert(session.id.clone(), session.clone());
        tracing::info!(username = %session.username, "Created session");
        session
    }

    /// The session with `id`, unless it has expired. Expired sessions are left
    /// in place for the reaper.
    pub async fn get_session(&self, id: &str) -> Option<Session> {
        let now = self.clock.now();
        let guard = self.inner.read().await;
        guard.sessions.get(id).filter(|session| !session.is_expired(now)).cloned()
    }

    pub async fn delete_session(&self, id: &str) {
        self.inner.write().await.sessions.remove(id);
    }

    /// Removes every expired session, OAuth state and aggregate in a single
    /// exclusive section.
    #[instrument(level = "debug", skip(self))]
    pub async fn reap(&self) -> ReapReport {
        let now = self.clock.now();
        let stats_ttl = self.stats_ttl();
        let state_ttl = ttl(self.config.state_ttl);
        let mut guard = self.inner.write().await;
        let before = (guard.users.len(), guard.sessions.len(), guard.states.len());
        guard.sessions.retain(|_, session| !session.is_expired(now));
        guard.states.retain(|_, created| now - *created <= state_ttl);
        guard.users.retain(|_, entry| now - entry.updated_at <= stats_ttl);
        ReapReport {
            users: before.0 - guard.users.len(),
            sessions: before.1 - guard.sessions.len(),
            states: before.2 - guard.states.len(),
        }
    }
}

fn random_token(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buffer);
    hex::encode(buffer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ghstats_clock::ManualClock;
    use ghstats_github::models::Profile;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::sync::Arc;

    pub(crate) fn store() -> (Store, ManualClock) {
        let clock = ManualClock::default();
        (Store::new(Arc::new(clock.clone()), StoreConfig::default()), clock)
    }

    pub(crate) fn stats(login: &str) -> Stats {
        Stats {
            profile: Profile { login: login.to_string(), ..Default::default() },
            repositories: Vec::new(),
            contributions: Vec::new(),
            languages: Vec::new(),
            streak: Default::default(),
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let (store, _) = store();
        assert!(store.get_aggregate("ghost").await.is_none());
        assert!(store.get_commits("ghost").await.is_none());
        assert!(store.is_stale("ghost", Duration::days(365)).await);
    }

    #[rstest]
    #[case(Duration::ZERO)]
    #[case(Duration::minutes(1))]
    #[case(Duration::days(7))]
    #[tokio::test]
    async fn test_set_then_get(#[case] max_age: Duration) {
        let (store, _) = store();
        store.set_aggregate("octocat", stats("octocat")).await;
        assert_eq!(store.get_aggregate("octocat").await, Some(stats("octocat")));
        assert!(!store.is_stale("octocat", max_age).await);
    }

    #[tokio::test]
    async fn test_aggregate_expires_without_reaper() {
        let (store, clock) = store();
        store.set_aggregate("octocat", stats("octocat")).await;
        clock.advance(Duration::minutes(10));
        assert!(store.get_aggregate("octocat").await.is_some());
        clock.advance(Duration::seconds(1));
        assert!(store.get_aggregate("octocat").await.is_none());
        assert!(store.get_commits("octocat").await.is_none());
        // Still physically present until a sweep.
        assert!(store.user_entry("octocat").await.is_some());
    }

    #[tokio::test]
    async fn test_set_aggregate_refreshes_updated_at() {
        let (store, clock) = store();
        store.set_aggregate("octocat", stats("octocat")).await;
        clock.advance(Duration::minutes(8));
        store.set_aggregate("octocat", stats("octocat")).await;
        clock.advance(Duration::minutes(8));
        assert!(store.get_aggregate("octocat").await.is_some());
    }

    #[tokio::test]
    async fn test_commit_only_write_is_fresh_but_has_no_stats() {
        let (store, _) = store();
        store.set_commits("octocat", Vec::new()).await;
        assert_eq!(store.get_commits("octocat").await, Some(Vec::new()));
        assert!(store.get_aggregate("octocat").await.is_none());
        assert!(store.is_stale("octocat", Duration::days(1)).await);
    }

    #[tokio::test]
    async fn test_commits_write_keeps_updated_at() {
        let (store, clock) = store();
        store.set_aggregate("octocat", stats("octocat")).await;
        let written = store.user_entry("octocat").await.unwrap().updated_at;
        clock.advance(Duration::minutes(5));
        store.set_commits("octocat", Vec::new()).await;
        let entry = store.user_entry("octocat").await.unwrap();
        assert_eq!(entry.updated_at, written);
        assert!(entry.stats.is_some());
    }

    #[tokio::test]
    async fn test_is_stale_custom_threshold() {
        let (store, clock) = store();
        store.set_aggregate("octocat", stats("octocat")).await;
        clock.advance(Duration::minutes(2));
        assert!(store.is_stale("octocat", Duration::minutes(1)).await);
        assert!(!store.is_stale("octocat", Duration::minutes(3)).await);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (store, _) = store();
        store.set_aggregate("octocat", stats("octocat")).await;
        assert!(store.invalidate("octocat").await);
        assert!(!store.invalidate("octocat").await);
        assert!(store.get_aggregate("octocat").await.is_none());
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let (store, _) = store();
        let token = store.create_oauth_state().await;
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(store.validate_oauth_state(&token).await);
        assert!(!store.validate_oauth_state(&token).await);
        assert!(!store.validate_oauth_state("not-a-token").await);
    }

    #[tokio::test]
    async fn test_oauth_state_expires() {
        let (store, clock) = store();
        let token = store.create_oauth_state().await;
        clock.advance(Duration::minutes(10) + Duration::seconds(1));
        assert!(!store.validate_oauth_state(&token).await);
        assert_eq!(store.counts().await.states, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_oauth_state_validates_once_under_contention() {
        let (store, _) = store();
        let store = Arc::new(store);
        let token = store.create_oauth_state().await;
        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let token = token.clone();
                tokio::spawn(async move { store.validate_oauth_state(&token).await })
            })
            .collect();
        let mut successes = 0;
        for attempt in attempts {
            successes += usize::from(attempt.await.unwrap());
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_tokens_are_unique() {
        let (store, _) = store();
        let mut seen = HashSet::new();
        for _ in 0..64 {
            assert!(seen.insert(store.create_oauth_state().await));
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (store, clock) = store();
        let session = store.create_session("octocat", "gho_token", "https://avatars.example/octocat").await;
        assert_eq!(session.id.len(), 64);
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
        assert_eq!(store.get_session(&session.id).await, Some(session.clone()));

        clock.advance(Duration::hours(24));
        assert!(store.get_session(&session.id).await.is_some());
        clock.advance(Duration::seconds(1));
        assert!(store.get_session(&session.id).await.is_none());
        // Lazy expiry does not delete.
        assert_eq!(store.counts().await.sessions, 1);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (store, _) = store();
        let session = store.create_session("octocat", "t", "").await;
        store.delete_session(&session.id).await;
        store.delete_session(&session.id).await;
        assert!(store.get_session(&session.id).await.is_none());
    }

    #[tokio::test]
    async fn test_reap() {
        let (store, clock) = store();
        let old_session = store.create_session("old", "t", "").await;
        store.create_oauth_state().await;
        store.set_aggregate("old", stats("old")).await;

        clock.advance(Duration::hours(23) + Duration::minutes(55));
        let new_session = store.create_session("new", "t", "").await;
        let new_state = store.create_oauth_state().await;
        store.set_aggregate("new", stats("new")).await;

        clock.advance(Duration::minutes(6));
        let report = store.reap().await;
        assert_eq!(report, ReapReport { users: 1, sessions: 1, states: 1 });
        assert!(store.get_session(&old_session.id).await.is_none());
        assert!(store.get_session(&new_session.id).await.is_some());
        assert!(store.validate_oauth_state(&new_state).await);
        assert!(store.user_entry("old").await.is_none());
        assert!(store.user_entry("new").await.is_some());

        assert!(store.reap().await.is_empty());
    }
}
