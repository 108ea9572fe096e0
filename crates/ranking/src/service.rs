use crate::country::{is_valid_key, normalize_country};
use crate::error::{ErrorKind, Result};
use crate::index::GlobalIndex;
use crate::models::{CacheState, CountryRanking, GlobalUser, UserRanking};
use crate::source::LeaderboardHandle;
use ghstats_clock::{ClockHandle, ttl};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

pub const RANKING_TTL: Duration = Duration::from_secs(6 * 60 * 60);
pub const COUNTRIES_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingConfig {
    /// A cached country is served without refetching while younger than this.
    pub ranking_ttl: Duration,
    /// Period of the available-countries refresher.
    pub countries_ttl: Duration,
}
impl Default for RankingConfig {
    fn default() -> Self {
        Self { ranking_ttl: RANKING_TTL, countries_ttl: COUNTRIES_TTL }
    }
}

#[derive(Debug, Default)]
struct State {
    cache: HashMap<String, Arc<CountryRanking>>,
    index: GlobalIndex,
    countries: Vec<String>,
}

/// Cache of country leaderboards plus the global index derived from them.
///
/// Cached rankings are immutable and shared as [`Arc`] snapshots. The global
/// index is rebuilt under the write lock right after a fetched country lands
/// in the cache, so readers see either the old cache and index or the new
/// ones, never a mix.
pub struct RankingService {
    source: LeaderboardHandle,
    clock: ClockHandle,
    config: RankingConfig,
    state: RwLock<State>,
}

impl RankingService {
    pub fn new(source: LeaderboardHandle, clock: ClockHandle, config: RankingConfig) -> Self {
        Self { source, clock, config, state: RwLock::new(State::default()) }
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    fn is_fresh(&self, ranking: &CountryRanking) -> bool {
        self.clock.age(ranking.fetched_at) < ttl(self.config.ranking_ttl)
    }

    /// The leaderboard of `country`, fetched when absent or older than the
    /// ranking TTL.
    ///
    /// A failed refetch falls back to the stale copy when there is one; only a
    /// country that was never cached reports the failure.
    #[instrument(skip(self))]
    pub async fn country_ranking(&self, country: &str) -> Result<Arc<CountryRanking>> {
        let key = normalize_country(country);
        if !is_valid_key(&key) {
            exn::bail!(ErrorKind::NotFound(country.to_string()));
        }
        let cached = self.state.read().await.cache.get(&key).cloned();
        if let Some(ranking) = cached.as_ref().filter(|ranking| self.is_fresh(ranking)) {
            return Ok(Arc::clone(ranking));
        }

        match self.source.fetch_country(&key).await {
            Ok(users) => {
                let ranking = Arc::new(CountryRanking { country: key.clone(), users, fetched_at: self.clock.now() });
                let mut state = self.state.write().await;
                state.cache.insert(key, Arc::clone(&ranking));
                state.index = GlobalIndex::build(&state.cache);
                tracing::info!(
                    country = %ranking.country,
                    users = ranking.users.len(),
                    global = state.index.len(),
                    "Cached country ranking"
                );
                Ok(ranking)
            },
            Err(err) => match cached {
                Some(stale) => {
                    tracing::warn!(country = %key, error = %err, "Serving stale country ranking");
                    Ok(stale)
                },
                None => Err(err),
            },
        }
    }

    /// Cache state of `country` without touching the source.
    pub async fn cache_state(&self, country: &str) -> CacheState {
        let key = normalize_country(country);
        match self.state.read().await.cache.get(&key) {
            None => CacheState::Absent,
            Some(ranking) if self.is_fresh(ranking) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// Locates `username` inside `ranking`, adding its position in the
    /// current global index.
    pub async fn find_user_in_ranking(&self, username: &str, ranking: &CountryRanking) -> Option<UserRanking> {
        let state = self.state.read().await;
        locate(username, ranking, &state.index)
    }

    /// Searches every cached country for `username`. When several countries
    /// list the same login, which one answers is unspecified.
    pub async fn find_user_ranking(&self, username: &str) -> Option<UserRanking> {
        let state = self.state.read().await;
        state.cache.values().find_map(|ranking| locate(username, ranking, &state.index))
    }

    /// Refreshes `country` if needed, then looks `username` up in it.
    pub async fn user_ranking(&self, username: &str, country: &str) -> Result<Option<UserRanking>> {
        let ranking = self.country_ranking(country).await?;
        Ok(self.find_user_in_ranking(username, &ranking).await)
    }

    /// The top `limit` users across all cached countries; everyone when
    /// `limit` is `0`.
    pub async fn global_ranking(&self, limit: usize) -> Vec<GlobalUser> {
        self.state.read().await.index.top(limit)
    }

    /// Countries from the last successful listing, or the cached country keys
    /// (sorted) when no listing has been fetched yet.
    pub async fn available_countries(&self) -> Vec<String> {
        let state = self.state.read().await;
        if !state.countries.is_empty() {
            return state.countries.clone();
        }
        let mut countries: Vec<String> = state.cache.keys().cloned().collect();
        countries.sort();
        countries
    }

    /// Pulls the directory listing from the source, returning how many
    /// countries it advertises.
    #[instrument(skip(self))]
    pub async fn refresh_countries(&self) -> Result<usize> {
        let countries = self.source.list_countries().await?;
        let count = countries.len();
        self.state.write().await.countries = countries;
        tracing::info!(countries = count, "Refreshed available countries");
        Ok(count)
    }

    /// Refreshes the countries listing now and then every `interval`, until
    /// `shutdown` is cancelled or the service is dropped. Failures are logged
    /// and the previous listing is kept.
    pub fn spawn_countries_refresher(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let service = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {},
                }
                let Some(service) = service.upgrade() else {
                    break;
                };
                if let Err(err) = service.refresh_countries().await {
                    tracing::warn!(error = %err, "Failed to refresh available countries");
                }
            }
            tracing::debug!("Countries refresher stopped");
        })
    }
}

fn locate(username: &str, ranking: &CountryRanking, index: &GlobalIndex) -> Option<UserRanking> {
    let (position, user) =
        ranking.users.iter().enumerate().find(|(_, user)| user.login.eq_ignore_ascii_case(username))?;
    Some(UserRanking {
        username: user.login.clone(),
        country: ranking.country.clone(),
        country_rank: position + 1,
        country_total: ranking.users.len(),
        global_rank: index.rank_of(username).unwrap_or(0),
        global_total: index.len(),
        public_contributions: user.public_contributions,
        private_contributions: user.private_contributions,
        followers: user.followers,
    })
}
