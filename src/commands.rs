use crate::error::{ErrorKind, Result};
use clap::{Args, Subcommand};
use exn::ResultExt;
use ghstats_clock::{ClockHandle, SystemClock};
use ghstats_config::Config;
use ghstats_github::models::{Stats, Visibility};
use ghstats_github::{GithubClient, Upstream, UpstreamHandle};
use ghstats_ranking::{HttpLeaderboard, RankingService};
use ghstats_service::{CacheKey, StatsService, filter_by_language};
use ghstats_store::Store;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Profile, repositories, contribution calendar, streaks and languages
    Stats(UserArgs),
    /// Commit-rhythm trivia over the user's full commit history
    Fun(UserArgs),
    /// Commit activity within one repository
    Repo {
        #[command(flatten)]
        user: UserArgs,
        repo: String,
    },
    /// List repositories, optionally searching or filtering by language
    Repos {
        #[command(flatten)]
        user: UserArgs,
        /// Case-insensitive match on name, description or language
        #[arg(long, short)]
        query: Option<String>,
        /// Exact primary language, case-insensitive
        #[arg(long, conflicts_with = "query")]
        language: Option<String>,
    },
    /// Users whose login or name matches a GitHub search query
    Search { query: String },
    /// Accounts following a user
    Followers { username: String },
    /// Accounts a user follows
    Following { username: String },
    /// Where a user ranks within a country and across cached countries
    Rank {
        username: String,
        #[arg(long)]
        country: String,
    },
    /// A country's leaderboard
    Country { country: String },
    /// Merged leaderboard across the given countries
    Global {
        #[arg(required = true)]
        countries: Vec<String>,
        /// Number of users to print; 0 prints everyone
        #[arg(long, short, default_value_t = 25)]
        limit: usize,
    },
    /// Every country with a published leaderboard
    Countries,
    /// Keep the caches warm until interrupted
    Watch {
        /// Countries to fetch up front
        countries: Vec<String>,
    },
}

#[derive(Args, Debug)]
pub struct UserArgs {
    pub username: String,
    /// `public`, `private` or `all`; anything but public needs a viewer token
    #[arg(long, default_value = "public")]
    pub visibility: Visibility,
    /// Act on behalf of this viewer instead of the configured server token
    #[arg(long, env = "GHSTATS_VIEWER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Long-lived components, wired once from configuration.
pub struct App {
    github: GithubClient,
    stats: StatsService,
    ranking: Arc<RankingService>,
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let clock: ClockHandle = SystemClock::handle();
        let github = GithubClient::new(config.client_options()).map_err(|err| err.raise(ErrorKind::Client("GitHub")))?;
        let leaderboard = HttpLeaderboard::new(config.leaderboard_options())
            .map_err(|err| err.raise(ErrorKind::Client("leaderboard")))?;
        let store = Arc::new(Store::new(Arc::clone(&clock), config.store_config()));
        let stats = StatsService::new(store, Arc::clone(&clock))
            .with_backfill_concurrency(config.github.backfill_concurrency);
        let ranking = Arc::new(RankingService::new(Arc::new(leaderboard), clock, config.ranking_config()));
        if config.github.token.is_none() {
            tracing::warn!("No GitHub token configured; anonymous requests are heavily rate limited");
        }
        Ok(Self { github, stats, ranking, config })
    }

    fn upstream(&self, user: &UserArgs) -> Result<UpstreamHandle> {
        let client = match &user.token {
            Some(token) => self.github.with_token(token.clone()),
            None if user.visibility.requires_authentication() => {
                exn::bail!(ErrorKind::Usage(format!(
                    "{} repositories are only visible with --token",
                    user.visibility
                )));
            },
            None => self.github.clone(),
        };
        Ok(Arc::new(client))
    }

    /// Loads stats for one command. Without history no commits are fetched,
    /// since a detached backfill would die with the process.
    async fn load_stats(&self, user: &UserArgs, with_history: bool) -> Result<(CacheKey, Stats)> {
        let upstream = self.upstream(user)?;
        let loaded = if with_history {
            self.stats.stats_with_history(&upstream, &user.username, user.visibility).await
        } else {
            self.stats.aggregate(&upstream, &user.username, user.visibility).await
        };
        let stats = loaded.map_err(|err| err.raise(ErrorKind::Stats(user.username.clone())))?;
        Ok((CacheKey::new(&user.username, user.visibility), stats))
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Stats(user) => {
                let (_, stats) = self.load_stats(&user, false).await?;
                print_json(&stats)
            },
            Command::Fun(user) => {
                let (key, _) = self.load_stats(&user, true).await?;
                let fun = self.stats.fun_stats(&key).await.map_err(|err| err.raise(ErrorKind::Stats(user.username)))?;
                print_json(&fun)
            },
            Command::Repo { user, repo } => {
                let (key, _) = self.load_stats(&user, true).await?;
                let stats =
                    self.stats.repo_stats(&key, &repo).await.map_err(|err| err.raise(ErrorKind::Stats(user.username)))?;
                print_json(&stats)
            },
            Command::Repos { user, query, language } => {
                let (key, stats) = self.load_stats(&user, false).await?;
                let repositories = match language {
                    Some(language) => filter_by_language(&stats, &language),
                    None => self
                        .stats
                        .repositories(&key, query.as_deref())
                        .await
                        .map_err(|err| err.raise(ErrorKind::Stats(user.username.clone())))?,
                };
                print_json(&repositories)
            },
            Command::Search { query } => {
                let users =
                    self.github.search_users(&query).await.map_err(|err| err.raise(ErrorKind::Search(query.clone())))?;
                print_json(&users)
            },
            Command::Followers { username } => {
                let users =
                    self.github.followers(&username).await.map_err(|err| err.raise(ErrorKind::Stats(username.clone())))?;
                print_json(&users)
            },
            Command::Following { username } => {
                let users =
                    self.github.following(&username).await.map_err(|err| err.raise(ErrorKind::Stats(username.clone())))?;
                print_json(&users)
            },
            Command::Rank { username, country } => {
                let ranking = self
                    .ranking
                    .user_ranking(&username, &country)
                    .await
                    .map_err(|err| err.raise(ErrorKind::Ranking(country.clone())))?;
                match ranking {
                    Some(ranking) => print_json(&ranking),
                    None => exn::bail!(ErrorKind::Usage(format!("{username} is not ranked in {country}"))),
                }
            },
            Command::Country { country } => {
                let ranking =
                    self.ranking.country_ranking(&country).await.map_err(|err| err.raise(ErrorKind::Ranking(country)))?;
                print_json(&*ranking)
            },
            Command::Global { countries, limit } => {
                for country in &countries {
                    if let Err(err) = self.ranking.country_ranking(country).await {
                        tracing::warn!(country, error = %err, "Leaving country out of the global ranking");
                    }
                }
                print_json(&self.ranking.global_ranking(limit).await)
            },
            Command::Countries => {
                self.ranking
                    .refresh_countries()
                    .await
                    .map_err(|err| err.raise(ErrorKind::Ranking("available countries".to_string())))?;
                print_json(&self.ranking.available_countries().await)
            },
            Command::Watch { countries } => self.watch(countries).await,
        }
    }

    /// Runs the store reaper and the countries refresher until Ctrl-C.
    async fn watch(&self, countries: Vec<String>) -> Result<()> {
        let shutdown = CancellationToken::new();
        let reaper = self.stats.store().spawn_reaper(self.config.store_config().reap_interval, shutdown.clone());
        let refresher =
            self.ranking.spawn_countries_refresher(self.config.ranking_config().countries_ttl, shutdown.clone());

        for country in &countries {
            match self.ranking.country_ranking(country).await {
                Ok(ranking) => tracing::info!(country = %ranking.country, users = ranking.users.len(), "Warmed country"),
                Err(err) => tracing::warn!(country, error = %err, "Failed to warm country"),
            }
        }

        tracing::info!("Watching; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await.or_raise(|| ErrorKind::Usage("failed to listen for Ctrl-C".to_string()))?;
        tracing::info!("Shutting down");
        shutdown.cancel();
        for (name, handle) in [("reaper", reaper), ("countries refresher", refresher)] {
            if let Err(err) = handle.await {
                tracing::error!(task = name, error = %err, "Background task ended abnormally");
            }
        }
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).or_raise(|| ErrorKind::Output)?;
    writeln!(stdout).or_raise(|| ErrorKind::Output)
}
