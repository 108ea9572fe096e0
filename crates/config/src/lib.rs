//! Layered configuration.
//!
//! Sources, lowest precedence first: built-in defaults, a TOML, YAML or JSON
//! file, `GHSTATS_`-prefixed environment variables, and finally the
//! conventional `GITHUB_TOKEN`. Nested keys are separated by `__` in the
//! environment, so `GHSTATS_CACHE__STATS_TTL_SECS=60` sets
//! `cache.stats_ttl_secs`.
//!
//! Durations are whole seconds throughout.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use ghstats_github::ClientOptions;
use ghstats_ranking::{LeaderboardOptions, RankingConfig};
use ghstats_service::DEFAULT_BACKFILL_CONCURRENCY;
use ghstats_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "GHSTATS_";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub cache: CacheConfig,
    pub ranking: RankingSection,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Server-side token for anonymous viewers. Without one, upstream allows
    /// far fewer requests per hour.
    pub token: Option<String>,
    pub api_url: String,
    pub graphql_url: String,
    pub timeout_secs: u64,
    pub backfill_concurrency: usize,
}
impl Default for GithubConfig {
    fn default() -> Self {
        let client = ClientOptions::default();
        Self {
            token: None,
            api_url: client.api_url,
            graphql_url: client.graphql_url,
            timeout_secs: client.timeout.as_secs(),
            backfill_concurrency: DEFAULT_BACKFILL_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub stats_ttl_secs: u64,
    pub state_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub reap_interval_secs: u64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        let store = StoreConfig::default();
        Self {
            stats_ttl_secs: store.stats_ttl.as_secs(),
            state_ttl_secs: store.state_ttl.as_secs(),
            session_ttl_secs: store.session_ttl.as_secs(),
            reap_interval_secs: store.reap_interval.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSection {
    pub base_url: String,
    pub countries_url: String,
    pub ttl_secs: u64,
    pub countries_ttl_secs: u64,
    pub timeout_secs: u64,
}
impl Default for RankingSection {
    fn default() -> Self {
        let source = LeaderboardOptions::default();
        let ranking = RankingConfig::default();
        Self {
            base_url: source.base_url,
            countries_url: source.countries_url,
            ttl_secs: ranking.ranking_ttl.as_secs(),
            countries_ttl_secs: ranking.countries_ttl.as_secs(),
            timeout_secs: source.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
    /// Fallback filter directive when `RUST_LOG` is unset.
    pub filter: String,
}
impl Default for LogConfig {
    fn default() -> Self {
        Self { json: false, filter: "info".to_string() }
    }
}

impl Config {
    /// Loads and validates configuration from every source.
    ///
    /// An explicit `path` must exist. Without one, the platform config
    /// directory is consulted and silently skipped when it holds no file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path
            && !path.is_file()
        {
            exn::bail!(ErrorKind::Load(format!("no configuration file at {}", path.display())));
        }
        let path = path.map(Path::to_path_buf).or_else(default_path);
        let config = Self::from_figment(Self::figment(path.as_deref()))?;
        config.validate()?;
        Ok(config)
    }

    /// Every source merged, without extraction or validation.
    pub fn figment(path: Option<&Path>) -> Figment {
        with_file(Figment::from(Serialized::defaults(Config::default())), path)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["GITHUB_TOKEN"]).map(|_| "github.token".into()))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().map_err(|err| exn::Exn::from(ErrorKind::Load(err.to_string())))
    }

    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("github.timeout_secs", self.github.timeout_secs),
            ("cache.stats_ttl_secs", self.cache.stats_ttl_secs),
            ("cache.state_ttl_secs", self.cache.state_ttl_secs),
            ("cache.session_ttl_secs", self.cache.session_ttl_secs),
            ("cache.reap_interval_secs", self.cache.reap_interval_secs),
            ("ranking.ttl_secs", self.ranking.ttl_secs),
            ("ranking.countries_ttl_secs", self.ranking.countries_ttl_secs),
            ("ranking.timeout_secs", self.ranking.timeout_secs),
        ];
        if let Some((key, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            exn::bail!(ErrorKind::Invalid(format!("{key} must be greater than zero")));
        }
        let urls = [
            ("github.api_url", &self.github.api_url),
            ("github.graphql_url", &self.github.graphql_url),
            ("ranking.base_url", &self.ranking.base_url),
            ("ranking.countries_url", &self.ranking.countries_url),
        ];
        if let Some((key, _)) = urls.iter().find(|(_, url)| url.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid(format!("{key} must not be empty")));
        }
        if self.github.backfill_concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("github.backfill_concurrency must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            api_url: self.github.api_url.clone(),
            graphql_url: self.github.graphql_url.clone(),
            timeout: Duration::from_secs(self.github.timeout_secs),
            token: self.github.token.clone(),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            stats_ttl: Duration::from_secs(self.cache.stats_ttl_secs),
            state_ttl: Duration::from_secs(self.cache.state_ttl_secs),
            session_ttl: Duration::from_secs(self.cache.session_ttl_secs),
            reap_interval: Duration::from_secs(self.cache.reap_interval_secs),
        }
    }

    pub fn ranking_config(&self) -> RankingConfig {
        RankingConfig {
            ranking_ttl: Duration::from_secs(self.ranking.ttl_secs),
            countries_ttl: Duration::from_secs(self.ranking.countries_ttl_secs),
        }
    }

    pub fn leaderboard_options(&self) -> LeaderboardOptions {
        LeaderboardOptions {
            base_url: self.ranking.base_url.clone(),
            countries_url: self.ranking.countries_url.clone(),
            timeout: Duration::from_secs(self.ranking.timeout_secs),
        }
    }
}

/// `config.toml` in the platform configuration directory, if one exists.
pub fn default_path() -> Option<PathBuf> {
    let path = ProjectDirs::from("", "", "ghstats")?.config_dir().join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

/// Merges `path` into `figment`, picking the format from the extension.
/// Unrecognized extensions are read as TOML.
fn with_file(figment: Figment, path: Option<&Path>) -> Figment {
    let Some(path) = path else {
        return figment;
    };
    tracing::debug!(path = %path.display(), "Reading configuration file");
    match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}
