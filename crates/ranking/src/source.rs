use crate::error::{ErrorKind, Result};
use crate::models::CountryUser;
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/gayanvoice/top-github-users/main/cache";
pub const DEFAULT_COUNTRIES_URL: &str = "https://api.github.com/repos/gayanvoice/top-github-users/contents/cache";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("ghstats/", env!("CARGO_PKG_VERSION"));

pub type LeaderboardHandle = Arc<dyn LeaderboardSource>;

/// Where country leaderboards come from.
#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    /// Ranked users of one country, keyed by its normalized name.
    async fn fetch_country(&self, country: &str) -> Result<Vec<CountryUser>>;

    /// Normalized names of every country the source publishes, sorted.
    async fn list_countries(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct LeaderboardOptions {
    /// Directory holding one `<country>.json` file per country.
    pub base_url: String,
    /// GitHub contents listing of the same directory.
    pub countries_url: String,
    pub timeout: Duration,
}
impl Default for LeaderboardOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            countries_url: DEFAULT_COUNTRIES_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Leaderboards published as static JSON files over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLeaderboard {
    http: reqwest::Client,
    base_url: String,
    countries_url: String,
}

impl HttpLeaderboard {
    pub fn new(options: LeaderboardOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            countries_url: options.countries_url,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, resource: &str) -> Result<T> {
        let response = self.http.get(url).send().await.or_raise(|| ErrorKind::Transient(resource.to_string()))?;
        match response.status() {
            StatusCode::OK => {},
            StatusCode::NOT_FOUND => exn::bail!(ErrorKind::NotFound(resource.to_string())),
            status => exn::bail!(ErrorKind::Transient(format!("{resource}: HTTP {status}"))),
        }
        let body = response.bytes().await.or_raise(|| ErrorKind::Transient(resource.to_string()))?;
        serde_json::from_slice(&body).or_raise(|| ErrorKind::Invalid(resource.to_string()))
    }
}

#[derive(Deserialize)]
struct DirectoryEntry {
    name: String,
}

#[async_trait]
impl LeaderboardSource for HttpLeaderboard {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_country(&self, country: &str) -> Result<Vec<CountryUser>> {
        self.get_json(&format!("{}/{country}.json", self.base_url), country).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_countries(&self) -> Result<Vec<String>> {
        let entries: Vec<DirectoryEntry> = self.get_json(&self.countries_url, "countries").await?;
        let mut countries: Vec<String> =
            entries.into_iter().filter_map(|entry| entry.name.strip_suffix(".json").map(str::to_string)).collect();
        countries.sort();
        Ok(countries)
    }
}
