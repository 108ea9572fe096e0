//! HTTP implementation of [`Upstream`] backed by the GitHub REST and GraphQL
//! APIs.

use crate::error::{ErrorKind, Result};
use crate::models::{Commit, ContributionCalendar, ContributionDay, ContributionWeek, Profile, Repository, Visibility};
use crate::upstream::Upstream;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tracing::instrument;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
// GitHub's maximum page size for list endpoints.
const PAGE_SIZE: usize = 100;
const SEARCH_PAGE_SIZE: usize = 20;
const USER_AGENT: &str = concat!("ghstats/", env!("CARGO_PKG_VERSION"));

const CALENDAR_QUERY: &str = r#"
    query($login: String!) {
        user(login: $login) {
            contributionsCollection {
                contributionCalendar {
                    totalContributions
                    weeks { contributionDays { contributionCount date contributionLevel } }
                }
            }
        }
    }
"#;

const LANGUAGES_QUERY: &str = r#"
    query($login: String!) {
        user(login: $login) {
            repositories(first: 100, ownerAffiliations: OWNER) {
                nodes { languages(first: 10) { edges { node { name color } } } }
            }
        }
    }
"#;

/// Connection settings for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_url: String,
    pub graphql_url: String,
    /// Absolute per-request timeout. A request exceeding it is reported as
    /// [`ErrorKind::Transient`].
    pub timeout: Duration,
    pub token: Option<String>,
}
impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token: None,
        }
    }
}

/// GitHub API client.
///
/// Cheap to clone; clones share the underlying connection pool. Use
/// [`with_token`](Self::with_token) to derive a client that acts on behalf of
/// a signed-in user.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    graphql_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self {
            http,
            api_url: options.api_url.trim_end_matches('/').to_string(),
            graphql_url: options.graphql_url,
            token: options.token.filter(|token| !token.is_empty()),
        })
    }

    /// A client sharing this one's connection pool but authenticating with
    /// `token` instead.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self { token: Some(token.into()), ..self.clone() }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_get(path).await?;
        decode(response, path).await
    }

    async fn send_get(&self, path: &str) -> Result<Response> {
        self.send(self.rest(path), path).await
    }

    fn rest(&self, path: &str) -> RequestBuilder {
        let request = self.http.get(format!("{}{}", self.api_url, path)).header(ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        let response = request.send().await.or_raise(|| ErrorKind::Transient(path.to_string()))?;
        tracing::debug!(path, status = response.status().as_u16(), "GitHub REST response");
        Ok(response)
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, login: &str) -> Result<T> {
        let mut request = self.http.post(&self.graphql_url).json(&json!({
            "query": query,
            "variables": { "login": login },
        }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.or_raise(|| ErrorKind::Transient(format!("graphql:{login}")))?;
        let envelope: GraphqlResponse<T> = decode(response, login).await?;
        if let Some(error) = envelope.errors.first() {
            match error.kind.as_deref() {
                Some("RATE_LIMITED") => exn::bail!(ErrorKind::RateLimited),
                Some("NOT_FOUND") => exn::bail!(ErrorKind::NotFound(login.to_string())),
                _ if envelope.data.is_none() => exn::bail!(ErrorKind::Invalid(error.message.clone())),
                _ => tracing::warn!(login, message = %error.message, "GraphQL returned partial data"),
            }
        }
        envelope.data.ok_or_raise(|| ErrorKind::Invalid(format!("graphql response without data for {login}")))
    }
}

/// Maps an HTTP status onto the upstream error taxonomy.
///
/// GitHub signals an exhausted primary quota with `403` plus
/// `x-ratelimit-remaining: 0`, and secondary limits with `429`. Any other
/// `403` is a genuine permission problem.
fn classify(status: StatusCode, headers: &HeaderMap, resource: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let quota_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|remaining| remaining.trim() == "0");
    match status {
        StatusCode::NOT_FOUND => exn::bail!(ErrorKind::NotFound(resource.to_string())),
        StatusCode::TOO_MANY_REQUESTS => exn::bail!(ErrorKind::RateLimited),
        StatusCode::FORBIDDEN if quota_exhausted => exn::bail!(ErrorKind::RateLimited),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => exn::bail!(ErrorKind::Forbidden(resource.to_string())),
        status if status.is_server_error() => exn::bail!(ErrorKind::Transient(format!("{resource}: HTTP {status}"))),
        status => exn::bail!(ErrorKind::Invalid(format!("{resource}: unexpected HTTP {status}"))),
    }
}

async fn decode<T: DeserializeOwned>(response: Response, resource: &str) -> Result<T> {
    classify(response.status(), response.headers(), resource)?;
    let body = response.bytes().await.or_raise(|| ErrorKind::Transient(resource.to_string()))?;
    serde_json::from_slice(&body).or_raise(|| ErrorKind::Invalid(resource.to_string()))
}

fn level_to_number(level: &str) -> u8 {
    match level {
        "FIRST_QUARTILE" => 1,
        "SECOND_QUARTILE" => 2,
        "THIRD_QUARTILE" => 3,
        "FOURTH_QUARTILE" => 4,
        _ => 0,
    }
}

#[async_trait]
impl Upstream for GithubClient {
    #[instrument(level = "debug", skip(self))]
    async fn profile(&self, username: &str) -> Result<Profile> {
        self.get(&format!("/users/{username}")).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn repositories(&self, username: &str, visibility: Visibility) -> Result<Vec<Repository>> {
        let mut repositories = Vec::new();
        for page in 1.. {
            let path = match visibility {
                Visibility::Public => {
                    format!("/users/{username}/repos?sort=updated&per_page={PAGE_SIZE}&page={page}")
                },
                Visibility::Private | Visibility::All => format!(
                    "/user/repos?sort=updated&per_page={PAGE_SIZE}&page={page}&affiliation=owner&visibility={visibility}"
                ),
            };
            let batch: Vec<Repository> = self.get(&path).await?;
            let fetched = batch.len();
            // `/user/repos` lists the token owner's repositories, whoever was asked for.
            let owned = |repo: &Repository| matches!(visibility, Visibility::Public) || repo.is_owned_by(username);
            repositories.extend(
                batch.into_iter().filter(|repo| !repo.fork && !repo.archived && visibility.admits(repo) && owned(repo)),
            );
            if fetched < PAGE_SIZE {
                break;
            }
        }
        Ok(repositories)
    }

    #[instrument(level = "debug", skip(self))]
    async fn contribution_calendar(&self, username: &str) -> Result<ContributionCalendar> {
        let data: CalendarData = self.graphql(CALENDAR_QUERY, username).await?;
        let user = data.user.ok_or_raise(|| ErrorKind::NotFound(username.to_string()))?;
        let calendar = user.contributions_collection.contribution_calendar;
        let weeks = calendar
            .weeks
            .into_iter()
            .map(|week| {
                let days = week
                    .contribution_days
                    .into_iter()
                    .map(|day| {
                        let date = Date::parse(&day.date, time::macros::format_description!("[year]-[month]-[day]"))
                            .or_raise(|| ErrorKind::Invalid(format!("contribution date {}", day.date)))?;
                        Ok(ContributionDay { date, count: day.contribution_count, level: level_to_number(&day.contribution_level) })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ContributionWeek { days })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ContributionCalendar { weeks, total: calendar.total_contributions })
    }

    #[instrument(level = "debug", skip(self))]
    async fn commits(&self, owner: &str, repo: &str) -> Result<Vec<Commit>> {
        let mut commits = Vec::new();
        for page in 1.. {
            let path = format!("/repos/{owner}/{repo}/commits?per_page={PAGE_SIZE}&page={page}");
            let response = self.send_get(&path).await?;
            // An empty repository has no default branch to list.
            if response.status() == StatusCode::CONFLICT {
                break;
            }
            let batch: Vec<CommitItem> = decode(response, &path).await?;
            let fetched = batch.len();
            for item in batch {
                commits.push(item.into_commit(repo)?);
            }
            if fetched < PAGE_SIZE {
                break;
            }
        }
        Ok(commits)
    }

    #[instrument(level = "debug", skip(self))]
    async fn language_colors(&self, username: &str) -> Result<HashMap<String, String>> {
        let data: LanguagesData = self.graphql(LANGUAGES_QUERY, username).await?;
        let user = data.user.ok_or_raise(|| ErrorKind::NotFound(username.to_string()))?;
        let colors = user
            .repositories
            .nodes
            .into_iter()
            .flat_map(|node| node.languages.edges)
            .filter_map(|edge| edge.node.color.filter(|color| !color.is_empty()).map(|color| (edge.node.name, color)))
            .collect();
        Ok(colors)
    }

    #[instrument(level = "debug", skip(self))]
    async fn search_users(&self, query: &str) -> Result<Vec<Profile>> {
        let path = "/search/users";
        let request = self.rest(path).query(&[("q", query)]).query(&[("per_page", SEARCH_PAGE_SIZE)]);
        let response = self.send(request, path).await?;
        let results: SearchResults = decode(response, path).await?;
        Ok(results.items)
    }

    #[instrument(level = "debug", skip(self))]
    async fn followers(&self, username: &str) -> Result<Vec<Profile>> {
        self.get(&format!("/users/{username}/followers?per_page={PAGE_SIZE}")).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn following(&self, username: &str) -> Result<Vec<Profile>> {
        self.get(&format!("/users/{username}/following?per_page={PAGE_SIZE}")).await
    }
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default)]
    items: Vec<Profile>,
}

#[derive(Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct CalendarData {
    user: Option<CalendarUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarUser {
    contributions_collection: CalendarCollection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarCollection {
    contribution_calendar: RawCalendar,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCalendar {
    total_contributions: u32,
    weeks: Vec<RawWeek>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWeek {
    contribution_days: Vec<RawDay>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDay {
    contribution_count: u32,
    date: String,
    #[serde(default)]
    contribution_level: String,
}

#[derive(Deserialize)]
struct LanguagesData {
    user: Option<LanguagesUser>,
}

#[derive(Deserialize)]
struct LanguagesUser {
    repositories: LanguageRepositories,
}

#[derive(Deserialize)]
struct LanguageRepositories {
    nodes: Vec<LanguageNode>,
}

#[derive(Deserialize)]
struct LanguageNode {
    languages: LanguageEdges,
}

#[derive(Deserialize)]
struct LanguageEdges {
    edges: Vec<LanguageEdge>,
}

#[derive(Deserialize)]
struct LanguageEdge {
    node: Language,
}

#[derive(Deserialize)]
struct Language {
    name: String,
    color: Option<String>,
}

#[derive(Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitDetail,
    #[serde(default)]
    html_url: String,
}

#[derive(Deserialize)]
struct CommitDetail {
    #[serde(default)]
    message: String,
    author: Option<CommitSignature>,
    committer: Option<CommitSignature>,
}

#[derive(Deserialize)]
struct CommitSignature {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    date: String,
}

impl CommitItem {
    fn into_commit(self, repo: &str) -> Result<Commit> {
        let signature = self
            .commit
            .author
            .or(self.commit.committer)
            .ok_or_raise(|| ErrorKind::Invalid(format!("commit {} has no author or committer", self.sha)))?;
        let date = OffsetDateTime::parse(&signature.date, &Rfc3339)
            .or_raise(|| ErrorKind::Invalid(format!("commit {} date {}", self.sha, signature.date)))?;
        Ok(Commit {
            sha: self.sha,
            message: self.commit.message,
            author: signature.name,
            email: signature.email,
            date,
            url: self.html_url,
            repo: repo.to_string(),
        })
    }
}
