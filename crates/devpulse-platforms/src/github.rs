use crate::error::{FetchError, Result};
use crate::fetcher::{non_empty, send_json, ConnectionCheck, FetchWindow, Fetcher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devpulse_core::{GithubData, Platform, PlatformPayload, PullRequest, Repository};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Most recent pull requests kept in the payload.
const RECENT_PRS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub token: Option<String>,
    /// `owner/repo` entries.
    pub repos: Vec<String>,
    pub base_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: None,
            repos: Vec::new(),
            base_url: GITHUB_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    id: u64,
    number: u64,
    #[serde(default)]
    title: String,
    state: String,
    html_url: Option<String>,
    user: Option<ApiUser>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ApiPullDetail {
    number: u64,
    #[serde(default)]
    title: String,
    state: String,
    body: Option<String>,
    html_url: Option<String>,
    user: Option<ApiUser>,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changed_files: u64,
    #[serde(default)]
    commits: u64,
    #[serde(default)]
    comments: u64,
    #[serde(default)]
    review_comments: u64,
    head: Option<ApiRef>,
    base: Option<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    name: String,
}

/// One pull request with its size and review activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRequestDetail {
    pub repository: String,
    pub number: u64,
    pub title: String,
    pub state: String,
    pub merged: bool,
    pub draft: bool,
    pub author: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub head: Option<String>,
    pub base: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub commits: u64,
    pub comments: u64,
    pub review_comments: u64,
}

impl PullRequestDetail {
    fn from_api(repository: &str, pr: ApiPullDetail) -> Self {
        Self {
            repository: repository.to_string(),
            number: pr.number,
            title: pr.title,
            state: pr.state,
            merged: pr.merged_at.is_some(),
            draft: pr.draft,
            author: pr.user.map(|u| u.login),
            body: pr.body,
            url: pr.html_url,
            created_at: pr.created_at,
            merged_at: pr.merged_at,
            head: pr.head.map(|r| r.name),
            base: pr.base.map(|r| r.name),
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
            commits: pr.commits,
            comments: pr.comments,
            review_comments: pr.review_comments,
        }
    }
}

pub struct GithubFetcher {
    config: GithubConfig,
    client: Client,
}

impl GithubFetcher {
    pub fn new(config: GithubConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn token(&self) -> Result<&str> {
        non_empty(self.config.token.as_deref())
            .ok_or_else(|| FetchError::not_configured(Platform::Github, "GITHUB_TOKEN"))
    }

    fn get(&self, token: &str, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{}", self.config.base_url.trim_end_matches('/'), path))
            .header("Authorization", format!("token {}", token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    async fn list_pulls(&self, token: &str, repo: &str) -> Result<Vec<ApiPull>> {
        debug!(repo, "Fetching pull requests");
        send_json(
            self.get(token, &format!("repos/{}/pulls", repo))
                .query(&[
                    ("state", "all"),
                    ("per_page", "100"),
                    ("sort", "updated"),
                    ("direction", "desc"),
                ]),
        )
        .await
    }

    /// Details of pull request `number` in `repo`, or in the first configured
    /// repository when `repo` is not given.
    pub async fn pull_request(&self, repo: Option<&str>, number: u64) -> Result<PullRequestDetail> {
        let token = self.token()?;
        let repo = non_empty(repo)
            .or_else(|| self.config.repos.first().map(String::as_str))
            .ok_or_else(|| FetchError::not_configured(Platform::Github, "GITHUB_REPOS"))?;
        let pr: ApiPullDetail =
            send_json(self.get(token, &format!("repos/{}/pulls/{}", repo, number))).await?;
        Ok(PullRequestDetail::from_api(repo, pr))
    }
}

#[async_trait]
impl Fetcher for GithubFetcher {
    fn platform(&self) -> Platform {
        Platform::Github
    }

    fn is_configured(&self) -> bool {
        self.config.token.as_deref().is_some_and(|t| !t.is_empty()) && !self.config.repos.is_empty()
    }

    async fn fetch(&self, window: &FetchWindow) -> Result<PlatformPayload> {
        let token = self.token()?;
        let repos = if window.repos.is_empty() {
            &self.config.repos
        } else {
            &window.repos
        };
        if repos.is_empty() {
            return Err(FetchError::not_configured(Platform::Github, "GITHUB_REPOS"));
        }

        let cutoff = window.since_days()?;
        let mut pulls = Vec::new();
        let mut repositories = Vec::new();
        for repo in repos {
            let recent: Vec<ApiPull> = self
                .list_pulls(token, repo)
                .await?
                .into_iter()
                .filter(|pr| pr.created_at >= cutoff)
                .collect();
            repositories.push(Repository {
                name: repo.rsplit('/').next().unwrap_or(repo).to_string(),
                full_name: Some(repo.clone()),
                url: Some(format!("https://github.com/{}", repo)),
                pull_requests: recent.len() as u64,
            });
            pulls.extend(recent.into_iter().map(|pr| (repo.clone(), pr)));
        }

        let data = summarize(pulls, repositories);
        info!(
            prs = data.pull_requests.len(),
            repos = data.repositories.len(),
            "Fetched GitHub analytics"
        );
        Ok(PlatformPayload::Github(data))
    }

    async fn check(&self) -> Result<ConnectionCheck> {
        let token = self.token()?;
        let user: ApiUser = send_json(self.get(token, "user")).await?;
        let mut check =
            ConnectionCheck::new(Platform::Github).with(format!("authenticated as {}", user.login));
        for repo in &self.config.repos {
            let _: serde_json::Value = send_json(self.get(token, &format!("repos/{}", repo))).await?;
            check = check.with(format!("repository {} reachable", repo));
        }
        Ok(check)
    }
}

fn summarize(mut pulls: Vec<(String, ApiPull)>, repositories: Vec<Repository>) -> GithubData {
    let mut data = GithubData {
        total_pull_requests: Some(pulls.len() as u64),
        total_repositories: Some(repositories.len() as u64),
        repositories,
        ..Default::default()
    };

    for (_, pr) in &pulls {
        match pr.state.as_str() {
            "open" => data.open_prs += 1,
            "closed" => data.closed_prs += 1,
            _ => {}
        }
        if pr.merged_at.is_some() {
            data.merged_prs += 1;
        }
        let author = pr
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .unwrap_or_else(|| "unknown".to_string());
        *data.prs_by_author.entry(author).or_default() += 1;
        *data
            .prs_by_day
            .entry(pr.created_at.format("%Y-%m-%d").to_string())
            .or_default() += 1;
    }

    pulls.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
    data.pull_requests = pulls
        .into_iter()
        .take(RECENT_PRS)
        .map(|(repo, pr)| PullRequest {
            id: pr.id,
            number: Some(pr.number),
            title: pr.title,
            state: pr.state,
            author: pr.user.map(|u| u.login),
            repository: Some(repo),
            url: pr.html_url,
            created_at: Some(pr.created_at),
            merged_at: pr.merged_at,
        })
        .collect();
    data
}
