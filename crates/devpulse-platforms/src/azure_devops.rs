use crate::error::{FetchError, Result};
use crate::fetcher::{non_empty, send_json, ConnectionCheck, FetchWindow, Fetcher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devpulse_core::{AzureDevOpsData, LinkedPullRequest, Platform, PlatformPayload, WorkItem};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const AZURE_DEVOPS_URL: &str = "https://dev.azure.com";
const API_VERSION: &str = "6.0";

/// `workitemsbatch` accepts at most 200 ids per call.
const BATCH_SIZE: usize = 200;

/// Builds and pull requests requested per listing.
const LIST_TOP: &str = "100";

/// Values accepted by the pull request `status` filter.
pub const PULL_REQUEST_STATUSES: [&str; 4] = ["active", "completed", "abandoned", "all"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureDevOpsConfig {
    pub pat: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub area_path: Option<String>,
    pub base_url: String,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            pat: None,
            organization: None,
            project: None,
            area_path: None,
            base_url: AZURE_DEVOPS_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WiqlRef>,
}

#[derive(Debug, Deserialize)]
struct WiqlRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    value: Vec<ApiWorkItem>,
}

#[derive(Debug, Deserialize)]
struct ApiWorkItem {
    id: u64,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    relations: Vec<ApiRelation>,
}

#[derive(Debug, Deserialize)]
struct ApiRelation {
    #[serde(default)]
    rel: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiNamed {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiIdentity {
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiBuild {
    id: u64,
    build_number: Option<String>,
    status: Option<String>,
    result: Option<String>,
    queue_time: Option<DateTime<Utc>>,
    finish_time: Option<DateTime<Utc>>,
    source_branch: Option<String>,
    definition: Option<ApiNamed>,
    requested_for: Option<ApiIdentity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGitPullRequest {
    pull_request_id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    is_draft: bool,
    created_by: Option<ApiIdentity>,
    creation_date: Option<DateTime<Utc>>,
    closed_date: Option<DateTime<Utc>>,
    repository: Option<ApiNamed>,
    source_ref_name: Option<String>,
    target_ref_name: Option<String>,
}

/// A pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Build {
    pub id: u64,
    pub number: Option<String>,
    pub definition: Option<String>,
    pub status: Option<String>,
    pub result: Option<String>,
    pub source_branch: Option<String>,
    pub requested_for: Option<String>,
    pub queue_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
}

impl From<ApiBuild> for Build {
    fn from(build: ApiBuild) -> Self {
        let duration_secs = match (build.queue_time, build.finish_time) {
            (Some(queued), Some(finished)) => Some((finished - queued).num_seconds()),
            _ => None,
        };
        Self {
            id: build.id,
            number: build.build_number,
            definition: build.definition.map(|d| d.name),
            status: build.status,
            result: build.result,
            source_branch: build.source_branch,
            requested_for: build.requested_for.map(|i| i.display_name),
            queue_time: build.queue_time,
            finish_time: build.finish_time,
            duration_secs,
        }
    }
}

/// A pull request from the project's Git repositories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GitPullRequest {
    pub id: u64,
    pub title: String,
    pub status: String,
    pub draft: bool,
    pub author: Option<String>,
    pub repository: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<ApiGitPullRequest> for GitPullRequest {
    fn from(pr: ApiGitPullRequest) -> Self {
        Self {
            id: pr.pull_request_id,
            title: pr.title,
            status: pr.status,
            draft: pr.is_draft,
            author: pr.created_by.map(|i| i.display_name),
            repository: pr.repository.map(|r| r.name),
            source_branch: pr.source_ref_name,
            target_branch: pr.target_ref_name,
            created_at: pr.creation_date,
            closed_at: pr.closed_date,
        }
    }
}

/// Credentials and API root resolved for one request.
struct Target<'a> {
    pat: &'a str,
    api: String,
    project: &'a str,
    area_path: Option<&'a str>,
}

#[derive(Debug, PartialEq)]
enum Link {
    PullRequest { repository: String, number: Option<String> },
    Commit,
}

pub struct AzureDevOpsFetcher {
    config: AzureDevOpsConfig,
    client: Client,
}

impl AzureDevOpsFetcher {
    pub fn new(config: AzureDevOpsConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn pat(&self) -> Result<&str> {
        non_empty(self.config.pat.as_deref())
            .ok_or_else(|| FetchError::not_configured(Platform::AzureDevOps, "AZURE_DEVOPS_PAT"))
    }

    /// Organization and project come from the request first, then configuration.
    fn target<'a>(&'a self, window: &'a FetchWindow) -> Result<Target<'a>> {
        let missing = |what: &str| FetchError::not_configured(Platform::AzureDevOps, what);
        let pat = self.pat()?;
        let organization = non_empty(window.organization.as_deref())
            .or(non_empty(self.config.organization.as_deref()))
            .ok_or_else(|| missing("organization"))?;
        let project = non_empty(window.project.as_deref())
            .or(non_empty(self.config.project.as_deref()))
            .ok_or_else(|| missing("project"))?;
        let area_path = non_empty(window.area_path.as_deref())
            .or(non_empty(self.config.area_path.as_deref()));
        Ok(Target {
            pat,
            api: format!(
                "{}/{}/{}/_apis",
                self.config.base_url.trim_end_matches('/'),
                organization,
                project
            ),
            project,
            area_path,
        })
    }

    /// Builds queued within the window, newest first.
    pub async fn builds(&self, window: &FetchWindow) -> Result<Vec<Build>> {
        let target = self.target(window)?;
        let since = window.since_days()?;
        let min_time = since.to_rfc3339();
        let response: ListResponse<ApiBuild> = send_json(
            self.client
                .get(format!("{}/build/builds", target.api))
                .query(&[
                    ("api-version", API_VERSION),
                    ("$top", LIST_TOP),
                    ("queryOrder", "queueTimeDescending"),
                    ("minTime", min_time.as_str()),
                ])
                .basic_auth("", Some(target.pat)),
        )
        .await?;
        Ok(response
            .value
            .into_iter()
            .filter(|b| b.queue_time.map_or(true, |t| t >= since))
            .map(Build::from)
            .collect())
    }

    /// Git pull requests created within the window. `status` is one of
    /// [`PULL_REQUEST_STATUSES`] and defaults to `all`.
    pub async fn pull_requests(
        &self,
        window: &FetchWindow,
        status: Option<&str>,
    ) -> Result<Vec<GitPullRequest>> {
        let status = non_empty(status).unwrap_or("all").to_ascii_lowercase();
        if !PULL_REQUEST_STATUSES.contains(&status.as_str()) {
            return Err(FetchError::InvalidRequest(format!(
                "unknown pull request status '{}', expected one of {}",
                status,
                PULL_REQUEST_STATUSES.join(", ")
            )));
        }
        let target = self.target(window)?;
        let since = window.since_days()?;
        let response: ListResponse<ApiGitPullRequest> = send_json(
            self.client
                .get(format!("{}/git/pullrequests", target.api))
                .query(&[
                    ("api-version", API_VERSION),
                    ("$top", LIST_TOP),
                    ("searchCriteria.status", status.as_str()),
                ])
                .basic_auth("", Some(target.pat)),
        )
        .await?;
        Ok(response
            .value
            .into_iter()
            .filter(|pr| pr.creation_date.map_or(true, |t| t >= since))
            .map(GitPullRequest::from)
            .collect())
    }

    async fn query_ids(&self, api: &str, pat: &str, wiql: String) -> Result<Vec<u64>> {
        let response: WiqlResponse = send_json(
            self.client
                .post(format!("{}/wit/wiql", api))
                .query(&[("api-version", API_VERSION)])
                .basic_auth("", Some(pat))
                .json(&json!({ "query": wiql })),
        )
        .await?;
        Ok(response.work_items.into_iter().map(|w| w.id).collect())
    }

    async fn load_items(&self, api: &str, pat: &str, ids: &[u64]) -> Result<Vec<ApiWorkItem>> {
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(BATCH_SIZE) {
            debug!(count = chunk.len(), "Fetching work item batch");
            let batch: BatchResponse = send_json(
                self.client
                    .post(format!("{}/wit/workitemsbatch", api))
                    .query(&[("api-version", API_VERSION)])
                    .basic_auth("", Some(pat))
                    .json(&json!({ "ids": chunk, "$expand": "relations" })),
            )
            .await?;
            items.extend(batch.value);
        }
        Ok(items)
    }
}

#[async_trait]
impl Fetcher for AzureDevOpsFetcher {
    fn platform(&self) -> Platform {
        Platform::AzureDevOps
    }

    fn is_configured(&self) -> bool {
        non_empty(self.config.pat.as_deref()).is_some()
    }

    async fn fetch(&self, window: &FetchWindow) -> Result<PlatformPayload> {
        let target = self.target(window)?;
        let since = window.since_days()?.format("%Y-%m-%d").to_string();
        let wiql = build_wiql(target.project, target.area_path, &since);
        let ids = self.query_ids(&target.api, target.pat, wiql).await?;
        let items = self.load_items(&target.api, target.pat, &ids).await?;

        let data = summarize(items);
        info!(
            work_items = data.work_items.len(),
            prs = data.pull_requests.len(),
            "Fetched Azure DevOps analytics"
        );
        Ok(PlatformPayload::AzureDevOps(data))
    }

    async fn check(&self) -> Result<ConnectionCheck> {
        let pat = self.pat()?;
        let organization = non_empty(self.config.organization.as_deref())
            .ok_or_else(|| FetchError::not_configured(Platform::AzureDevOps, "AZURE_DEVOPS_ORG"))?;
        let projects: ListResponse<ApiNamed> = send_json(
            self.client
                .get(format!(
                    "{}/{}/_apis/projects",
                    self.config.base_url.trim_end_matches('/'),
                    organization
                ))
                .query(&[("api-version", API_VERSION)])
                .basic_auth("", Some(pat)),
        )
        .await?;

        let mut check = ConnectionCheck::new(Platform::AzureDevOps).with(format!(
            "{} projects visible in {}",
            projects.value.len(),
            organization
        ));
        if let Some(project) = non_empty(self.config.project.as_deref()) {
            if projects.value.iter().any(|p| p.name == project) {
                check = check.with(format!("project {} found", project));
            } else {
                check = check.with(format!("project {} is not visible to this token", project));
            }
        }
        Ok(check)
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn build_wiql(project: &str, area_path: Option<&str>, since: &str) -> String {
    let mut wiql = format!(
        "SELECT [System.Id] FROM WorkItems WHERE [System.TeamProject] = '{}' AND [System.ChangedDate] >= '{}'",
        escape(project),
        since
    );
    if let Some(area) = area_path {
        wiql.push_str(&format!(" AND [System.AreaPath] UNDER '{}'", escape(area)));
    }
    wiql.push_str(" ORDER BY [System.ChangedDate] DESC");
    wiql
}

fn field_str(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(identity) => identity
            .get("displayName")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Classify a work item relation as a pull request or commit link.
fn classify(relation: &ApiRelation) -> Option<Link> {
    let url = relation.url.replace("%2f", "%2F");
    let lower = url.to_lowercase();

    if relation.rel.eq_ignore_ascii_case("ArtifactLink") {
        if let Some(rest) = url.strip_prefix("vstfs:///Git/PullRequestId/") {
            let parts: Vec<&str> = rest.split("%2F").collect();
            return Some(Link::PullRequest {
                repository: parts.get(1).copied().unwrap_or(rest).to_string(),
                number: parts.get(2).map(|n| n.to_string()),
            });
        }
        if let Some(rest) = url.strip_prefix("vstfs:///GitHub/PullRequest/") {
            let (repo, number) = rest.split_once("%2F").unwrap_or((rest, ""));
            return Some(Link::PullRequest {
                repository: format!("GitHub-{}", repo.chars().take(8).collect::<String>()),
                number: Some(number.to_string()).filter(|n| !n.is_empty()),
            });
        }
        if lower.contains("/commit/") {
            return Some(Link::Commit);
        }
    }

    if lower.contains("github.com/") && lower.contains("/pull/") {
        let path = url.split("github.com/").nth(1).unwrap_or_default();
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() >= 4 {
            return Some(Link::PullRequest {
                repository: format!("{}/{}", segments[0], segments[1]),
                number: Some(segments[3].to_string()),
            });
        }
    }
    if let Some(idx) = lower.find("/_git/") {
        if lower.contains("/pullrequest/") {
            let repo = url[idx + "/_git/".len()..].split('/').next().unwrap_or_default();
            let number = url.rsplit('/').next().map(str::to_string);
            return Some(Link::PullRequest {
                repository: repo.to_string(),
                number,
            });
        }
    }
    None
}

fn summarize(items: Vec<ApiWorkItem>) -> AzureDevOpsData {
    let mut data = AzureDevOpsData {
        total_work_items: Some(items.len() as u64),
        ..Default::default()
    };
    let mut repositories = BTreeSet::new();

    for item in items {
        let work_item_type =
            field_str(&item.fields, "System.WorkItemType").unwrap_or_else(|| "Unknown".into());
        let state = field_str(&item.fields, "System.State").unwrap_or_else(|| "Unknown".into());
        *data.work_items_by_type.entry(work_item_type.clone()).or_default() += 1;
        *data.work_items_by_state.entry(state.clone()).or_default() += 1;

        for relation in &item.relations {
            match classify(relation) {
                Some(Link::PullRequest { repository, number }) => {
                    let title = relation
                        .attributes
                        .get("name")
                        .and_then(Value::as_str)
                        .filter(|n| !n.is_empty() && *n != "Pull Request")
                        .map(str::to_string)
                        .or_else(|| number.map(|n| format!("PR #{}", n)))
                        .unwrap_or_else(|| "Pull Request".to_string());
                    repositories.insert(repository.clone());
                    data.pull_requests.push(LinkedPullRequest {
                        title,
                        url: relation.url.clone(),
                        repository,
                        work_item_id: Some(item.id),
                    });
                }
                Some(Link::Commit) => data.total_commits += 1,
                None => {}
            }
        }

        data.work_items.push(WorkItem {
            id: item.id,
            title: field_str(&item.fields, "System.Title").unwrap_or_default(),
            work_item_type,
            state,
            assigned_to: field_str(&item.fields, "System.AssignedTo"),
            created_date: field_str(&item.fields, "System.CreatedDate")
                .and_then(|d| DateTime::parse_from_rfc3339(&d).ok())
                .map(|d| d.with_timezone(&Utc)),
        });
    }

    data.total_pull_requests = Some(data.pull_requests.len() as u64);
    data.total_repositories = Some(repositories.len() as u64);
    data.repositories = repositories.into_iter().collect();
    data
}
