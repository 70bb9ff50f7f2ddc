//! Platform routes: every request fetches fresh data, records it, and returns
//! the payload or a chart shaped from it.
//!
//! Detail lookups (a single pull request, builds, Figma files) and connection
//! checks go straight to the platform and are not recorded.

use super::{fetch_error, ok, refresh_error, AppState};
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use axum_extra::extract::Query as MultiQuery;
use devpulse_core::charts::chart_for;
use devpulse_core::{LogDigest, Platform, PlatformPayload};
use devpulse_platforms::fetcher::{DEFAULT_DAYS, DEFAULT_HOURS, DEFAULT_LIMIT};
use devpulse_platforms::FetchWindow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read with `axum_extra`'s `Query` so `repos` may repeat.
#[derive(Debug, Default, Deserialize)]
pub struct GithubQuery {
    pub days: Option<u32>,
    #[serde(default, alias = "repos[]")]
    pub repos: Vec<String>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AzureQuery {
    pub days: Option<u32>,
    pub org: Option<String>,
    pub project: Option<String>,
    pub area_path: Option<String>,
    /// Pull request listing only.
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoQuery {
    pub repo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub team_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FigmaQuery {
    pub days: Option<u32>,
    pub team_id: Option<String>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub query: Option<String>,
    pub service: Option<String>,
    pub level: Option<String>,
    pub hours: Option<u32>,
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub chart_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogStats {
    pub total_logs: u64,
    pub by_level: BTreeMap<String, u64>,
    pub by_service: BTreeMap<String, u64>,
    pub services: Vec<String>,
}

impl From<LogDigest> for LogStats {
    fn from(digest: LogDigest) -> Self {
        Self {
            total_logs: digest.total_logs,
            by_level: digest.by_level,
            by_service: digest.by_service,
            services: digest.services,
        }
    }
}

/// Flatten `repos` values, each of which may hold a comma-separated list.
fn split_repos(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn github_window(q: &GithubQuery) -> FetchWindow {
    FetchWindow {
        days: q.days.unwrap_or(DEFAULT_DAYS),
        repos: split_repos(&q.repos),
        ..Default::default()
    }
}

fn azure_window(q: &AzureQuery) -> FetchWindow {
    FetchWindow {
        days: q.days.unwrap_or(DEFAULT_DAYS),
        organization: non_blank(q.org.clone()),
        project: non_blank(q.project.clone()),
        area_path: non_blank(q.area_path.clone()),
        ..Default::default()
    }
}

fn figma_window(q: &FigmaQuery) -> FetchWindow {
    FetchWindow {
        days: q.days.unwrap_or(DEFAULT_DAYS),
        team_id: non_blank(q.team_id.clone()),
        ..Default::default()
    }
}

fn logs_window(q: &LogsQuery) -> FetchWindow {
    FetchWindow {
        hours: q.hours.unwrap_or(DEFAULT_HOURS),
        limit: q.limit.unwrap_or(DEFAULT_LIMIT),
        query: non_blank(q.query.clone()),
        service: non_blank(q.service.clone()),
        level: non_blank(q.level.clone()),
        ..Default::default()
    }
}

async fn refresh(
    state: &AppState,
    platform: Platform,
    window: &FetchWindow,
) -> Result<PlatformPayload, Response> {
    state
        .refresher
        .refresh(platform, window)
        .await
        .map_err(refresh_error)
}

fn lookup<T: Serialize>(result: devpulse_platforms::Result<T>) -> Response {
    match result {
        Ok(data) => ok(data),
        Err(e) => fetch_error(e),
    }
}

async fn check(state: &AppState, platform: Platform) -> Response {
    let fetcher = state.refresher.fetchers().get(platform);
    lookup(fetcher.check().await)
}

fn chart(payload: &PlatformPayload, chart_type: Option<&str>, default: &str) -> Response {
    ok(chart_for(payload, chart_type.unwrap_or(default)))
}

// === GitHub ===

pub async fn github_prs(
    State(state): State<AppState>,
    MultiQuery(q): MultiQuery<GithubQuery>,
) -> Response {
    let window = github_window(&q);
    match refresh(&state, Platform::Github, &window).await {
        Ok(payload) => ok(payload),
        Err(resp) => resp,
    }
}

pub async fn github_chart(
    State(state): State<AppState>,
    MultiQuery(q): MultiQuery<GithubQuery>,
) -> Response {
    let window = github_window(&q);
    match refresh(&state, Platform::Github, &window).await {
        Ok(payload) => chart(&payload, q.chart_type.as_deref(), "overview"),
        Err(resp) => resp,
    }
}

pub async fn github_pr_detail(
    State(state): State<AppState>,
    Path(number): Path<u64>,
    Query(q): Query<RepoQuery>,
) -> Response {
    let repo = non_blank(q.repo);
    lookup(state.clients.github.pull_request(repo.as_deref(), number).await)
}

pub async fn github_test(State(state): State<AppState>) -> Response {
    check(&state, Platform::Github).await
}

// === Azure DevOps ===

pub async fn azuredevops_analytics(
    State(state): State<AppState>,
    Query(q): Query<AzureQuery>,
) -> Response {
    let window = azure_window(&q);
    match refresh(&state, Platform::AzureDevOps, &window).await {
        Ok(payload) => ok(payload),
        Err(resp) => resp,
    }
}

pub async fn azuredevops_chart(
    State(state): State<AppState>,
    Query(q): Query<AzureQuery>,
) -> Response {
    let window = azure_window(&q);
    match refresh(&state, Platform::AzureDevOps, &window).await {
        Ok(payload) => chart(&payload, q.chart_type.as_deref(), "overview"),
        Err(resp) => resp,
    }
}

pub async fn azuredevops_builds(
    State(state): State<AppState>,
    Query(q): Query<AzureQuery>,
) -> Response {
    lookup(state.clients.azuredevops.builds(&azure_window(&q)).await)
}

pub async fn azuredevops_pull_requests(
    State(state): State<AppState>,
    Query(q): Query<AzureQuery>,
) -> Response {
    let window = azure_window(&q);
    lookup(
        state
            .clients
            .azuredevops
            .pull_requests(&window, q.status.as_deref())
            .await,
    )
}

pub async fn azuredevops_test(State(state): State<AppState>) -> Response {
    check(&state, Platform::AzureDevOps).await
}

// === Figma ===

pub async fn figma_analytics(
    State(state): State<AppState>,
    Query(q): Query<FigmaQuery>,
) -> Response {
    match refresh(&state, Platform::Figma, &figma_window(&q)).await {
        Ok(payload) => ok(payload),
        Err(resp) => resp,
    }
}

pub async fn figma_chart(State(state): State<AppState>, Query(q): Query<FigmaQuery>) -> Response {
    match refresh(&state, Platform::Figma, &figma_window(&q)).await {
        Ok(payload) => chart(&payload, q.chart_type.as_deref(), "files_by_project"),
        Err(resp) => resp,
    }
}

pub async fn figma_projects(State(state): State<AppState>, Query(q): Query<FigmaQuery>) -> Response {
    let team_id = non_blank(q.team_id);
    lookup(state.clients.figma.projects(team_id.as_deref()).await)
}

pub async fn figma_project_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Response {
    lookup(state.clients.figma.project_files(&project_id).await)
}

pub async fn figma_file_info(State(state): State<AppState>, Path(file_key): Path<String>) -> Response {
    lookup(state.clients.figma.file_info(&file_key).await)
}

pub async fn figma_file_comments(
    State(state): State<AppState>,
    Path(file_key): Path<String>,
) -> Response {
    lookup(state.clients.figma.file_comments(&file_key).await)
}

pub async fn figma_search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> Response {
    let team_id = non_blank(q.team_id);
    lookup(state.clients.figma.search(&q.q, team_id.as_deref()).await)
}

pub async fn figma_test(State(state): State<AppState>) -> Response {
    check(&state, Platform::Figma).await
}

// === Datadog ===

fn log_digest(payload: PlatformPayload) -> LogDigest {
    match payload {
        PlatformPayload::Datadog(data) => data.logs.unwrap_or_default(),
        _ => LogDigest::default(),
    }
}

pub async fn datadog_logs(State(state): State<AppState>, Query(q): Query<LogsQuery>) -> Response {
    match refresh(&state, Platform::Datadog, &logs_window(&q)).await {
        Ok(payload) => ok(log_digest(payload)),
        Err(resp) => resp,
    }
}

pub async fn datadog_log_stats(
    State(state): State<AppState>,
    Query(q): Query<LogsQuery>,
) -> Response {
    match refresh(&state, Platform::Datadog, &logs_window(&q)).await {
        Ok(payload) => ok(LogStats::from(log_digest(payload))),
        Err(resp) => resp,
    }
}

pub async fn datadog_services(
    State(state): State<AppState>,
    Query(q): Query<LogsQuery>,
) -> Response {
    match refresh(&state, Platform::Datadog, &logs_window(&q)).await {
        Ok(payload) => ok(log_digest(payload).services),
        Err(resp) => resp,
    }
}

pub async fn datadog_chart(State(state): State<AppState>, Query(q): Query<LogsQuery>) -> Response {
    match refresh(&state, Platform::Datadog, &logs_window(&q)).await {
        Ok(payload) => chart(&payload, q.chart_type.as_deref(), "logs_by_level"),
        Err(resp) => resp,
    }
}

pub async fn datadog_test(State(state): State<AppState>) -> Response {
    check(&state, Platform::Datadog).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_repos() {
        let values = vec!["acme/api".to_string(), " acme/web, acme/docs ,".to_string()];
        assert_eq!(split_repos(&values), vec!["acme/api", "acme/web", "acme/docs"]);
        assert!(split_repos(&[]).is_empty());
    }

    #[test]
    fn test_logs_window_defaults() {
        let window = logs_window(&LogsQuery {
            service: Some("  ".into()),
            level: Some("error".into()),
            ..Default::default()
        });
        assert_eq!(window.hours, DEFAULT_HOURS);
        assert_eq!(window.limit, DEFAULT_LIMIT);
        assert_eq!(window.service, None);
        assert_eq!(window.level.as_deref(), Some("error"));
    }
}
