use crate::error::{FetchError, Result};
use crate::fetcher::{non_empty, send_json, ConnectionCheck, FetchWindow, Fetcher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devpulse_core::{DesignFile, DesignProject, FigmaData, Platform, PlatformPayload};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub const FIGMA_API_URL: &str = "https://api.figma.com";

/// Files per project whose comments are inspected.
const COMMENTED_FILES_PER_PROJECT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FigmaConfig {
    pub token: Option<String>,
    pub team_id: Option<String>,
    pub base_url: String,
}

impl Default for FigmaConfig {
    fn default() -> Self {
        Self {
            token: None,
            team_id: None,
            base_url: FIGMA_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    #[serde(default)]
    projects: Vec<ApiProject>,
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    // Figma returns project ids as strings on some endpoints and numbers on others.
    id: serde_json::Value,
    name: String,
}

#[derive(Debug, Deserialize)]
struct FilesResponse {
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    key: String,
    name: String,
    last_modified: Option<DateTime<Utc>>,
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<ApiComment>,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    #[serde(default)]
    id: String,
    #[serde(default)]
    message: String,
    user: Option<ApiUser>,
    created_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDocumentFile {
    name: String,
    last_modified: Option<DateTime<Utc>>,
    thumbnail_url: Option<String>,
    version: Option<String>,
    editor_type: Option<String>,
    document: Option<ApiNode>,
}

#[derive(Debug, Deserialize)]
struct ApiNode {
    #[serde(default)]
    name: String,
    #[serde(default)]
    children: Vec<ApiNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigmaProject {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigmaFile {
    pub key: String,
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
}

impl From<ApiFile> for FigmaFile {
    fn from(file: ApiFile) -> Self {
        Self {
            key: file.key,
            name: file.name,
            last_modified: file.last_modified,
            thumbnail_url: file.thumbnail_url,
        }
    }
}

/// File metadata with its top-level pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub key: String,
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
    pub version: Option<String>,
    pub editor_type: Option<String>,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileComment {
    pub id: String,
    pub message: String,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub resolved: bool,
}

/// A file whose name matched a search, with the project it lives in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMatch {
    pub key: String,
    pub name: String,
    pub project: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMe {
    handle: String,
}

pub struct FigmaFetcher {
    config: FigmaConfig,
    client: Client,
}

impl FigmaFetcher {
    pub fn new(config: FigmaConfig, client: Client) -> Self {
        Self { config, client }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, token: &str, path: &str) -> Result<T> {
        let url = format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path);
        send_json(self.client.get(url).header("X-Figma-Token", token)).await
    }

    fn token(&self) -> Result<&str> {
        non_empty(self.config.token.as_deref())
            .ok_or_else(|| FetchError::not_configured(Platform::Figma, "FIGMA_TOKEN"))
    }

    fn team<'a>(&'a self, team_id: Option<&'a str>) -> Result<&'a str> {
        non_empty(team_id)
            .or(non_empty(self.config.team_id.as_deref()))
            .ok_or_else(|| FetchError::not_configured(Platform::Figma, "FIGMA_TEAM_ID"))
    }

    async fn team_projects(&self, token: &str, team_id: &str) -> Result<Vec<FigmaProject>> {
        let response: ProjectsResponse = self
            .get(token, &format!("teams/{}/projects", segment(team_id)?))
            .await?;
        Ok(response
            .projects
            .into_iter()
            .map(|p| FigmaProject {
                id: project_id(&p.id),
                name: p.name,
            })
            .collect())
    }

    async fn files_in(&self, token: &str, project_id: &str) -> Result<Vec<ApiFile>> {
        let response: FilesResponse = self
            .get(token, &format!("projects/{}/files", segment(project_id)?))
            .await?;
        Ok(response.files)
    }

    /// Projects of `team_id`, or of the configured team.
    pub async fn projects(&self, team_id: Option<&str>) -> Result<Vec<FigmaProject>> {
        let token = self.token()?;
        self.team_projects(token, self.team(team_id)?).await
    }

    pub async fn project_files(&self, project_id: &str) -> Result<Vec<FigmaFile>> {
        let token = self.token()?;
        Ok(self
            .files_in(token, project_id)
            .await?
            .into_iter()
            .map(FigmaFile::from)
            .collect())
    }

    /// Only the first level of the document tree is requested; its children are the pages.
    pub async fn file_info(&self, file_key: &str) -> Result<FileInfo> {
        let token = self.token()?;
        let file: ApiDocumentFile = self
            .get(token, &format!("files/{}?depth=1", segment(file_key)?))
            .await?;
        Ok(FileInfo {
            key: file_key.to_string(),
            name: file.name,
            last_modified: file.last_modified,
            thumbnail_url: file.thumbnail_url,
            version: file.version,
            editor_type: file.editor_type,
            pages: file
                .document
                .map(|d| d.children.into_iter().map(|page| page.name).collect())
                .unwrap_or_default(),
        })
    }

    pub async fn file_comments(&self, file_key: &str) -> Result<Vec<FileComment>> {
        let token = self.token()?;
        let response: CommentsResponse = self
            .get(token, &format!("files/{}/comments", segment(file_key)?))
            .await?;
        Ok(response
            .comments
            .into_iter()
            .map(|c| FileComment {
                id: c.id,
                message: c.message,
                author: c.user.map(|u| u.handle),
                created_at: c.created_at,
                resolved: c.resolved_at.is_some(),
            })
            .collect())
    }

    /// Case-insensitive substring match on file names across every team project.
    pub async fn search(&self, query: &str, team_id: Option<&str>) -> Result<Vec<FileMatch>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(FetchError::InvalidRequest("search query is required".into()));
        }
        let token = self.token()?;
        let team_id = self.team(team_id)?;

        let mut matches = Vec::new();
        for project in self.team_projects(token, team_id).await? {
            for file in self.files_in(token, &project.id).await? {
                if file.name.to_lowercase().contains(&needle) {
                    matches.push(FileMatch {
                        key: file.key,
                        name: file.name,
                        project: project.name.clone(),
                        last_modified: file.last_modified,
                        thumbnail_url: file.thumbnail_url,
                    });
                }
            }
        }
        debug!(query = %needle, matches = matches.len(), "Searched Figma files");
        Ok(matches)
    }
}

fn project_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ids and keys are interpolated into the request path.
fn segment(value: &str) -> Result<&str> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':');
    if valid {
        Ok(value)
    } else {
        Err(FetchError::InvalidRequest(format!("invalid Figma id '{}'", value)))
    }
}

#[async_trait]
impl Fetcher for FigmaFetcher {
    fn platform(&self) -> Platform {
        Platform::Figma
    }

    fn is_configured(&self) -> bool {
        non_empty(self.config.token.as_deref()).is_some()
            && non_empty(self.config.team_id.as_deref()).is_some()
    }

    async fn fetch(&self, window: &FetchWindow) -> Result<PlatformPayload> {
        let token = self.token()?;
        let team_id = self.team(window.team_id.as_deref())?;

        let cutoff = window.since_days()?;
        let projects = self.team_projects(token, team_id).await?;

        let mut data = FigmaData {
            total_projects: Some(projects.len() as u64),
            ..Default::default()
        };
        let mut collaborators = BTreeSet::new();
        let mut total_files = 0u64;

        for project in projects {
            debug!(project = %project.name, "Fetching project files");
            let files = self.files_in(token, &project.id).await?;
            total_files += files.len() as u64;
            data.files_by_project
                .insert(project.name.clone(), files.len() as u64);
            data.projects.push(DesignProject {
                id: project.id,
                name: project.name.clone(),
                files_count: files.len() as u64,
            });

            for file in files.into_iter().take(COMMENTED_FILES_PER_PROJECT) {
                if file.last_modified.is_some_and(|m| m < cutoff) {
                    continue;
                }
                let comments = match self
                    .get::<CommentsResponse>(token, &format!("files/{}/comments", file.key))
                    .await
                {
                    Ok(c) => c.comments,
                    Err(e) => {
                        warn!(file = %file.key, "Skipping comments: {}", e);
                        Vec::new()
                    }
                };
                collaborators.extend(comments.iter().filter_map(|c| c.user.as_ref()).map(|u| u.handle.clone()));
                data.total_comments += comments.len() as u64;
                data.files.push(DesignFile {
                    key: file.key,
                    name: file.name,
                    project: Some(project.name.clone()),
                    last_modified: file.last_modified,
                    comments_count: comments.len() as u64,
                });
            }
        }

        data.files.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        data.total_files = Some(total_files);
        data.active_collaborators = collaborators.into_iter().collect();
        info!(
            projects = data.projects.len(),
            files = total_files,
            "Fetched Figma analytics"
        );
        Ok(PlatformPayload::Figma(data))
    }

    async fn check(&self) -> Result<ConnectionCheck> {
        let token = self.token()?;
        let me: ApiMe = self.get(token, "me").await?;
        let mut check =
            ConnectionCheck::new(Platform::Figma).with(format!("authenticated as {}", me.handle));
        if let Some(team_id) = non_empty(self.config.team_id.as_deref()) {
            let projects = self.team_projects(token, team_id).await?;
            check = check.with(format!("team {} has {} projects", team_id, projects.len()));
        }
        Ok(check)
    }
}
