//! Per-platform payload schemas.
//!
//! Every fetcher normalizes its upstream response into one of these shapes
//! before it reaches the context store. Raw JSON recorded through
//! [`PlatformPayload::from_value`] is validated against the same schema.

use crate::error::{PulseError, Result};
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Latest fetch result of one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "lowercase")]
pub enum PlatformPayload {
    Datadog(DatadogData),
    Github(GithubData),
    #[serde(rename = "azuredevops")]
    AzureDevOps(AzureDevOpsData),
    Figma(FigmaData),
}

// === Datadog ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatadogData {
    pub metrics: Vec<MetricSample>,
    pub logs: Option<LogDigest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSample {
    pub name: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    /// The query that produced this sample, if any.
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogDigest {
    pub total_logs: u64,
    pub services: Vec<String>,
    pub by_level: BTreeMap<String, u64>,
    pub by_service: BTreeMap<String, u64>,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntry {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
    pub service: String,
    pub level: String,
    pub host: String,
    pub tags: Vec<String>,
}

// === GitHub ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubData {
    pub total_pull_requests: Option<u64>,
    pub total_repositories: Option<u64>,
    pub total_commits: Option<u64>,
    pub open_prs: u64,
    pub closed_prs: u64,
    pub merged_prs: u64,
    pub prs_by_author: BTreeMap<String, u64>,
    /// Keyed by `YYYY-MM-DD`.
    pub prs_by_day: BTreeMap<String, u64>,
    pub pull_requests: Vec<PullRequest>,
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    pub id: u64,
    pub number: Option<u64>,
    pub title: String,
    pub state: String,
    pub author: Option<String>,
    pub repository: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub full_name: Option<String>,
    pub url: Option<String>,
    pub pull_requests: u64,
}

// === Azure DevOps ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureDevOpsData {
    pub total_work_items: Option<u64>,
    pub total_pull_requests: Option<u64>,
    pub total_repositories: Option<u64>,
    pub total_commits: u64,
    pub work_items_by_type: BTreeMap<String, u64>,
    pub work_items_by_state: BTreeMap<String, u64>,
    pub work_items: Vec<WorkItem>,
    pub pull_requests: Vec<LinkedPullRequest>,
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkItem {
    pub id: u64,
    pub title: String,
    pub work_item_type: String,
    pub state: String,
    pub assigned_to: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
}

/// A pull request discovered through a work item's artifact links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedPullRequest {
    pub title: String,
    pub url: String,
    pub repository: String,
    pub work_item_id: Option<u64>,
}

// === Figma ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigmaData {
    pub total_projects: Option<u64>,
    pub total_files: Option<u64>,
    pub total_comments: u64,
    pub files_by_project: BTreeMap<String, u64>,
    pub files: Vec<DesignFile>,
    pub projects: Vec<DesignProject>,
    pub active_collaborators: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignFile {
    pub key: String,
    pub name: String,
    pub project: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub comments_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignProject {
    pub id: String,
    pub name: String,
    pub files_count: u64,
}

fn reported_or_len(reported: Option<u64>, len: usize) -> u64 {
    reported.unwrap_or(len as u64)
}

impl PlatformPayload {
    /// Parse raw JSON into the schema of `platform`.
    ///
    /// Accepts either the bare record set or an analytics envelope of the form
    /// `{"status": "...", "data": {...}}`.
    pub fn from_value(platform: Platform, raw: Value) -> Result<Self> {
        let raw = match raw {
            Value::Object(mut map) if map.contains_key("status") && map.contains_key("data") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let invalid = |e: serde_json::Error| PulseError::InvalidPayload {
            platform,
            reason: e.to_string(),
        };

        Ok(match platform {
            Platform::Datadog => PlatformPayload::Datadog(serde_json::from_value(raw).map_err(invalid)?),
            Platform::Github => PlatformPayload::Github(serde_json::from_value(raw).map_err(invalid)?),
            Platform::AzureDevOps => {
                PlatformPayload::AzureDevOps(serde_json::from_value(raw).map_err(invalid)?)
            }
            Platform::Figma => PlatformPayload::Figma(serde_json::from_value(raw).map_err(invalid)?),
        })
    }

    pub fn platform(&self) -> Platform {
        match self {
            PlatformPayload::Datadog(_) => Platform::Datadog,
            PlatformPayload::Github(_) => Platform::Github,
            PlatformPayload::AzureDevOps(_) => Platform::AzureDevOps,
            PlatformPayload::Figma(_) => Platform::Figma,
        }
    }

    pub fn work_item_count(&self) -> u64 {
        match self {
            PlatformPayload::AzureDevOps(d) => reported_or_len(d.total_work_items, d.work_items.len()),
            _ => 0,
        }
    }

    pub fn pull_request_count(&self) -> u64 {
        match self {
            PlatformPayload::Github(d) => reported_or_len(d.total_pull_requests, d.pull_requests.len()),
            PlatformPayload::AzureDevOps(d) => {
                reported_or_len(d.total_pull_requests, d.pull_requests.len())
            }
            _ => 0,
        }
    }

    pub fn repository_count(&self) -> u64 {
        match self {
            PlatformPayload::Github(d) => reported_or_len(d.total_repositories, d.repositories.len()),
            PlatformPayload::AzureDevOps(d) => {
                reported_or_len(d.total_repositories, d.repositories.len())
            }
            _ => 0,
        }
    }

    pub fn metric_count(&self) -> u64 {
        match self {
            PlatformPayload::Datadog(d) => d.metrics.len() as u64,
            _ => 0,
        }
    }
}
