//! Chart series shaped from platform payloads for the dashboard front end.

use crate::payload::{AzureDevOpsData, DatadogData, FigmaData, GithubData, PlatformPayload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Pie,
    Bar,
    Line,
}

/// One labelled series. `labels` and `values` always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub chart_type: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// Set when there is nothing to plot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ChartData {
    fn new(chart_type: ChartKind, title: impl Into<String>) -> Self {
        Self {
            chart_type,
            title: title.into(),
            labels: Vec::new(),
            values: Vec::new(),
            message: None,
        }
    }

    fn with_points<L, I>(mut self, points: I) -> Self
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, f64)>,
    {
        for (label, value) in points {
            self.labels.push(label.into());
            self.values.push(value);
        }
        if self.values.iter().all(|v| *v == 0.0) {
            self.message = Some("No data available for the selected time period".to_string());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_some()
    }
}

fn counts(map: &BTreeMap<String, u64>) -> impl Iterator<Item = (String, f64)> + '_ {
    map.iter().map(|(k, v)| (k.clone(), *v as f64))
}

/// Shape the chart named `name` from `payload`.
///
/// Unknown names fall back to the platform's overview chart.
pub fn chart_for(payload: &PlatformPayload, name: &str) -> ChartData {
    match payload {
        PlatformPayload::Github(data) => github_chart(data, name),
        PlatformPayload::AzureDevOps(data) => azure_devops_chart(data, name),
        PlatformPayload::Figma(data) => figma_chart(data, name),
        PlatformPayload::Datadog(data) => datadog_chart(data, name),
    }
}

pub fn github_chart(data: &GithubData, name: &str) -> ChartData {
    match name {
        // BTreeMap keeps YYYY-MM-DD keys in date order.
        "prs_by_day" => ChartData::new(ChartKind::Line, "Pull Requests Created")
            .with_points(counts(&data.prs_by_day)),
        "prs_by_author" => ChartData::new(ChartKind::Bar, "Pull Requests by Author")
            .with_points(counts(&data.prs_by_author)),
        _ => ChartData::new(ChartKind::Pie, "Pull Request Status Overview").with_points([
            ("Open", data.open_prs as f64),
            ("Closed", data.closed_prs as f64),
            ("Merged", data.merged_prs as f64),
        ]),
    }
}

pub fn azure_devops_chart(data: &AzureDevOpsData, name: &str) -> ChartData {
    match name {
        "work_items_by_type" => ChartData::new(ChartKind::Pie, "Work Items by Type")
            .with_points(counts(&data.work_items_by_type)),
        "work_items_by_state" => ChartData::new(ChartKind::Bar, "Work Items by State")
            .with_points(counts(&data.work_items_by_state)),
        "repositories" => {
            let mut by_repo: BTreeMap<String, u64> = data
                .repositories
                .iter()
                .map(|r| (r.clone(), 0))
                .collect();
            for pr in &data.pull_requests {
                *by_repo.entry(pr.repository.clone()).or_default() += 1;
            }
            ChartData::new(ChartKind::Bar, "Pull Requests by Repository")
                .with_points(counts(&by_repo))
        }
        _ => {
            let payload = PlatformPayload::AzureDevOps(data.clone());
            ChartData::new(ChartKind::Bar, "Azure DevOps Activity Overview").with_points([
                ("Work Items", payload.work_item_count() as f64),
                ("Pull Requests", payload.pull_request_count() as f64),
                ("Repositories", payload.repository_count() as f64),
            ])
        }
    }
}

pub fn figma_chart(data: &FigmaData, name: &str) -> ChartData {
    match name {
        "files_by_project" => ChartData::new(ChartKind::Pie, "Files by Project")
            .with_points(counts(&data.files_by_project)),
        "comments_by_file" => ChartData::new(ChartKind::Bar, "Comments by File").with_points(
            data.files
                .iter()
                .map(|f| (f.name.clone(), f.comments_count as f64)),
        ),
        "project_overview" => ChartData::new(ChartKind::Bar, "Project Overview").with_points(
            data.projects
                .iter()
                .map(|p| (p.name.clone(), p.files_count as f64)),
        ),
        _ => ChartData::new(ChartKind::Bar, "Team Overview").with_points([
            (
                "Projects",
                data.total_projects.unwrap_or(data.projects.len() as u64) as f64,
            ),
            (
                "Files",
                data.total_files.unwrap_or(data.files.len() as u64) as f64,
            ),
            ("Comments", data.total_comments as f64),
            ("Collaborators", data.active_collaborators.len() as f64),
        ]),
    }
}

pub fn datadog_chart(data: &DatadogData, name: &str) -> ChartData {
    let logs = data.logs.clone().unwrap_or_default();
    match name {
        "logs_by_service" => ChartData::new(ChartKind::Bar, "Logs by Service")
            .with_points(counts(&logs.by_service)),
        "metrics" => ChartData::new(ChartKind::Bar, "Latest Metric Values").with_points(
            data.metrics
                .iter()
                .map(|m| (m.name.clone(), m.value.unwrap_or(0.0))),
        ),
        _ => ChartData::new(ChartKind::Pie, "Logs by Level").with_points(counts(&logs.by_level)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{DesignFile, LinkedPullRequest, LogDigest, MetricSample};

    #[test]
    fn test_github_overview_is_status_pie() {
        let data = GithubData {
            open_prs: 2,
            closed_prs: 1,
            merged_prs: 4,
            ..Default::default()
        };
        let chart = github_chart(&data, "overview");
        assert_eq!(chart.chart_type, ChartKind::Pie);
        assert_eq!(chart.labels, vec!["Open", "Closed", "Merged"]);
        assert_eq!(chart.values, vec![2.0, 1.0, 4.0]);
        assert!(!chart.is_empty());
    }

    #[test]
    fn test_prs_by_day_is_date_ordered_line() {
        let mut data = GithubData::default();
        data.prs_by_day.insert("2024-03-02".into(), 3);
        data.prs_by_day.insert("2024-03-01".into(), 1);
        let chart = chart_for(&PlatformPayload::Github(data), "prs_by_day");
        assert_eq!(chart.chart_type, ChartKind::Line);
        assert_eq!(chart.labels, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(chart.values, vec![1.0, 3.0]);
    }

    #[test]
    fn test_unknown_name_falls_back_to_overview() {
        let chart = figma_chart(&FigmaData::default(), "nonsense");
        assert_eq!(chart.title, "Team Overview");
        assert!(chart.is_empty());
    }

    #[test]
    fn test_azure_repositories_counts_linked_prs() {
        let data = AzureDevOpsData {
            repositories: vec!["api".into(), "web".into()],
            pull_requests: vec![
                LinkedPullRequest {
                    repository: "api".into(),
                    ..Default::default()
                },
                LinkedPullRequest {
                    repository: "api".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let chart = azure_devops_chart(&data, "repositories");
        assert_eq!(chart.labels, vec!["api", "web"]);
        assert_eq!(chart.values, vec![2.0, 0.0]);
    }

    #[test]
    fn test_datadog_charts() {
        let mut logs = LogDigest::default();
        logs.by_level.insert("error".into(), 5);
        let data = DatadogData {
            logs: Some(logs),
            metrics: vec![MetricSample {
                name: "cpu".into(),
                value: Some(0.4),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(datadog_chart(&data, "logs_by_level").values, vec![5.0]);
        assert_eq!(datadog_chart(&data, "metrics").labels, vec!["cpu"]);
        assert!(datadog_chart(&data, "logs_by_service").is_empty());
    }

    #[test]
    fn test_comments_by_file() {
        let data = FigmaData {
            files: vec![DesignFile {
                name: "Checkout".into(),
                comments_count: 3,
                ..Default::default()
            }],
            ..Default::default()
        };
        let chart = figma_chart(&data, "comments_by_file");
        assert_eq!(chart.values, vec![3.0]);
    }
}
