use crate::payload::{AzureDevOpsData, DatadogData, FigmaData, GithubData, PlatformPayload};
use crate::platform::Platform;
use crate::types::{ContextView, FetchStatus, PlatformSection};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Formats a context view plus a question into a single LLM request text.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    pub max_metrics: usize,
    pub max_log_entries: usize,
    pub max_log_chars: usize,
    pub max_records: usize,
    pub max_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            max_metrics: 10,
            max_log_entries: 5,
            max_log_chars: 100,
            max_records: 5,
            max_chars: 16_000,
        }
    }
}

/// Truncate `s` to at most `max_chars` Unicode scalar values.
/// Appends " [truncated]" when there is room; otherwise hard-truncates.
fn truncate(s: &str, max_chars: usize) -> String {
    const SUFFIX: &str = " [truncated]";
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let suffix_len = SUFFIX.chars().count();
    let keep = if max_chars > suffix_len {
        max_chars - suffix_len
    } else {
        max_chars
    };
    let byte_end = s
        .char_indices()
        .nth(keep)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if keep == max_chars {
        s[..byte_end].to_string()
    } else {
        format!("{}{}", &s[..byte_end], SUFFIX)
    }
}

/// Cut a log message to `max_chars` characters, appending "..." when cut.
fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let byte_end = s
        .char_indices()
        .nth(keep)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    format!("{}...", &s[..byte_end])
}

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "Never".to_string())
}

impl PromptBuilder {
    /// Render the summary block followed by one block per platform that has data.
    pub fn render_context(&self, view: &ContextView) -> String {
        let mut out = String::new();
        let s = &view.summary;
        out.push_str("=== ANALYTICS DASHBOARD SUMMARY ===\n");
        out.push_str(&format!("Total Work Items: {}\n", s.total_work_items));
        out.push_str(&format!("Total Pull Requests: {}\n", s.total_pull_requests));
        out.push_str(&format!("Total Repositories: {}\n", s.total_repositories));
        out.push_str(&format!("Total Metrics: {}\n", s.total_metrics));
        out.push_str(&format!("Last Updated: {}\n\n", timestamp(view.last_updated)));

        for (platform, section) in &view.sections {
            if let Some(block) = self.render_section(*platform, section) {
                out.push_str(&block);
                out.push('\n');
            }
        }
        out
    }

    /// Combine rendered context, optional caller-supplied data, and the instruction.
    pub fn build(
        &self,
        view: &ContextView,
        instruction: &str,
        extra: Option<&Map<String, Value>>,
    ) -> String {
        let mut context = self.render_context(view);

        if let Some(extra) = extra.filter(|m| !m.is_empty()) {
            context.push_str("\n**Additional Context Data:**\n");
            for (key, value) in extra {
                let rendered = match value {
                    Value::Object(_) | Value::Array(_) => {
                        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
                    }
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                context.push_str(&format!("- {}: {}\n", key, rendered));
            }
        }

        let context = truncate(&context, self.max_chars);
        format!("{}\n\n**Question:** {}", context.trim_end(), instruction)
    }

    fn render_section(&self, platform: Platform, section: &PlatformSection) -> Option<String> {
        if section.status == FetchStatus::NotFetched {
            return None;
        }
        let mut out = match &section.data {
            Some(PlatformPayload::Datadog(d)) => self.render_datadog(d),
            Some(PlatformPayload::Github(d)) => self.render_github(d),
            Some(PlatformPayload::AzureDevOps(d)) => self.render_azure(d),
            Some(PlatformPayload::Figma(d)) => self.render_figma(d),
            // Failed before the first successful fetch.
            None => format!("=== {} ===\n", platform.display_name().to_uppercase()),
        };
        if section.status == FetchStatus::Error {
            out.push_str(&format!(
                "Last refresh failed: {}\n",
                section.last_error.as_deref().unwrap_or("unknown error")
            ));
        }
        out.push_str(&format!("Last Fetch: {}\n", timestamp(section.last_fetch)));
        Some(out)
    }

    fn render_datadog(&self, data: &DatadogData) -> String {
        let mut out = String::from("=== DATADOG METRICS ===\n");
        for metric in data.metrics.iter().take(self.max_metrics) {
            let value = metric
                .value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            let unit = metric.unit.as_deref().unwrap_or("");
            out.push_str(&format!("- {}: {} {}\n", metric.name, value, unit).replace(" \n", "\n"));
        }

        if let Some(logs) = data.logs.as_ref().filter(|l| !l.entries.is_empty()) {
            out.push_str("=== DATADOG LOGS ===\n");
            out.push_str(&format!("Total Logs: {}\n", logs.total_logs));
            out.push_str(&format!("Services: {}\n", logs.services.join(", ")));
            out.push_str("Recent Log Entries:\n");
            for entry in logs.entries.iter().take(self.max_log_entries) {
                out.push_str(&format!(
                    "- [{}] {}\n",
                    entry.level,
                    preview(&entry.message, self.max_log_chars)
                ));
            }
        }
        out
    }

    fn render_github(&self, data: &GithubData) -> String {
        let total_prs = data
            .total_pull_requests
            .unwrap_or(data.pull_requests.len() as u64);
        let total_repos = data
            .total_repositories
            .unwrap_or(data.repositories.len() as u64);

        let mut out = String::from("=== GITHUB ANALYTICS ===\n");
        out.push_str(&format!("Total PRs: {}\n", total_prs));
        out.push_str(&format!("Total Repositories: {}\n", total_repos));
        out.push_str(&format!("Total Commits: {}\n", data.total_commits.unwrap_or(0)));
        out.push_str(&format!(
            "Open: {}, Closed: {}, Merged: {}\n",
            data.open_prs, data.closed_prs, data.merged_prs
        ));
        if !data.pull_requests.is_empty() {
            out.push_str("Recent Pull Requests:\n");
            for pr in data.pull_requests.iter().take(self.max_records) {
                let title = if pr.title.is_empty() { "Unknown" } else { &pr.title };
                let state = if pr.state.is_empty() { "Unknown" } else { &pr.state };
                out.push_str(&format!("- {} (State: {})\n", title, state));
            }
        }
        out
    }

    fn render_azure(&self, data: &AzureDevOpsData) -> String {
        let mut out = String::from("=== AZURE DEVOPS ANALYTICS ===\n");
        out.push_str(&format!(
            "Total Work Items: {}\n",
            data.total_work_items.unwrap_or(data.work_items.len() as u64)
        ));
        out.push_str(&format!(
            "Total PRs: {}\n",
            data.total_pull_requests
                .unwrap_or(data.pull_requests.len() as u64)
        ));
        out.push_str(&format!(
            "Total Repositories: {}\n",
            data.total_repositories
                .unwrap_or(data.repositories.len() as u64)
        ));
        if !data.work_items_by_type.is_empty() {
            out.push_str("Work Items by Type:\n");
            for (kind, count) in &data.work_items_by_type {
                out.push_str(&format!("- {}: {}\n", kind, count));
            }
        }
        if !data.work_items_by_state.is_empty() {
            out.push_str("Work Items by State:\n");
            for (state, count) in &data.work_items_by_state {
                out.push_str(&format!("- {}: {}\n", state, count));
            }
        }
        out
    }

    fn render_figma(&self, data: &FigmaData) -> String {
        let mut out = String::from("=== FIGMA ANALYTICS ===\n");
        out.push_str(&format!(
            "Total Files: {}\n",
            data.total_files.unwrap_or(data.files.len() as u64)
        ));
        out.push_str(&format!(
            "Total Projects: {}\n",
            data.total_projects.unwrap_or(data.projects.len() as u64)
        ));
        if !data.files.is_empty() {
            out.push_str("Recent Files:\n");
            for file in data.files.iter().take(self.max_records) {
                out.push_str(&format!(
                    "- {} (Last Modified: {})\n",
                    file.name,
                    file.last_modified
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "Unknown".to_string())
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{LogDigest, LogEntry, MetricSample};
    use crate::platform::Scope;
    use crate::types::ContextDocument;
    use serde_json::json;

    fn doc_with(payload: PlatformPayload, status: FetchStatus) -> ContextDocument {
        let mut doc = ContextDocument::empty();
        let section = doc.data_sources.get_mut(payload.platform());
        section.status = status;
        section.last_fetch = Some(Utc::now());
        section.data = Some(payload);
        doc.recompute_summary();
        doc
    }

    #[test]
    fn test_empty_document_renders_summary_only() {
        let text = PromptBuilder::default().render_context(&ContextDocument::empty().view(Scope::All));
        assert!(text.starts_with("=== ANALYTICS DASHBOARD SUMMARY ===\n"));
        assert!(text.contains("Total Pull Requests: 0"));
        assert!(text.contains("Last Updated: Never"));
        assert!(!text.contains("GITHUB"));
    }

    #[test]
    fn test_github_section_lists_recent_prs() {
        let payload = PlatformPayload::from_value(
            Platform::Github,
            json!({"pull_requests": [
                {"id": 1, "title": "Fix login", "state": "open"},
                {"id": 2, "state": "closed"}
            ]}),
        )
        .unwrap();
        let doc = doc_with(payload, FetchStatus::Fetched);
        let text = PromptBuilder::default().render_context(&doc.view(Scope::All));

        assert!(text.contains("=== GITHUB ANALYTICS ==="));
        assert!(text.contains("Total PRs: 2"));
        assert!(text.contains("- Fix login (State: open)"));
        assert!(text.contains("- Unknown (State: closed)"));
    }

    #[test]
    fn test_scope_excludes_other_platforms() {
        let payload = PlatformPayload::Github(GithubData::default());
        let doc = doc_with(payload, FetchStatus::Fetched);
        let text = PromptBuilder::default().render_context(&doc.view(Scope::One(Platform::Figma)));
        assert!(!text.contains("GITHUB"));
    }

    #[test]
    fn test_datadog_limits_and_truncation() {
        let data = DatadogData {
            metrics: (0..15)
                .map(|i| MetricSample {
                    name: format!("m{}", i),
                    value: Some(i as f64),
                    unit: Some("ms".into()),
                    query: None,
                })
                .collect(),
            logs: Some(LogDigest {
                total_logs: 1,
                services: vec!["api".into(), "web".into()],
                entries: vec![LogEntry {
                    message: "x".repeat(300),
                    level: "ERROR".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        };
        let doc = doc_with(PlatformPayload::Datadog(data), FetchStatus::Fetched);
        let text = PromptBuilder::default().render_context(&doc.view(Scope::All));

        assert!(text.contains("- m9: 9 ms"));
        assert!(!text.contains("- m10:"));
        assert!(text.contains("Services: api, web"));
        let log_line = text.lines().find(|l| l.starts_with("- [ERROR]")).unwrap();
        assert_eq!(log_line.chars().count(), "- [ERROR] ".len() + 100);
        assert!(log_line.ends_with("..."));
    }

    #[test]
    fn test_failed_section_is_annotated() {
        let mut doc = doc_with(PlatformPayload::Figma(FigmaData::default()), FetchStatus::Error);
        doc.data_sources.figma.last_error = Some("timeout".into());
        let text = PromptBuilder::default().render_context(&doc.view(Scope::All));
        assert!(text.contains("Last refresh failed: timeout"));
    }

    #[test]
    fn test_section_failed_before_any_data_is_rendered() {
        let mut doc = ContextDocument::empty();
        let section = doc.data_sources.get_mut(Platform::AzureDevOps);
        section.status = FetchStatus::Error;
        section.last_error = Some("upstream returned 401: Unauthorized".into());

        let text = PromptBuilder::default().render_context(&doc.view(Scope::All));
        let block = text.split("=== AZURE DEVOPS ===\n").nth(1).unwrap();
        assert!(block.starts_with("Last refresh failed: upstream returned 401: Unauthorized\n"));
        assert!(!text.contains("=== FIGMA"));
    }

    #[test]
    fn test_build_appends_extra_and_question() {
        let extra = json!({"team": "core", "repos": ["a", "b"]});
        let text = PromptBuilder::default().build(
            &ContextDocument::empty().view(Scope::All),
            "What changed?",
            extra.as_object(),
        );

        assert!(text.contains("**Additional Context Data:**"));
        assert!(text.contains("- team: core"));
        assert!(text.contains("\"a\""));
        assert!(text.ends_with("**Question:** What changed?"));
    }

    #[test]
    fn test_truncate_respects_char_budget() {
        let s = "é".repeat(50);
        let cut = truncate(&s, 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with(" [truncated]"));
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate(&s, 5).chars().count(), 5);
    }
}
