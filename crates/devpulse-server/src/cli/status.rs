use crate::config::DevPulseConfig;
use anyhow::Result;
use devpulse_core::{ContextStatus, ContextStore, JsonFileStore};

pub fn run(config: &DevPulseConfig, json: bool) -> Result<()> {
    let store = ContextStore::open(JsonFileStore::in_dir(&config.server.data_dir));
    let status = store.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    print!("{}", render(&status));
    Ok(())
}

fn timestamp(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn render(status: &ContextStatus) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("Context Status\n");
    out.push_str(&format!("{}\n", "─".repeat(50)));
    out.push_str(&format!("Last updated: {}\n", timestamp(status.last_updated)));
    for (platform, source) in &status.data_sources {
        out.push_str(&format!(
            "  {:12} {:12} {}\n",
            platform.as_str(),
            source.status.as_str(),
            timestamp(source.last_fetch)
        ));
        if let Some(err) = &source.last_error {
            out.push_str(&format!("  {:12} error: {}\n", "", err));
        }
    }
    let s = &status.summary;
    out.push_str(&format!("{}\n", "─".repeat(50)));
    out.push_str(&format!("Work items:    {:>8}\n", s.total_work_items));
    out.push_str(&format!("Pull requests: {:>8}\n", s.total_pull_requests));
    out.push_str(&format!("Repositories:  {:>8}\n", s.total_repositories));
    out.push_str(&format!("Metrics:       {:>8}\n", s.total_metrics));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use devpulse_core::{ContextDocument, Platform};
    use serde_json::json;

    #[test]
    fn test_render_lists_every_platform() {
        let text = render(&ContextDocument::empty().status());
        for platform in Platform::ALL {
            assert!(text.contains(platform.as_str()));
        }
        assert!(text.contains("Last updated: never"));
    }

    #[test]
    fn test_render_shows_failure_reason() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::open(JsonFileStore::in_dir(dir.path()));
        store
            .record(Platform::Github, json!({"pull_requests": [{"id": 1}]}))
            .unwrap();
        store.record_failure(Platform::Github, "upstream returned 401").unwrap();

        let text = render(&store.status());
        assert!(text.contains("error: upstream returned 401"));
        assert!(text
            .lines()
            .any(|l| l.starts_with("Pull requests:") && l.trim_end().ends_with(" 1")));
    }
}
