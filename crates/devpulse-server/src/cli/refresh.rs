use crate::config::DevPulseConfig;
use crate::http::AppState;
use crate::cli::RefreshArgs;
use anyhow::{bail, Result};
use devpulse_core::{Platform, PlatformPayload};
use devpulse_platforms::FetchWindow;

pub async fn run(config: &DevPulseConfig, args: RefreshArgs) -> Result<()> {
    let state = AppState::build(config)?;
    let mut window = FetchWindow::default();
    if let Some(days) = args.days {
        window.days = days;
    }
    if let Some(hours) = args.hours {
        window.hours = hours;
    }

    let targets = match args.target.trim().to_ascii_lowercase().as_str() {
        "all" => {
            let configured = state.refresher.fetchers().configured();
            if configured.is_empty() {
                bail!("No platform is configured; set credentials in devpulse.toml or the environment");
            }
            configured
        }
        other => vec![other.parse::<Platform>()?],
    };

    let mut failed = 0;
    for platform in targets {
        match state.refresher.refresh(platform, &window).await {
            Ok(payload) => println!("✅ {:12} {}", platform.as_str(), describe(&payload)),
            Err(e) => {
                failed += 1;
                println!("❌ {:12} {}", platform.as_str(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} platform(s) failed to refresh", failed);
    }
    Ok(())
}

fn describe(payload: &PlatformPayload) -> String {
    match payload {
        PlatformPayload::Github(d) => format!(
            "{} pull requests ({} open, {} merged)",
            payload.pull_request_count(),
            d.open_prs,
            d.merged_prs
        ),
        PlatformPayload::AzureDevOps(_) => format!(
            "{} work items, {} linked pull requests",
            payload.work_item_count(),
            payload.pull_request_count()
        ),
        PlatformPayload::Figma(d) => format!(
            "{} files, {} comments",
            d.total_files.unwrap_or(d.files.len() as u64),
            d.total_comments
        ),
        PlatformPayload::Datadog(d) => format!(
            "{} log events, {} metrics",
            d.logs.as_ref().map(|l| l.total_logs).unwrap_or(0),
            payload.metric_count()
        ),
    }
}
