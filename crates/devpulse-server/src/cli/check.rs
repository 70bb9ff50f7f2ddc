use crate::cli::CheckArgs;
use crate::config::DevPulseConfig;
use anyhow::{bail, Result};
use devpulse_core::Platform;
use devpulse_platforms::{http_client, FetcherSet};

pub async fn run(config: &DevPulseConfig, args: CheckArgs) -> Result<()> {
    let client = http_client(config.server.request_timeout())?;
    let fetchers = FetcherSet::new(config.platforms.clone(), client);
    let failed = check_all(&fetchers, &args.target).await?;
    if failed > 0 {
        bail!("{} platform(s) failed the connection check", failed);
    }
    Ok(())
}

/// Print one line per checked platform and return how many failed.
async fn check_all(fetchers: &FetcherSet, target: &str) -> Result<usize> {
    let targets = match target.trim().to_ascii_lowercase().as_str() {
        "all" => {
            let configured = fetchers.configured();
            if configured.is_empty() {
                bail!("No platform is configured; set credentials in devpulse.toml or the environment");
            }
            configured
        }
        other => vec![other.parse::<Platform>()?],
    };

    let mut failed = 0;
    for platform in targets {
        match fetchers.get(platform).check().await {
            Ok(check) => {
                println!("✅ {:12} connected", platform.as_str());
                for detail in &check.details {
                    println!("   {:12} {}", "", detail);
                }
            }
            Err(e) => {
                failed += 1;
                println!("❌ {:12} {}", platform.as_str(), e);
            }
        }
    }
    Ok(failed)
}
