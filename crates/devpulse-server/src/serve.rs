use crate::config::DevPulseConfig;
use crate::http::{create_router, AppState};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub async fn run(config: DevPulseConfig) -> anyhow::Result<()> {
    for problem in config.validate() {
        warn!("Config: {}", problem);
    }

    info!("Starting DevPulse v{}", env!("CARGO_PKG_VERSION"));
    info!("HTTP: {}", config.server.http_addr);
    info!("Data: {:?}", config.server.data_dir);

    let state = AppState::build(&config)?;

    let configured = state.refresher.fetchers().configured();
    if configured.is_empty() {
        warn!("No platform credentials configured; platform routes will return 400");
    } else {
        let names: Vec<_> = configured.iter().map(|p| p.as_str()).collect();
        info!("Configured platforms: {}", names.join(", "));
    }

    // Optional background refresh
    let refresh_task: Option<JoinHandle<()>> = if config.server.refresh_interval_secs > 0 {
        Some(
            state
                .refresher
                .clone()
                .spawn(Duration::from_secs(config.server.refresh_interval_secs)),
        )
    } else {
        info!("Background refresh disabled");
        None
    };

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(config.server.http_addr).await?;
    let app = create_router(state);
    let http_task = tokio::spawn(async move {
        info!("Starting HTTP server on {}", config.server.http_addr);
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server failed: {}", e);
        }
    });

    info!("DevPulse ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, terminating...");

    http_task.abort();
    if let Some(task) = refresh_task {
        task.abort();
    }

    Ok(())
}
