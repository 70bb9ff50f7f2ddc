use crate::metrics::DevPulseMetrics;
use devpulse_core::{ContextStore, Platform, PlatformPayload, PulseError};
use devpulse_platforms::{FetchError, FetchWindow, FetcherSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to record context: {0}")]
    Store(#[from] PulseError),
}

impl RefreshError {
    /// The fetch was refused locally; nothing upstream failed.
    pub fn is_rejected(&self) -> bool {
        matches!(self, RefreshError::Fetch(e) if e.is_rejected())
    }
}

/// Fetches a platform and records the outcome in the context store.
#[derive(Clone)]
pub struct Refresher {
    store: Arc<ContextStore>,
    fetchers: FetcherSet,
    metrics: Arc<DevPulseMetrics>,
}

impl Refresher {
    pub fn new(store: Arc<ContextStore>, fetchers: FetcherSet, metrics: Arc<DevPulseMetrics>) -> Self {
        Self {
            store,
            fetchers,
            metrics,
        }
    }

    pub fn fetchers(&self) -> &FetcherSet {
        &self.fetchers
    }

    /// Fetch `platform` and record the payload.
    ///
    /// An upstream failure marks the section `error` and keeps its previous
    /// data. A missing credential or an unusable window is reported to the
    /// caller only; the store is left untouched.
    pub async fn refresh(
        &self,
        platform: Platform,
        window: &FetchWindow,
    ) -> Result<PlatformPayload, RefreshError> {
        let started = Instant::now();
        let result = self.fetchers.get(platform).fetch(window).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(payload) => {
                self.metrics.record_fetch(platform, "ok", elapsed);
                self.store.record_payload(payload.clone())?;
                info!("Refreshed {} context in {:.2}s", platform, elapsed);
                Ok(payload)
            }
            Err(e) if e.is_rejected() => {
                let outcome = if e.is_not_configured() {
                    "not_configured"
                } else {
                    "rejected"
                };
                self.metrics.record_fetch(platform, outcome, elapsed);
                Err(e.into())
            }
            Err(e) => {
                self.metrics.record_fetch(platform, "error", elapsed);
                warn!("Failed to refresh {}: {}", platform, e);
                self.store.record_failure(platform, e.to_string())?;
                Err(e.into())
            }
        }
    }

    /// Refresh every configured platform in turn. Returns the outcome per platform.
    pub async fn refresh_configured(
        &self,
        window: &FetchWindow,
    ) -> Vec<(Platform, Result<PlatformPayload, RefreshError>)> {
        let mut outcomes = Vec::new();
        for platform in self.fetchers.configured() {
            let outcome = self.refresh(platform, window).await;
            outcomes.push((platform, outcome));
        }
        outcomes
    }

    /// Background loop refreshing every configured platform each `interval`.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Background refresh every {}s", interval.as_secs());
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let window = FetchWindow::default();
                let outcomes = self.refresh_configured(&window).await;
                let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();
                if failed > 0 {
                    error!(
                        "Refresh cycle: {} of {} platforms failed",
                        failed,
                        outcomes.len()
                    );
                }
                self.metrics.refresh_cycles.inc();
            }
        })
    }
}
