//! Upstream fetchers for the DevPulse dashboard.
//!
//! Each fetcher calls one platform's REST API and normalizes the response into
//! a [`devpulse_core::PlatformPayload`]. Fetchers never touch the context
//! store; recording results is the caller's job.

pub mod azure_devops;
pub mod datadog;
pub mod error;
pub mod fetcher;
pub mod figma;
pub mod github;

pub use azure_devops::{AzureDevOpsConfig, AzureDevOpsFetcher, Build, GitPullRequest};
pub use datadog::{DatadogConfig, DatadogFetcher, MetricQuery};
pub use error::{FetchError, Result};
pub use fetcher::{http_client, ConnectionCheck, FetchWindow, Fetcher};
pub use figma::{FigmaConfig, FigmaFetcher, FigmaFile, FigmaProject, FileComment, FileInfo, FileMatch};
pub use github::{GithubConfig, GithubFetcher, PullRequestDetail};

use devpulse_core::Platform;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Credentials and endpoints of every platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub datadog: DatadogConfig,
    pub github: GithubConfig,
    pub azuredevops: AzureDevOpsConfig,
    pub figma: FigmaConfig,
}

/// The concrete platform clients, for lookups beyond [`Fetcher::fetch`].
#[derive(Clone)]
pub struct PlatformClients {
    pub datadog: Arc<DatadogFetcher>,
    pub github: Arc<GithubFetcher>,
    pub azuredevops: Arc<AzureDevOpsFetcher>,
    pub figma: Arc<FigmaFetcher>,
}

impl PlatformClients {
    pub fn new(config: PlatformsConfig, client: Client) -> Self {
        Self {
            datadog: Arc::new(DatadogFetcher::new(config.datadog, client.clone())),
            github: Arc::new(GithubFetcher::new(config.github, client.clone())),
            azuredevops: Arc::new(AzureDevOpsFetcher::new(config.azuredevops, client.clone())),
            figma: Arc::new(FigmaFetcher::new(config.figma, client)),
        }
    }

    /// The same clients behind the [`Fetcher`] interface.
    pub fn fetchers(&self) -> FetcherSet {
        FetcherSet::from_fetchers(
            self.datadog.clone(),
            self.github.clone(),
            self.azuredevops.clone(),
            self.figma.clone(),
        )
    }
}

/// One fetcher per platform, sharing a single HTTP client.
#[derive(Clone)]
pub struct FetcherSet {
    datadog: Arc<dyn Fetcher>,
    github: Arc<dyn Fetcher>,
    azuredevops: Arc<dyn Fetcher>,
    figma: Arc<dyn Fetcher>,
}

impl FetcherSet {
    pub fn new(config: PlatformsConfig, client: Client) -> Self {
        PlatformClients::new(config, client).fetchers()
    }

    /// Assemble a set from arbitrary fetchers, e.g. stubs in tests.
    pub fn from_fetchers(
        datadog: Arc<dyn Fetcher>,
        github: Arc<dyn Fetcher>,
        azuredevops: Arc<dyn Fetcher>,
        figma: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            datadog,
            github,
            azuredevops,
            figma,
        }
    }

    pub fn get(&self, platform: Platform) -> Arc<dyn Fetcher> {
        match platform {
            Platform::Datadog => self.datadog.clone(),
            Platform::Github => self.github.clone(),
            Platform::AzureDevOps => self.azuredevops.clone(),
            Platform::Figma => self.figma.clone(),
        }
    }

    pub fn configured(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.get(*p).is_configured())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_configured_by_default() {
        let set = FetcherSet::new(PlatformsConfig::default(), Client::new());
        assert!(set.configured().is_empty());
        for platform in Platform::ALL {
            assert_eq!(set.get(platform).platform(), platform);
        }
    }

    #[test]
    fn test_configured_platforms() {
        let mut config = PlatformsConfig::default();
        config.github.token = Some("t".into());
        config.github.repos = vec!["acme/api".into()];
        config.azuredevops.pat = Some("p".into());
        let set = FetcherSet::new(config, Client::new());
        assert_eq!(
            set.configured(),
            vec![Platform::Github, Platform::AzureDevOps]
        );
    }
}
