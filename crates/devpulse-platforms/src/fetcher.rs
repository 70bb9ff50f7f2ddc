use crate::error::{FetchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use devpulse_core::{Platform, PlatformPayload};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_DAYS: u32 = 30;
pub const DEFAULT_HOURS: u32 = 24;
pub const DEFAULT_LIMIT: u32 = 100;

/// Time range and per-request filters for one fetch.
///
/// Filters that a platform does not understand are ignored by its fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchWindow {
    /// Look-back for GitHub, Azure DevOps and Figma.
    pub days: u32,
    /// Look-back for Datadog logs and metrics.
    pub hours: u32,
    /// Maximum number of log events requested from Datadog.
    pub limit: u32,
    /// `owner/repo` list overriding the configured repositories.
    pub repos: Vec<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub area_path: Option<String>,
    pub team_id: Option<String>,
    pub query: Option<String>,
    pub service: Option<String>,
    pub level: Option<String>,
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS,
            hours: DEFAULT_HOURS,
            limit: DEFAULT_LIMIT,
            repos: Vec::new(),
            organization: None,
            project: None,
            area_path: None,
            team_id: None,
            query: None,
            service: None,
            level: None,
        }
    }
}

impl FetchWindow {
    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Default::default()
        }
    }

    pub fn hours(hours: u32) -> Self {
        Self {
            hours,
            ..Default::default()
        }
    }

    /// Start of the `days` look-back.
    pub fn since_days(&self) -> Result<DateTime<Utc>> {
        days_ago(self.days)
    }

    /// Start of the `hours` look-back.
    pub fn since_hours(&self) -> Result<DateTime<Utc>> {
        hours_ago(self.hours)
    }
}

pub(crate) fn days_ago(days: u32) -> Result<DateTime<Utc>> {
    look_back(TimeDelta::try_days(i64::from(days)))
        .ok_or_else(|| FetchError::InvalidRequest(format!("{} days is out of range", days)))
}

pub(crate) fn hours_ago(hours: u32) -> Result<DateTime<Utc>> {
    look_back(TimeDelta::try_hours(i64::from(hours)))
        .ok_or_else(|| FetchError::InvalidRequest(format!("{} hours is out of range", hours)))
}

fn look_back(span: Option<TimeDelta>) -> Option<DateTime<Utc>> {
    span.and_then(|span| Utc::now().checked_sub_signed(span))
}

/// Pulls the latest data of one platform and normalizes it.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Credentials are present. Per-request filters may still be missing.
    fn is_configured(&self) -> bool;

    async fn fetch(&self, window: &FetchWindow) -> Result<PlatformPayload>;

    /// Verify the credentials against the platform with the cheapest calls
    /// that exercise them.
    async fn check(&self) -> Result<ConnectionCheck>;
}

/// A successful credential check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionCheck {
    pub platform: Platform,
    /// What was verified, e.g. `authenticated as octocat`.
    pub details: Vec<String>,
}

impl ConnectionCheck {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            details: Vec::new(),
        }
    }

    pub fn with(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

/// Shared outbound client. GitHub rejects requests without a user agent.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("devpulse/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Send `request` and decode a JSON body, mapping non-2xx to [`FetchError::Status`].
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FetchError::status(status.as_u16(), body));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults() {
        let window = FetchWindow::default();
        assert_eq!(window.days, 30);
        assert_eq!(window.hours, 24);
        assert_eq!(window.limit, 100);
        assert_eq!(FetchWindow::days(7).hours, 24);
    }

    #[test]
    fn test_look_back_bounds() {
        let since = FetchWindow::days(7).since_days().unwrap();
        assert!(since < Utc::now() - TimeDelta::days(6));

        let err = FetchWindow::days(u32::MAX).since_days().unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
        assert!(err.is_rejected());
        assert!(FetchWindow::hours(u32::MAX).since_hours().is_err());
        assert!(FetchWindow::hours(u32::MAX).since_days().is_ok());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" x ")), Some("x"));
        assert_eq!(non_empty(None), None);
    }
}
