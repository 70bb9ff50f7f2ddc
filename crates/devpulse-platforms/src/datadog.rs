use crate::error::{FetchError, Result};
use crate::fetcher::{hours_ago, non_empty, send_json, ConnectionCheck, FetchWindow, Fetcher};
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use devpulse_core::{DatadogData, LogDigest, LogEntry, MetricSample, Platform, PlatformPayload};
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};

pub const DEFAULT_SITE: &str = "datadoghq.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatadogConfig {
    pub api_key: Option<String>,
    pub application_key: Option<String>,
    pub site: String,
    /// Overrides `https://api.{site}`.
    pub base_url: Option<String>,
    pub metric_queries: Vec<MetricQuery>,
}

impl Default for DatadogConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            application_key: None,
            site: DEFAULT_SITE.to_string(),
            base_url: None,
            metric_queries: Vec::new(),
        }
    }
}

impl DatadogConfig {
    pub fn api_base(&self) -> String {
        match non_empty(self.base_url.as_deref()) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://api.{}", self.site),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    #[serde(default)]
    data: Vec<ApiLog>,
}

#[derive(Debug, Deserialize)]
struct ApiLog {
    id: Option<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    series: Vec<ApiSeries>,
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
    #[serde(default)]
    metric: String,
    #[serde(default)]
    pointlist: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    unit: Option<Vec<Option<ApiUnit>>>,
}

#[derive(Debug, Deserialize)]
struct ApiUnit {
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: bool,
}

pub struct DatadogFetcher {
    config: DatadogConfig,
    client: Client,
}

impl DatadogFetcher {
    pub fn new(config: DatadogConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn keys(&self) -> Result<(&str, &str)> {
        let api_key = non_empty(self.config.api_key.as_deref())
            .ok_or_else(|| FetchError::not_configured(Platform::Datadog, "DD_API_KEY"))?;
        let app_key = non_empty(self.config.application_key.as_deref())
            .ok_or_else(|| FetchError::not_configured(Platform::Datadog, "DD_APPLICATION_KEY"))?;
        Ok((api_key, app_key))
    }

    fn authed(&self, request: RequestBuilder, (api_key, app_key): (&str, &str)) -> RequestBuilder {
        request
            .header("DD-API-KEY", api_key)
            .header("DD-APPLICATION-KEY", app_key)
            .header("Accept", "application/json")
    }

    /// Fetch, deduplicate and digest log events for the window.
    pub async fn fetch_logs(&self, window: &FetchWindow) -> Result<LogDigest> {
        let keys = self.keys()?;
        let from = window.since_hours()?;
        let to = Utc::now();
        let query = build_log_query(
            window.query.as_deref(),
            window.service.as_deref(),
            window.level.as_deref(),
        );
        debug!(%query, "Fetching Datadog logs");

        let response: LogsResponse = send_json(
            self.authed(
                self.client
                    .get(format!("{}/api/v2/logs/events", self.config.api_base())),
                keys,
            )
            .query(&[
                ("filter[query]", query),
                ("filter[from]", from.timestamp_millis().to_string()),
                ("filter[to]", to.timestamp_millis().to_string()),
                ("page[limit]", window.limit.to_string()),
                ("sort", "-timestamp".to_string()),
            ]),
        )
        .await?;

        let fetched = response.data.len();
        let entries = dedup(response.data.into_iter().map(to_entry).collect());
        if entries.len() < fetched {
            debug!(removed = fetched - entries.len(), "Dropped duplicate log events");
        }
        Ok(digest(entries))
    }

    async fn fetch_metric(&self, metric: &MetricQuery, hours: u32) -> Result<Option<MetricSample>> {
        let keys = self.keys()?;
        let from = hours_ago(hours)?;
        let to = Utc::now();
        let response: QueryResponse = send_json(
            self.authed(
                self.client
                    .get(format!("{}/api/v1/query", self.config.api_base())),
                keys,
            )
            .query(&[
                ("query", metric.query.clone()),
                ("from", from.timestamp().to_string()),
                ("to", to.timestamp().to_string()),
            ]),
        )
        .await?;

        let Some(series) = response.series.into_iter().next() else {
            return Ok(None);
        };
        let value = series.pointlist.iter().rev().find_map(|(_, v)| *v);
        let unit = metric.unit.clone().or_else(|| {
            series
                .unit
                .into_iter()
                .flatten()
                .flatten()
                .find_map(|u| u.short_name)
        });
        Ok(Some(MetricSample {
            name: if metric.name.is_empty() {
                series.metric
            } else {
                metric.name.clone()
            },
            value,
            unit,
            query: Some(metric.query.clone()),
        }))
    }
}

#[async_trait]
impl Fetcher for DatadogFetcher {
    fn platform(&self) -> Platform {
        Platform::Datadog
    }

    fn is_configured(&self) -> bool {
        self.keys().is_ok()
    }

    async fn fetch(&self, window: &FetchWindow) -> Result<PlatformPayload> {
        let logs = self.fetch_logs(window).await?;
        let mut metrics = Vec::new();
        for metric in &self.config.metric_queries {
            if let Some(sample) = self.fetch_metric(metric, window.hours).await? {
                metrics.push(sample);
            }
        }
        info!(
            logs = logs.total_logs,
            metrics = metrics.len(),
            "Fetched Datadog analytics"
        );
        Ok(PlatformPayload::Datadog(DatadogData {
            metrics,
            logs: Some(logs),
        }))
    }

    /// Validates the API key, then runs a one-event log search to exercise the
    /// application key.
    async fn check(&self) -> Result<ConnectionCheck> {
        let keys = self.keys()?;
        let validation: ValidateResponse = send_json(self.authed(
            self.client
                .get(format!("{}/api/v1/validate", self.config.api_base())),
            keys,
        ))
        .await?;
        if !validation.valid {
            return Err(FetchError::status(403, "API key was not accepted".into()));
        }

        let sample = FetchWindow {
            hours: 1,
            limit: 1,
            ..Default::default()
        };
        let logs = self.fetch_logs(&sample).await?;
        Ok(ConnectionCheck::new(Platform::Datadog)
            .with(format!("API key valid for {}", self.config.site))
            .with(format!(
                "log search returned {} events from the last hour",
                logs.total_logs
            )))
    }
}

fn build_log_query(query: Option<&str>, service: Option<&str>, level: Option<&str>) -> String {
    let mut query = non_empty(query).unwrap_or("*").to_string();
    if let Some(service) = non_empty(service) {
        query = format!("service:{} {}", service, query);
    }
    if let Some(level) = non_empty(level) {
        query = format!("status:{} {}", level.to_lowercase(), query);
    }
    query
}

fn attr_str(attributes: &Map<String, Value>, key: &str) -> Option<String> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn to_entry(log: ApiLog) -> LogEntry {
    let attrs = &log.attributes;
    let inner = attrs.get("attributes").and_then(Value::as_object);
    let level = attr_str(attrs, "status")
        .or_else(|| inner.and_then(|i| attr_str(i, "@l").or_else(|| attr_str(i, "level"))))
        .unwrap_or_else(|| "info".to_string())
        .to_uppercase();

    LogEntry {
        id: log.id.filter(|id| !id.is_empty()),
        timestamp: attr_str(attrs, "timestamp")
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|t| t.with_timezone(&Utc)),
        message: attr_str(attrs, "message").unwrap_or_default(),
        service: attr_str(attrs, "service").unwrap_or_default(),
        level,
        host: attr_str(attrs, "host").unwrap_or_default(),
        tags: attrs
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

fn normalizers() -> &'static [(Regex, &'static str); 3] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |p: &str| Regex::new(p).expect("static pattern");
        [
            (
                compile(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"),
                "UUID",
            ),
            (compile(r"\d{4}-\d{2}-\d{2}"), "DATE"),
            (compile(r"\d{2}:\d{2}:\d{2}"), "TIME"),
        ]
    })
}

/// Replace request-specific tokens so repeated messages compare equal.
pub fn normalize_message(message: &str) -> String {
    normalizers()
        .iter()
        .fold(message.to_string(), |acc, (re, token)| {
            re.replace_all(&acc, *token).into_owned()
        })
}

#[derive(Hash, PartialEq, Eq)]
enum DedupKey {
    Id(String),
    Content {
        message: String,
        service: String,
        level: String,
        minute: Option<DateTime<Utc>>,
    },
}

/// Keep the first occurrence of every log event.
///
/// Events are identified by id; events without one by normalized message,
/// service, level and the minute they were logged in.
fn dedup(entries: Vec<LogEntry>) -> Vec<LogEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| {
            let key = match &entry.id {
                Some(id) => DedupKey::Id(id.clone()),
                None => DedupKey::Content {
                    message: normalize_message(&entry.message),
                    service: entry.service.clone(),
                    level: entry.level.clone(),
                    minute: entry
                        .timestamp
                        .and_then(|t| t.duration_trunc(Duration::minutes(1)).ok()),
                },
            };
            seen.insert(key)
        })
        .collect()
}

fn digest(entries: Vec<LogEntry>) -> LogDigest {
    let mut by_level = BTreeMap::new();
    let mut by_service = BTreeMap::new();
    for entry in &entries {
        *by_level.entry(entry.level.clone()).or_default() += 1;
        if !entry.service.is_empty() {
            *by_service.entry(entry.service.clone()).or_default() += 1;
        }
    }
    let mut services: Vec<(&String, &u64)> = by_service.iter().collect();
    services.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let services = services.into_iter().map(|(s, _)| s.clone()).collect();

    LogDigest {
        total_logs: entries.len() as u64,
        services,
        by_level,
        by_service,
        entries,
    }
}
