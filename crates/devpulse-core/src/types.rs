use crate::payload::PlatformPayload;
use crate::platform::{Platform, Scope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fetch state of one platform section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    NotFetched,
    Fetched,
    Error,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::NotFetched => "not_fetched",
            FetchStatus::Fetched => "fetched",
            FetchStatus::Error => "error",
        }
    }
}

/// The portion of the context document belonging to one platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformSection {
    #[serde(default)]
    pub status: FetchStatus,
    #[serde(default)]
    pub last_fetch: Option<DateTime<Utc>>,
    /// Reason of the most recent failed refresh. Only set while `status` is `error`.
    #[serde(default)]
    pub last_error: Option<String>,
    /// Most recently fetched record set. Kept through a failed refresh.
    #[serde(default)]
    pub data: Option<PlatformPayload>,
}

impl PlatformSection {
    pub fn is_fetched(&self) -> bool {
        self.status == FetchStatus::Fetched
    }
}

/// One section per known platform. A struct rather than a map so that no
/// platform can ever be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSources {
    #[serde(default)]
    pub datadog: PlatformSection,
    #[serde(default)]
    pub github: PlatformSection,
    #[serde(default)]
    pub azuredevops: PlatformSection,
    #[serde(default)]
    pub figma: PlatformSection,
}

impl DataSources {
    pub fn get(&self, platform: Platform) -> &PlatformSection {
        match platform {
            Platform::Datadog => &self.datadog,
            Platform::Github => &self.github,
            Platform::AzureDevOps => &self.azuredevops,
            Platform::Figma => &self.figma,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut PlatformSection {
        match platform {
            Platform::Datadog => &mut self.datadog,
            Platform::Github => &mut self.github,
            Platform::AzureDevOps => &mut self.azuredevops,
            Platform::Figma => &mut self.figma,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Platform, &PlatformSection)> {
        Platform::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

/// Aggregate counts derived from the data sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub total_work_items: u64,
    pub total_pull_requests: u64,
    pub total_repositories: u64,
    pub total_metrics: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Summary {
    pub fn derive(sources: &DataSources) -> Self {
        let mut summary = Summary::default();
        for (_, section) in sources.iter() {
            if let Some(payload) = &section.data {
                summary.total_work_items += payload.work_item_count();
                summary.total_pull_requests += payload.pull_request_count();
                summary.total_repositories += payload.repository_count();
                summary.total_metrics += payload.metric_count();
            }
            summary.last_activity = summary.last_activity.max(section.last_fetch);
        }
        summary
    }
}

/// The persisted snapshot of the most recent data fetched from each platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data_sources: DataSources,
    #[serde(default)]
    pub summary: Summary,
}

impl ContextDocument {
    /// A document with every platform `not_fetched`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn section(&self, platform: Platform) -> &PlatformSection {
        self.data_sources.get(platform)
    }

    pub fn recompute_summary(&mut self) {
        self.summary = Summary::derive(&self.data_sources);
    }

    /// Repair a document read from disk: drop payloads filed under the wrong
    /// platform, clear stale error reasons, and re-derive the summary.
    pub fn normalize(&mut self) {
        for platform in Platform::ALL {
            let section = self.data_sources.get_mut(platform);
            if let Some(payload) = &section.data {
                if payload.platform() != platform {
                    log::warn!(
                        "Dropping {} payload stored under {} section",
                        payload.platform(),
                        platform
                    );
                    *section = PlatformSection::default();
                }
            }
            if section.status != FetchStatus::Error {
                section.last_error = None;
            }
        }
        self.recompute_summary();
    }

    pub fn view(&self, scope: Scope) -> ContextView {
        ContextView {
            scope,
            last_updated: self.last_updated,
            summary: self.summary.clone(),
            sections: self
                .data_sources
                .iter()
                .filter(|(p, _)| scope.includes(*p))
                .map(|(p, s)| (p, s.clone()))
                .collect(),
        }
    }

    pub fn status(&self) -> ContextStatus {
        ContextStatus {
            last_updated: self.last_updated,
            data_sources: self
                .data_sources
                .iter()
                .map(|(p, s)| {
                    (
                        p,
                        SourceStatus {
                            status: s.status,
                            last_fetch: s.last_fetch,
                            last_error: s.last_error.clone(),
                        },
                    )
                })
                .collect(),
            summary: self.summary.clone(),
        }
    }
}

/// Read-only slice of the document handed to the prompt builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextView {
    #[serde(skip)]
    pub scope: Scope,
    pub last_updated: Option<DateTime<Utc>>,
    pub summary: Summary,
    pub sections: BTreeMap<Platform, PlatformSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub status: FetchStatus,
    pub last_fetch: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_error: Option<String>,
}

/// Per-platform fetch state, for observability and UI display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStatus {
    pub last_updated: Option<DateTime<Utc>>,
    pub data_sources: BTreeMap<Platform, SourceStatus>,
    pub summary: Summary,
}

impl ContextStatus {
    pub fn all_not_fetched(&self) -> bool {
        self.data_sources
            .values()
            .all(|s| s.status == FetchStatus::NotFetched)
    }
}
