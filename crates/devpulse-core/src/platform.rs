use crate::error::PulseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four integrated external services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Metrics and log platform.
    Datadog,
    /// Source-control platform.
    Github,
    /// Work-tracking platform.
    #[serde(rename = "azuredevops")]
    AzureDevOps,
    /// Design-collaboration platform.
    Figma,
}

impl Platform {
    /// Every known platform, in document order.
    pub const ALL: [Platform; 4] = [
        Platform::Datadog,
        Platform::Github,
        Platform::AzureDevOps,
        Platform::Figma,
    ];

    /// Identifier used as the key in the persisted document and in URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Datadog => "datadog",
            Platform::Github => "github",
            Platform::AzureDevOps => "azuredevops",
            Platform::Figma => "figma",
        }
    }

    /// Human-readable name for prompts and logs.
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Datadog => "Datadog",
            Platform::Github => "GitHub",
            Platform::AzureDevOps => "Azure DevOps",
            Platform::Figma => "Figma",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "datadog" => Ok(Platform::Datadog),
            "github" => Ok(Platform::Github),
            "azuredevops" => Ok(Platform::AzureDevOps),
            "figma" => Ok(Platform::Figma),
            other => Err(PulseError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Which part of the context a question is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    All,
    One(Platform),
}

impl Scope {
    pub fn includes(self, platform: Platform) -> bool {
        match self {
            Scope::All => true,
            Scope::One(p) => p == platform,
        }
    }

    pub fn platforms(self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.includes(*p))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::All => "all",
            Scope::One(p) => p.as_str(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = PulseError;

    /// `all`, `general` and the empty string select every platform.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" | "general" => Ok(Scope::All),
            other => other.parse().map(Scope::One),
        }
    }
}
