use crate::llm::{LlmConfig, LlmProvider};
use anyhow::{Context, Result};
use devpulse_core::DEFAULT_DATA_DIR;
use devpulse_platforms::PlatformsConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of `devpulse.toml`. Environment variables override file values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevPulseConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    #[serde(flatten)]
    pub platforms: PlatformsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Seconds between background refreshes of every configured platform. 0 disables.
    pub refresh_interval_secs: u64,
    /// Timeout for outbound platform requests.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 5002)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            refresh_interval_secs: 0,
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

const REDACTED: &str = "********";

fn redact(value: &mut Option<String>) {
    if value.is_some() {
        *value = Some(REDACTED.to_string());
    }
}

impl DevPulseConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Overlay credentials and endpoints from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let dd = &mut self.platforms.datadog;
        if let Some(v) = get("DD_API_KEY") {
            dd.api_key = Some(v);
        }
        if let Some(v) = get("DD_APPLICATION_KEY") {
            dd.application_key = Some(v);
        }
        if let Some(v) = get("DD_SITE") {
            dd.site = v;
        }

        let gh = &mut self.platforms.github;
        if let Some(v) = get("GITHUB_TOKEN") {
            gh.token = Some(v);
        }
        if let Some(v) = get("GITHUB_REPOS") {
            gh.repos = v
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
        }

        let ado = &mut self.platforms.azuredevops;
        if let Some(v) = get("AZURE_DEVOPS_PAT") {
            ado.pat = Some(v);
        }
        if let Some(v) = get("AZURE_DEVOPS_ORG") {
            ado.organization = Some(v);
        }
        if let Some(v) = get("AZURE_DEVOPS_PROJECT") {
            ado.project = Some(v);
        }

        let figma = &mut self.platforms.figma;
        if let Some(v) = get("FIGMA_TOKEN") {
            figma.token = Some(v);
        }
        if let Some(v) = get("FIGMA_TEAM_ID") {
            figma.team_id = Some(v);
        }

        let llm = &mut self.llm;
        if let Some(v) = get("LLM_PROVIDER") {
            match v.parse::<LlmProvider>() {
                Ok(p) => llm.provider = p,
                Err(e) => tracing::warn!("Ignoring LLM_PROVIDER: {}", e),
            }
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            llm.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            llm.openai_base_url = v;
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            llm.anthropic_api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            llm.azure_endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_KEY") {
            llm.azure_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT") {
            llm.azure_deployment = Some(v);
        }
    }

    /// Returns a list of validation errors. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server.request_timeout_secs == 0 {
            errors.push("server.request_timeout_secs must be > 0".into());
        }
        if self.llm.timeout_secs == 0 {
            errors.push("llm.timeout_secs must be > 0".into());
        }
        if self.llm.max_tokens == 0 {
            errors.push("llm.max_tokens must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            ));
        }
        if self.llm.provider != LlmProvider::None && !self.llm.ready() {
            errors.push(format!(
                "llm.provider is '{}' but its credentials are missing",
                self.llm.provider
            ));
        }
        for repo in &self.platforms.github.repos {
            let mut parts = repo.split('/');
            let valid = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
            );
            if !valid {
                errors.push(format!("github.repos entry '{}' is not owner/name", repo));
            }
        }
        for q in &self.platforms.datadog.metric_queries {
            if q.query.trim().is_empty() {
                errors.push(format!("datadog metric query '{}' is empty", q.name));
            }
        }

        errors
    }

    /// A copy with every secret masked, for `config show`.
    pub fn redacted(&self) -> Self {
        let mut out = self.clone();
        redact(&mut out.platforms.datadog.api_key);
        redact(&mut out.platforms.datadog.application_key);
        redact(&mut out.platforms.github.token);
        redact(&mut out.platforms.azuredevops.pat);
        redact(&mut out.platforms.figma.token);
        redact(&mut out.llm.openai_api_key);
        redact(&mut out.llm.anthropic_api_key);
        redact(&mut out.llm.azure_key);
        out
    }
}
