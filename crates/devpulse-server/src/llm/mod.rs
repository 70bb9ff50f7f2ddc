mod anthropic;
mod azure;
mod openai;

pub use anthropic::AnthropicModel;
pub use azure::AzureOpenAiModel;
pub use openai::OpenAiModel;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A chat-completion backend: one system message, one user message, one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Azure,
    #[default]
    None,
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Azure => "azure",
            LlmProvider::None => "none",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" => Ok(LlmProvider::Anthropic),
            "azure" | "azure_openai" => Ok(LlmProvider::Azure),
            "" | "none" => Ok(LlmProvider::None),
            other => Err(anyhow!("unknown LLM provider '{}'", other)),
        }
    }
}

/// `[llm]` section of devpulse.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,

    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,

    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub anthropic_model: String,

    pub azure_endpoint: Option<String>,
    pub azure_key: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::None,
            max_tokens: 300,
            temperature: 0.7,
            timeout_secs: 30,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-4o".to_string(),
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            anthropic_model: "claude-3-5-sonnet-20241022".to_string(),
            azure_endpoint: None,
            azure_key: None,
            azure_deployment: None,
            azure_api_version: "2024-02-01".to_string(),
        }
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl LlmConfig {
    pub fn openai_configured(&self) -> bool {
        present(&self.openai_api_key)
    }

    pub fn anthropic_configured(&self) -> bool {
        present(&self.anthropic_api_key)
    }

    pub fn azure_configured(&self) -> bool {
        present(&self.azure_endpoint) && present(&self.azure_key) && present(&self.azure_deployment)
    }

    /// The selected provider has everything it needs.
    pub fn ready(&self) -> bool {
        match self.provider {
            LlmProvider::OpenAi => self.openai_configured(),
            LlmProvider::Anthropic => self.anthropic_configured(),
            LlmProvider::Azure => self.azure_configured(),
            LlmProvider::None => false,
        }
    }

    pub fn status(&self) -> LlmStatus {
        LlmStatus {
            llm_provider: self.provider,
            openai_configured: self.openai_configured(),
            anthropic_configured: self.anthropic_configured(),
            azure_configured: self.azure_configured(),
            ready: self.ready(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmStatus {
    pub llm_provider: LlmProvider,
    pub openai_configured: bool,
    pub anthropic_configured: bool,
    pub azure_configured: bool,
    pub ready: bool,
}

/// Build the model for the selected provider.
///
/// Returns `Ok(None)` when no provider is selected or the selected one lacks
/// credentials; the chatbot then answers with its canned fallback.
pub fn build_model(config: &LlmConfig) -> Result<Option<Arc<dyn ChatModel>>> {
    if config.provider == LlmProvider::None {
        info!("No LLM provider selected, chatbot will use fallback responses");
        return Ok(None);
    }
    if !config.ready() {
        warn!(
            "LLM provider '{}' selected but not configured, chatbot will use fallback responses",
            config.provider
        );
        return Ok(None);
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

    let model: Arc<dyn ChatModel> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiModel::new(config, client)?),
        LlmProvider::Anthropic => Arc::new(AnthropicModel::new(config, client)?),
        LlmProvider::Azure => Arc::new(AzureOpenAiModel::new(config, client)?),
        LlmProvider::None => return Ok(None),
    };
    info!("LLM provider: {}", model.name());
    Ok(Some(model))
}

/// Pull `message` out of an error body, falling back to the raw text.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(300).collect());
    anyhow!("API error {}: {}", status, detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!("azure".parse::<LlmProvider>().unwrap(), LlmProvider::Azure);
        assert_eq!("".parse::<LlmProvider>().unwrap(), LlmProvider::None);
        assert!("bard".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_status_reflects_credentials() {
        let mut config = LlmConfig {
            provider: LlmProvider::Azure,
            azure_endpoint: Some("https://x.openai.azure.com".into()),
            azure_key: Some("k".into()),
            ..Default::default()
        };
        assert!(!config.status().ready);

        config.azure_deployment = Some("gpt4o".into());
        let status = config.status();
        assert!(status.ready);
        assert!(status.azure_configured);
        assert!(!status.openai_configured);
    }

    #[test]
    fn test_unconfigured_provider_builds_nothing() {
        let config = LlmConfig {
            provider: LlmProvider::Anthropic,
            ..Default::default()
        };
        assert!(build_model(&config).unwrap().is_none());
        assert!(build_model(&LlmConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_error_message_prefers_api_detail() {
        let err = error_message(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error": {"message": "Incorrect API key provided"}}"#,
        );
        assert!(err.to_string().contains("Incorrect API key provided"));
    }
}
