use super::openai::{ChatMessage, ChatRequest, ChatResponse};
use super::{error_message, ChatModel, LlmConfig};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Azure OpenAI deployment. Same wire format as OpenAI, addressed by deployment.
pub struct AzureOpenAiModel {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
    max_tokens: u32,
    temperature: f32,
}

fn required(value: &Option<String>, var: &str) -> Result<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{} is not set", var))
}

impl AzureOpenAiModel {
    pub fn new(config: &LlmConfig, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            endpoint: required(&config.azure_endpoint, "AZURE_OPENAI_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            api_key: required(&config.azure_key, "AZURE_OPENAI_KEY")?,
            deployment: required(&config.azure_deployment, "AZURE_OPENAI_DEPLOYMENT")?,
            api_version: config.azure_api_version.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl ChatModel for AzureOpenAiModel {
    fn name(&self) -> &str {
        "azure"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: None,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(deployment = %self.deployment, "Sending Azure OpenAI chat request");
        let response = self
            .client
            .post(self.url())
            .header("api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_message(status, &body));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed.into_text()
    }
}
