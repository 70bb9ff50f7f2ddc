use super::{error_message, ChatModel, LlmConfig};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API. The system prompt travels as a top-level field.
pub struct AnthropicModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicModel {
    pub fn new(config: &LlmConfig, client: Client) -> Result<Self> {
        let api_key = config
            .anthropic_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("ANTHROPIC_API_KEY is not set"))?;
        Ok(Self {
            client,
            api_key,
            base_url: config.anthropic_base_url.trim_end_matches('/').to_string(),
            model: config.anthropic_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            system,
            messages: vec![Message { role: "user", content: user }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(model = %self.model, "Sending Anthropic messages request");
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_message(status, &body));
        }

        let parsed: MessagesResponse = response.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(anyhow!("No content in response"));
        }
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmProvider;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_complete_uses_messages_api() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "system": "you are an analyst",
                "messages": [{"role": "user", "content": "summarize"}]
            })))
            .with_status(200)
            .with_body(
                r#"{"content": [{"type": "text", "text": "All quiet."}], "stop_reason": "end_turn"}"#,
            )
            .create_async()
            .await;

        let config = LlmConfig {
            provider: LlmProvider::Anthropic,
            anthropic_api_key: Some("sk-ant-test".into()),
            anthropic_base_url: server.url(),
            ..Default::default()
        };
        let model = AnthropicModel::new(&config, Client::new()).unwrap();
        let answer = model.complete("you are an analyst", "summarize").await.unwrap();
        mock.assert_async().await;
        assert_eq!(answer, "All quiet.");
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(r#"{"content": []}"#)
            .create_async()
            .await;

        let config = LlmConfig {
            anthropic_api_key: Some("k".into()),
            anthropic_base_url: server.url(),
            ..Default::default()
        };
        let model = AnthropicModel::new(&config, Client::new()).unwrap();
        assert!(model.complete("s", "u").await.is_err());
    }
}
