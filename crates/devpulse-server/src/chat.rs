//! The analytics assistant: store context in, LLM answer (or fallback) out.

use crate::llm::{ChatModel, LlmStatus};
use crate::metrics::DevPulseMetrics;
use chrono::{DateTime, Utc};
use devpulse_core::prompt::{
    analysis_instruction, fallback_response, parse_suggestions, suggestion_instruction,
    summary_instruction, SYSTEM_PROMPT,
};
use devpulse_core::{ContextStore, PromptBuilder, Scope};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub response: String,
    pub data_source: &'static str,
    /// False when the canned fallback was returned instead of a model reply.
    pub from_model: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestions {
    pub questions: Vec<String>,
    pub data_source: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub struct Chatbot {
    store: Arc<ContextStore>,
    model: Option<Arc<dyn ChatModel>>,
    status: LlmStatus,
    builder: PromptBuilder,
    metrics: Arc<DevPulseMetrics>,
}

impl Chatbot {
    pub fn new(
        store: Arc<ContextStore>,
        model: Option<Arc<dyn ChatModel>>,
        status: LlmStatus,
        metrics: Arc<DevPulseMetrics>,
    ) -> Self {
        Self {
            store,
            model,
            status,
            builder: PromptBuilder::default(),
            metrics,
        }
    }

    pub fn llm_status(&self) -> &LlmStatus {
        &self.status
    }

    /// Answer a free-text question about `scope`.
    pub async fn analyze(
        &self,
        question: &str,
        scope: Scope,
        extra: Option<&Map<String, Value>>,
    ) -> ChatAnswer {
        let instruction = analysis_instruction(scope, question);
        let (response, from_model) = self.ask("analyze", scope, &instruction, extra).await;
        let response = response.unwrap_or_else(|| fallback_response(question));
        ChatAnswer {
            response,
            data_source: scope.as_str(),
            from_model,
            timestamp: Utc::now(),
        }
    }

    /// Executive summary of `scope`.
    pub async fn summarize(&self, scope: Scope, extra: Option<&Map<String, Value>>) -> ChatAnswer {
        let instruction = summary_instruction(scope);
        let (response, from_model) = self.ask("summary", scope, &instruction, extra).await;
        let response =
            response.unwrap_or_else(|| fallback_response(&format!("a summary of {} data", scope)));
        ChatAnswer {
            response,
            data_source: scope.as_str(),
            from_model,
            timestamp: Utc::now(),
        }
    }

    /// Up to five follow-up questions. Empty when no model answered.
    pub async fn suggest_questions(
        &self,
        scope: Scope,
        extra: Option<&Map<String, Value>>,
    ) -> Suggestions {
        let instruction = suggestion_instruction(scope);
        let (response, _) = self.ask("suggest", scope, &instruction, extra).await;
        Suggestions {
            questions: response.as_deref().map(parse_suggestions).unwrap_or_default(),
            data_source: scope.as_str(),
            timestamp: Utc::now(),
        }
    }

    /// Returns the model reply, or `None` when the fallback applies.
    async fn ask(
        &self,
        intent: &str,
        scope: Scope,
        instruction: &str,
        extra: Option<&Map<String, Value>>,
    ) -> (Option<String>, bool) {
        let Some(model) = &self.model else {
            self.metrics.record_chat(intent, scope.as_str(), "fallback");
            return (None, false);
        };

        let view = self.store.retrieve_scope(scope);
        let prompt = self.builder.build(&view, instruction, extra);
        debug!(intent, scope = %scope, chars = prompt.len(), "Sending chat prompt");

        match model.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(reply) => {
                self.metrics.record_chat(intent, scope.as_str(), "ok");
                (Some(reply), true)
            }
            Err(e) => {
                warn!("LLM call via {} failed, using fallback: {:#}", model.name(), e);
                self.metrics.record_chat(intent, scope.as_str(), "error");
                (None, false)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::{LlmConfig, LlmProvider};
    use async_trait::async_trait;
    use devpulse_core::{JsonFileStore, Platform};
    use serde_json::json;
    use std::sync::Mutex;

    /// Records prompts and replies with a fixed answer, or fails.
    pub(crate) struct StubModel {
        pub reply: Option<String>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl StubModel {
        pub(crate) fn answering(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
            assert_eq!(system, SYSTEM_PROMPT);
            self.prompts.lock().unwrap().push(user.to_string());
            self.reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn chatbot(model: Option<Arc<dyn ChatModel>>) -> (Chatbot, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContextStore::open(JsonFileStore::in_dir(dir.path())));
        store
            .record(
                Platform::Github,
                json!({"pull_requests": [{"id": 1, "title": "Fix login", "state": "open"}]}),
            )
            .unwrap();
        let status = LlmConfig {
            provider: LlmProvider::OpenAi,
            openai_api_key: Some("k".into()),
            ..Default::default()
        }
        .status();
        let bot = Chatbot::new(store, model, status, Arc::new(DevPulseMetrics::new()));
        (bot, dir)
    }

    #[tokio::test]
    async fn test_analyze_sends_context_and_question() {
        let model = StubModel::answering("<strong>1 open PR</strong>");
        let (bot, _dir) = chatbot(Some(model.clone()));

        let answer = bot.analyze("How many PRs are open?", Scope::One(Platform::Github), None).await;
        assert!(answer.from_model);
        assert_eq!(answer.response, "<strong>1 open PR</strong>");

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("Fix login"));
        assert!(prompts[0].contains("How many PRs are open?"));
    }

    #[tokio::test]
    async fn test_extra_context_reaches_prompt() {
        let model = StubModel::answering("ok");
        let (bot, _dir) = chatbot(Some(model.clone()));

        let extra = json!({"sprint": "42"});
        bot.summarize(Scope::All, extra.as_object()).await;
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("**Additional Context Data:**"));
        assert!(prompts[0].contains("- sprint: 42"));
    }

    #[tokio::test]
    async fn test_no_model_uses_fallback() {
        let (bot, _dir) = chatbot(None);
        let answer = bot.analyze("Any errors?", Scope::All, None).await;
        assert!(!answer.from_model);
        assert!(answer.response.contains("Any errors?"));
    }

    #[tokio::test]
    async fn test_model_failure_uses_fallback() {
        let (bot, _dir) = chatbot(Some(StubModel::failing()));
        let answer = bot.analyze("Any errors?", Scope::All, None).await;
        assert!(!answer.from_model);
        assert!(answer.response.contains("Any errors?"));

        let text = bot.metrics.encode().unwrap();
        assert!(text.contains(r#"outcome="error""#));
    }

    #[tokio::test]
    async fn test_suggestions_are_parsed() {
        let model = StubModel::answering(
            "Here are some ideas:\n1. Who merged the most PRs?\n\n2. Which repo is busiest?\nThanks",
        );
        let (bot, _dir) = chatbot(Some(model));
        let suggestions = bot.suggest_questions(Scope::One(Platform::Github), None).await;
        assert_eq!(suggestions.questions.len(), 2);
        assert_eq!(suggestions.questions[0], "1. Who merged the most PRs?");
    }

    #[tokio::test]
    async fn test_suggestions_empty_without_model() {
        let (bot, _dir) = chatbot(None);
        let suggestions = bot.suggest_questions(Scope::All, None).await;
        assert!(suggestions.questions.is_empty());
    }
}
