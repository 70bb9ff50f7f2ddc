use crate::chat::Chatbot;
use crate::config::DevPulseConfig;
use crate::llm::build_model;
use crate::metrics::DevPulseMetrics;
use anyhow::Result;
use devpulse_core::{ContextStore, JsonFileStore, Scope};
use std::sync::Arc;

/// One-shot question against the local snapshot. Nothing is fetched.
pub async fn run(config: &DevPulseConfig, question: &str, scope: &str) -> Result<()> {
    let scope: Scope = scope.parse()?;
    let store = Arc::new(ContextStore::open(JsonFileStore::in_dir(
        &config.server.data_dir,
    )));
    if store.status().all_not_fetched() {
        eprintln!("Note: no platform data recorded yet; run `devpulse refresh` first.");
    }

    let model = build_model(&config.llm)?;
    let chatbot = Chatbot::new(
        store,
        model,
        config.llm.status(),
        Arc::new(DevPulseMetrics::new()),
    );
    let answer = chatbot.analyze(question, scope, None).await;
    println!("{}", answer.response);
    Ok(())
}
