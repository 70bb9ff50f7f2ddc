use super::{bad_request, not_found, ok, AppResult, AppState};
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use devpulse_core::{Platform, Scope};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeRequest {
    pub question: String,
    pub data_source: Option<String>,
    pub context_data: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SummaryRequest {
    pub context_data: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuggestRequest {
    pub available_data: Option<Map<String, Value>>,
}

fn parse_scope(raw: Option<&str>) -> Result<Scope, Response> {
    raw.unwrap_or_default()
        .parse::<Scope>()
        .map_err(|e| bad_request(e.to_string()))
}

pub async fn status(State(state): State<AppState>) -> Response {
    ok(state.chatbot.llm_status())
}

pub async fn context_status(State(state): State<AppState>) -> Response {
    ok(state.store.status())
}

pub async fn context_clear(State(state): State<AppState>) -> AppResult<Response> {
    state.store.clear()?;
    Ok(ok(state.store.status()))
}

pub async fn context_section(
    State(state): State<AppState>,
    Path(platform): Path<String>,
) -> Response {
    match platform.parse::<Platform>() {
        Ok(p) => ok(state.store.retrieve(p)),
        Err(e) => not_found(e.to_string()),
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    let question = req.question.trim();
    if question.is_empty() {
        return bad_request("Question is required");
    }
    let scope = match parse_scope(req.data_source.as_deref()) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let answer = state
        .chatbot
        .analyze(question, scope, req.context_data.as_ref())
        .await;
    ok(answer)
}

pub async fn summary(
    State(state): State<AppState>,
    Path(data_source): Path<String>,
    body: Option<Json<SummaryRequest>>,
) -> Response {
    let scope = match parse_scope(Some(&data_source)) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let req = body.map(|Json(r)| r).unwrap_or_default();
    ok(state.chatbot.summarize(scope, req.context_data.as_ref()).await)
}

pub async fn suggest_questions(
    State(state): State<AppState>,
    Path(data_source): Path<String>,
    body: Option<Json<SuggestRequest>>,
) -> Response {
    let scope = match parse_scope(Some(&data_source)) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let req = body.map(|Json(r)| r).unwrap_or_default();
    ok(state
        .chatbot
        .suggest_questions(scope, req.available_data.as_ref())
        .await)
}
