mod chatbot;
mod platforms;
mod routes;

pub use routes::create_router;

use crate::chat::Chatbot;
use crate::config::DevPulseConfig;
use crate::llm::build_model;
use crate::metrics::DevPulseMetrics;
use crate::refresh::{RefreshError, Refresher};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use devpulse_core::{ContextStore, JsonFileStore};
use devpulse_platforms::{http_client, FetchError, FetcherSet, PlatformClients};
use serde::Serialize;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ContextStore>,
    pub refresher: Refresher,
    pub clients: PlatformClients,
    pub chatbot: Arc<Chatbot>,
    pub metrics: Arc<DevPulseMetrics>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Open the context store and wire fetchers and the chat model from `config`.
    pub fn build(config: &DevPulseConfig) -> anyhow::Result<Self> {
        let store = Arc::new(ContextStore::open(JsonFileStore::in_dir(
            &config.server.data_dir,
        )));
        let client = http_client(config.server.request_timeout())?;
        let clients = PlatformClients::new(config.platforms.clone(), client);
        let fetchers = clients.fetchers();
        let model = build_model(&config.llm)?;
        Ok(Self::assemble(store, fetchers, clients, model, config.llm.status()))
    }

    /// `fetchers` drives refreshes and checks; `clients` serves the detail lookups.
    pub fn assemble(
        store: Arc<ContextStore>,
        fetchers: FetcherSet,
        clients: PlatformClients,
        model: Option<Arc<dyn crate::llm::ChatModel>>,
        status: crate::llm::LlmStatus,
    ) -> Self {
        let metrics = Arc::new(DevPulseMetrics::new());
        let refresher = Refresher::new(store.clone(), fetchers, metrics.clone());
        let chatbot = Arc::new(Chatbot::new(store.clone(), model, status, metrics.clone()));
        Self {
            store,
            refresher,
            clients,
            chatbot,
            metrics,
            start_time: std::time::Instant::now(),
        }
    }
}

/// JSON response wrapper
#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Custom error type for HTTP handlers
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonResponse::<()>::err(self.0.to_string())),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

fn error_response(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(JsonResponse::<()>::err(msg.into()))).into_response()
}

pub(super) fn not_found(msg: impl Into<String>) -> Response {
    error_response(StatusCode::NOT_FOUND, msg)
}

pub(super) fn bad_request(msg: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, msg)
}

/// Map a refresh failure onto a status: 400 for missing configuration or a bad window,
/// 502 for upstream failures, 500 when the store could not be written.
pub(super) fn refresh_error(err: RefreshError) -> Response {
    let status = match &err {
        e if e.is_rejected() => StatusCode::BAD_REQUEST,
        RefreshError::Fetch(_) => StatusCode::BAD_GATEWAY,
        RefreshError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

/// Status for a direct platform lookup: 400 when refused locally, 502 otherwise.
pub(super) fn fetch_error(err: FetchError) -> Response {
    let status = if err.is_rejected() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::BAD_GATEWAY
    };
    error_response(status, err.to_string())
}

pub(super) fn ok<T: Serialize>(data: T) -> Response {
    Json(JsonResponse::ok(data)).into_response()
}
