use super::{chatbot, platforms, AppResult, AppState, JsonResponse};
use crate::metrics::HttpLabel;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use devpulse_core::ContextStatus;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        // Platforms
        .route("/api/github/prs", get(platforms::github_prs))
        .route("/api/github/prs/chart", get(platforms::github_chart))
        .route("/api/github/prs/:number", get(platforms::github_pr_detail))
        .route("/api/github/test", get(platforms::github_test))
        .route("/api/azuredevops/analytics", get(platforms::azuredevops_analytics))
        .route("/api/azuredevops/chart", get(platforms::azuredevops_chart))
        .route("/api/azuredevops/builds", get(platforms::azuredevops_builds))
        .route("/api/azuredevops/pullrequests", get(platforms::azuredevops_pull_requests))
        .route("/api/azuredevops/test", get(platforms::azuredevops_test))
        .route("/api/figma/analytics", get(platforms::figma_analytics))
        .route("/api/figma/chart", get(platforms::figma_chart))
        .route("/api/figma/projects", get(platforms::figma_projects))
        .route("/api/figma/projects/:project_id/files", get(platforms::figma_project_files))
        .route("/api/figma/files/:file_key", get(platforms::figma_file_info))
        .route("/api/figma/files/:file_key/comments", get(platforms::figma_file_comments))
        .route("/api/figma/search", get(platforms::figma_search))
        .route("/api/figma/test", get(platforms::figma_test))
        .route("/api/datadog/logs", get(platforms::datadog_logs))
        .route("/api/datadog/logs/stats", get(platforms::datadog_log_stats))
        .route("/api/datadog/services", get(platforms::datadog_services))
        .route("/api/datadog/chart", get(platforms::datadog_chart))
        .route("/api/datadog/test", get(platforms::datadog_test))
        // Chatbot
        .route("/api/chatbot/status", get(chatbot::status))
        .route("/api/chatbot/context", get(chatbot::context_status))
        .route("/api/chatbot/context/clear", post(chatbot::context_clear))
        .route("/api/chatbot/context/:platform", get(chatbot::context_section))
        .route("/api/chatbot/analyze", post(chatbot::analyze))
        .route("/api/chatbot/summary/:data_source", post(chatbot::summary))
        .route(
            "/api/chatbot/suggest-questions/:data_source",
            post(chatbot::suggest_questions),
        )
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn count_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    state
        .metrics
        .http_requests
        .get_or_create(&HttpLabel {
            method,
            status: response.status().as_u16().to_string(),
        })
        .inc();
    response
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    uptime_seconds: u64,
    configured_platforms: Vec<String>,
    context: ContextStatus,
}

async fn health(State(state): State<AppState>) -> Json<JsonResponse<HealthResponse>> {
    let configured_platforms = state
        .refresher
        .fetchers()
        .configured()
        .into_iter()
        .map(|p| p.to_string())
        .collect();

    Json(JsonResponse::ok(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        configured_platforms,
        context: state.store.status(),
    }))
}

async fn metrics(State(state): State<AppState>) -> AppResult<Response> {
    state
        .metrics
        .observe_context(&state.store.status(), state.start_time.elapsed().as_secs());
    let body = state.metrics.encode()?;
    Ok((
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::StubModel;
    use crate::llm::{ChatModel, LlmConfig};
    use crate::refresh::tests::{github_payload, StubFetcher};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use devpulse_core::{
        AzureDevOpsData, ContextStore, DatadogData, FetchStatus, JsonFileStore, LogDigest,
        Platform, PlatformPayload,
    };
    use std::collections::BTreeMap;
    use devpulse_platforms::{
        http_client, FetchError, FetcherSet, FigmaConfig, GithubConfig, PlatformClients,
        PlatformsConfig,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        router: Router,
        store: Arc<ContextStore>,
        _dir: tempfile::TempDir,
    }

    fn harness(github: Arc<StubFetcher>, model: Option<Arc<dyn ChatModel>>) -> Harness {
        harness_with(
            FetcherSet::from_fetchers(
                StubFetcher::unconfigured(Platform::Datadog),
                github,
                StubFetcher::unconfigured(Platform::AzureDevOps),
                StubFetcher::unconfigured(Platform::Figma),
            ),
            model,
        )
    }

    fn harness_with(fetchers: FetcherSet, model: Option<Arc<dyn ChatModel>>) -> Harness {
        harness_full(fetchers, clients(PlatformsConfig::default()), model)
    }

    fn clients(config: PlatformsConfig) -> PlatformClients {
        PlatformClients::new(config, http_client(std::time::Duration::from_secs(5)).unwrap())
    }

    /// Detail lookups reach real clients pointed at `config`; refreshes stay stubbed.
    fn harness_clients(config: PlatformsConfig) -> Harness {
        let github = StubFetcher::unconfigured(Platform::Github);
        let fetchers = FetcherSet::from_fetchers(
            StubFetcher::unconfigured(Platform::Datadog),
            github,
            StubFetcher::unconfigured(Platform::AzureDevOps),
            StubFetcher::unconfigured(Platform::Figma),
        );
        harness_full(fetchers, clients(config), None)
    }

    fn harness_full(
        fetchers: FetcherSet,
        clients: PlatformClients,
        model: Option<Arc<dyn ChatModel>>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContextStore::open(JsonFileStore::in_dir(dir.path())));
        let state = AppState::assemble(
            store.clone(),
            fetchers,
            clients,
            model,
            LlmConfig::default().status(),
        );
        Harness {
            router: create_router(state),
            store,
            _dir: dir,
        }
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        let (status, body) = send(&h.router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["healthy"], true);
        assert_eq!(
            body["data"]["context"]["data_sources"]["github"]["status"],
            "not_fetched"
        );
    }

    #[tokio::test]
    async fn test_github_prs_records_context() {
        let h = harness(
            StubFetcher::new(Platform::Github, vec![Ok(github_payload(2))]),
            None,
        );
        let (status, body) = send(&h.router, "GET", "/api/github/prs?days=7&repos=acme/api", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["platform"], "github");
        assert_eq!(body["data"]["open_prs"], 2);

        assert_eq!(h.store.retrieve(Platform::Github).status, FetchStatus::Fetched);
        assert_eq!(h.store.status().summary.total_pull_requests, 2);
    }

    #[tokio::test]
    async fn test_github_repos_repeated_encoded_and_comma_separated() {
        let github = StubFetcher::new(
            Platform::Github,
            vec![Ok(github_payload(1)), Ok(github_payload(1))],
        );
        let h = harness(github.clone(), None);
        let (status, _) = send(
            &h.router,
            "GET",
            "/api/github/prs?days=7&repos=acme%2Fapi&repos=acme/web%2Cacme/docs",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&h.router, "GET", "/api/github/prs/chart?repos%5B%5D=acme%2Fops", None).await;
        assert_eq!(status, StatusCode::OK);

        let windows = github.windows();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].days, 7);
        assert_eq!(windows[0].repos, vec!["acme/api", "acme/web", "acme/docs"]);
        assert_eq!(windows[1].repos, vec!["acme/ops"]);
    }

    #[tokio::test]
    async fn test_github_chart() {
        let h = harness(
            StubFetcher::new(Platform::Github, vec![Ok(github_payload(3))]),
            None,
        );
        let (status, body) = send(&h.router, "GET", "/api/github/prs/chart?type=overview", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["chart_type"], "pie");
        assert_eq!(body["data"]["labels"][0], "Open");
        assert_eq!(body["data"]["values"][0], 3.0);
    }

    #[tokio::test]
    async fn test_unconfigured_platform_is_bad_request() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        let (status, body) = send(&h.router, "GET", "/api/figma/analytics", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(h.store.retrieve(Platform::Figma).status, FetchStatus::NotFetched);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let h = harness(
            StubFetcher::new(
                Platform::Github,
                vec![Err(FetchError::Status {
                    code: 401,
                    body: "Bad credentials".into(),
                })],
            ),
            None,
        );
        let (status, body) = send(&h.router, "GET", "/api/github/prs", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("Bad credentials"));
        assert_eq!(h.store.retrieve(Platform::Github).status, FetchStatus::Error);
    }

    #[tokio::test]
    async fn test_azuredevops_chart_by_type() {
        let payload = PlatformPayload::AzureDevOps(AzureDevOpsData {
            work_items_by_type: BTreeMap::from([("Bug".to_string(), 4), ("Task".to_string(), 1)]),
            ..Default::default()
        });
        let h = harness_with(
            FetcherSet::from_fetchers(
                StubFetcher::unconfigured(Platform::Datadog),
                StubFetcher::unconfigured(Platform::Github),
                StubFetcher::new(Platform::AzureDevOps, vec![Ok(payload)]),
                StubFetcher::unconfigured(Platform::Figma),
            ),
            None,
        );
        let (status, body) = send(
            &h.router,
            "GET",
            "/api/azuredevops/chart?type=work_items_by_type&org=acme&project=web",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["labels"], json!(["Bug", "Task"]));
        assert_eq!(body["data"]["values"], json!([4.0, 1.0]));
        assert_eq!(h.store.retrieve(Platform::AzureDevOps).status, FetchStatus::Fetched);
    }

    #[tokio::test]
    async fn test_datadog_services_and_empty_chart() {
        let digest = LogDigest {
            total_logs: 2,
            services: vec!["api".into(), "worker".into()],
            ..Default::default()
        };
        let payload = || {
            PlatformPayload::Datadog(DatadogData {
                logs: Some(digest.clone()),
                ..Default::default()
            })
        };
        let h = harness_with(
            FetcherSet::from_fetchers(
                StubFetcher::new(Platform::Datadog, vec![Ok(payload()), Ok(payload())]),
                StubFetcher::unconfigured(Platform::Github),
                StubFetcher::unconfigured(Platform::AzureDevOps),
                StubFetcher::unconfigured(Platform::Figma),
            ),
            None,
        );

        let (status, body) = send(&h.router, "GET", "/api/datadog/services?hours=6", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!(["api", "worker"]));

        let (status, body) = send(&h.router, "GET", "/api/datadog/chart?type=metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_bad_request() {
        let github = devpulse_platforms::GithubFetcher::new(
            devpulse_platforms::GithubConfig {
                token: Some("ghp_test".into()),
                repos: vec!["acme/api".into()],
                base_url: "http://127.0.0.1:1".into(),
            },
            reqwest::Client::new(),
        );
        let h = harness_with(
            FetcherSet::from_fetchers(
                StubFetcher::unconfigured(Platform::Datadog),
                Arc::new(github),
                StubFetcher::unconfigured(Platform::AzureDevOps),
                StubFetcher::unconfigured(Platform::Figma),
            ),
            None,
        );
        let (status, body) = send(&h.router, "GET", "/api/github/prs?days=4294967295", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("out of range"));
        assert_eq!(h.store.retrieve(Platform::Github).status, FetchStatus::NotFetched);
    }

    #[tokio::test]
    async fn test_platform_test_routes() {
        let h = harness(
            StubFetcher::new(Platform::Github, vec![Ok(github_payload(1))]),
            None,
        );
        let (status, body) = send(&h.router, "GET", "/api/github/test", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["platform"], "github");
        assert_eq!(body["data"]["details"], json!(["stub reachable"]));

        let (status, body) = send(&h.router, "GET", "/api/datadog/test", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not configured"));
        // checks never touch the context
        assert!(h.store.status().all_not_fetched());
    }

    #[tokio::test]
    async fn test_github_pr_detail_route() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/acme/web/pulls/12")
            .with_status(200)
            .with_body(
                json!({
                    "number": 12, "title": "Add search", "state": "closed", "merged": true,
                    "draft": false, "user": {"login": "kim"}, "body": null,
                    "html_url": "https://github.com/acme/web/pull/12",
                    "created_at": "2024-05-01T10:00:00Z", "merged_at": "2024-05-02T10:00:00Z",
                    "head": {"ref": "search"}, "base": {"ref": "main"},
                    "additions": 10, "deletions": 2, "changed_files": 3,
                    "commits": 2, "comments": 1, "review_comments": 4
                })
                .to_string(),
            )
            .create_async()
            .await;
        let mut config = PlatformsConfig::default();
        config.github = GithubConfig {
            token: Some("ghp_test".into()),
            repos: vec!["acme/api".into()],
            base_url: server.url(),
        };
        let h = harness_clients(config);

        let (status, body) = send(&h.router, "GET", "/api/github/prs/12?repo=acme/web", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["repository"], "acme/web");
        assert_eq!(body["data"]["merged"], true);
        assert_eq!(body["data"]["head"], "search");

        // static segment wins over the number capture
        let (status, _) = send(&h.router, "GET", "/api/github/prs/chart", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(h.store.retrieve(Platform::Github).status, FetchStatus::NotFetched);
    }

    #[tokio::test]
    async fn test_figma_lookup_routes() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/projects/10/files")
            .with_status(200)
            .with_body(r#"{"files": [{"key": "a", "name": "Checkout"}]}"#)
            .create_async()
            .await;
        let mut config = PlatformsConfig::default();
        config.figma = FigmaConfig {
            token: Some("figd_test".into()),
            team_id: Some("team-1".into()),
            base_url: server.url(),
        };
        let h = harness_clients(config);

        let (status, body) = send(&h.router, "GET", "/api/figma/projects/10/files", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["key"], "a");

        let (status, body) = send(&h.router, "GET", "/api/figma/search?q=", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("search query is required"));
    }

    #[tokio::test]
    async fn test_azuredevops_pull_request_status_is_validated() {
        let h = harness_clients(PlatformsConfig::default());
        let (status, body) = send(
            &h.router,
            "GET",
            "/api/azuredevops/pullrequests?status=merged",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("merged"));

        let (status, _) = send(&h.router, "GET", "/api/azuredevops/builds", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_context_section_and_unknown_platform() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        h.store
            .record(Platform::Github, json!({"pull_requests": [{"id": 1, "state": "open"}]}))
            .unwrap();

        let (status, body) = send(&h.router, "GET", "/api/chatbot/context/github", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "fetched");

        let (status, _) = send(&h.router, "GET", "/api/chatbot/context/jira", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_context_clear() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        h.store
            .record(Platform::Github, json!({"pull_requests": [{"id": 1}]}))
            .unwrap();

        let (status, body) = send(&h.router, "POST", "/api/chatbot/context/clear", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["summary"]["total_pull_requests"], 0);
        assert!(h.store.status().all_not_fetched());
    }

    #[tokio::test]
    async fn test_analyze_requires_question() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        let (status, body) = send(
            &h.router,
            "POST",
            "/api/chatbot/analyze",
            Some(json!({"question": "  ", "data_source": "github"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Question is required");
    }

    #[tokio::test]
    async fn test_analyze_with_model() {
        let model = StubModel::answering("Two PRs are open.");
        let h = harness(StubFetcher::unconfigured(Platform::Github), Some(model));
        let (status, body) = send(
            &h.router,
            "POST",
            "/api/chatbot/analyze",
            Some(json!({"question": "How many PRs?", "data_source": "general"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["response"], "Two PRs are open.");
        assert_eq!(body["data"]["data_source"], "all");
        assert_eq!(body["data"]["from_model"], true);
    }

    #[tokio::test]
    async fn test_analyze_unknown_data_source() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        let (status, _) = send(
            &h.router,
            "POST",
            "/api/chatbot/analyze",
            Some(json!({"question": "Why?", "data_source": "jira"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_summary_without_model_falls_back() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        let (status, body) = send(&h.router, "POST", "/api/chatbot/summary/datadog", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["from_model"], false);
        assert!(body["data"]["response"]
            .as_str()
            .unwrap()
            .contains("No LLM provider"));
    }

    #[tokio::test]
    async fn test_suggest_questions() {
        let model = StubModel::answering("What changed this week?\nWho reviews most?");
        let h = harness(StubFetcher::unconfigured(Platform::Github), Some(model));
        let (status, body) = send(
            &h.router,
            "POST",
            "/api/chatbot/suggest-questions/github",
            Some(json!({"available_data": {"repos": 3}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_chatbot_status() {
        let h = harness(StubFetcher::unconfigured(Platform::Github), None);
        let (status, body) = send(&h.router, "GET", "/api/chatbot/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["llm_provider"], "none");
        assert_eq!(body["data"]["ready"], false);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let h = harness(
            StubFetcher::new(Platform::Github, vec![Ok(github_payload(1))]),
            None,
        );
        send(&h.router, "GET", "/api/github/prs", None).await;

        let response = h
            .router
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(r#"devpulse_fetches_total{platform="github",outcome="ok"} 1"#));
        assert!(text.contains(r#"devpulse_context_fetched{platform="github"} 1"#));
        assert!(text.contains("devpulse_http_requests_total"));
    }
}
