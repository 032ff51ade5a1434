use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use super::AppState;
use super::handlers::{export, frameworks, generate};

/// Empty origin list means any origin; otherwise only the listed ones.
fn build_cors(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(origins)
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_endpoint))
        .route("/api/generate", post(generate::generate_endpoint))
        .route("/api/frameworks", get(frameworks::list_frameworks_endpoint))
        .route("/api/export", post(export::export_endpoint))
        .route("/api/logs", get(super::sse_logs_endpoint))
        .layer(middleware::from_fn(security_headers))
        .layer(build_cors(&state.config.server.cors_origins))
        .with_state(state)
}

async fn health_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.config.llm.provider,
        "model": state.model,
    }))
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::export::fixtures::every_layout_deck;
    use crate::core::llm::mock::ScriptedProvider;
    use crate::core::llm::{LlmProvider, ProviderFactory};
    use crate::core::pipeline::tests::{deck_provider, outline_json, slide_json};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::util::ServiceExt;

    /// Hands out the same scripted provider and counts how often it was asked.
    struct ScriptedFactory {
        provider: Arc<ScriptedProvider>,
        builds: AtomicUsize,
    }

    impl ProviderFactory for ScriptedFactory {
        fn build(&self, _api_key: &str) -> anyhow::Result<Arc<dyn LlmProvider>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(self.provider.clone())
        }
    }

    fn test_config(api_key: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.model = Some("mock-model".to_string());
        config.llm.api_key = api_key.map(str::to_string);
        config.pipeline.llm_rubric = false;
        config.pipeline.backoff_base_ms = 0;
        config.refinement.enabled = false;
        config
    }

    fn state_with(provider: Arc<ScriptedProvider>, config: AppConfig) -> (AppState, Arc<ScriptedFactory>) {
        let factory = Arc::new(ScriptedFactory {
            provider,
            builds: AtomicUsize::new(0),
        });
        let (log_tx, _) = tokio::sync::broadcast::channel(16);
        let state = AppState::new(factory.clone(), config, log_tx).unwrap();
        (state, factory)
    }

    fn happy_provider(count: usize) -> Arc<ScriptedProvider> {
        deck_provider(outline_json(count).to_string(), |n| Ok(slide_json(n)))
    }

    async fn send(app: Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), 4 * 1024 * 1024)
            .await
            .unwrap();
        (status, headers, bytes.to_vec())
    }

    async fn json_request(app: Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, _, bytes) = send(app, method, path, body).await;
        let json = serde_json::from_slice(&bytes).unwrap_or(json!({}));
        (status, json)
    }

    #[tokio::test]
    async fn security_headers_present_on_responses() {
        let (state, _) = state_with(happy_provider(3), test_config(None));
        let (status, headers, _) = send(build_api_router(state), Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    }

    #[tokio::test]
    async fn health_reports_provider_and_model() {
        let (state, _) = state_with(happy_provider(3), test_config(None));
        let (_, body) = json_request(build_api_router(state), Method::GET, "/api/health", None).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["provider"], "anthropic");
        assert_eq!(body["model"], "mock-model");
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_any_llm_call() {
        let provider = happy_provider(3);
        let (state, factory) = state_with(provider.clone(), test_config(Some("server-key")));
        let (status, body) = json_request(
            build_api_router(state),
            Method::POST,
            "/api/generate",
            Some(json!({"prompt": "Roadmap", "presentation_type": "business", "slide_count": "2"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("slide_count"));
        assert!(body["generation_id"].as_str().is_some());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_bad_request() {
        let (state, _) = state_with(happy_provider(3), test_config(Some("k")));
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/generate")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = build_api_router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_api_key_is_a_distinct_server_error() {
        let (state, factory) = state_with(happy_provider(3), test_config(None));
        let (status, body) = json_request(
            build_api_router(state),
            Method::POST,
            "/api/generate",
            Some(json!({"prompt": "Roadmap", "presentation_type": "business", "slide_count": "3"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("no API key configured"));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generate_returns_the_deck_with_diagnostics() {
        let provider = happy_provider(3);
        let (state, factory) = state_with(provider.clone(), test_config(None));
        let (status, body) = json_request(
            build_api_router(state),
            Method::POST,
            "/api/generate",
            Some(json!({
                "prompt": "Quarterly capacity review",
                "presentation_type": "business",
                "slide_count": "3",
                "audience": "CTO",
                "apiKey": "request-key"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["success"], true);
        assert_eq!(body["presentation"]["slides"].as_array().unwrap().len(), 3);
        assert!(body["processingTime"].is_u64());
        assert!(!body["debugInfo"]["frameworkSelected"].as_str().unwrap().is_empty());
        assert!(body["validationResults"]["outlineScore"].is_u64());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        // outline plus one call per slide
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test]
    async fn upstream_failure_status_is_passed_through() {
        let provider = Arc::new(ScriptedProvider::failing(429));
        let (state, _) = state_with(provider, test_config(Some("server-key")));
        let (status, body) = json_request(
            build_api_router(state),
            Method::POST,
            "/api/generate",
            Some(json!({"prompt": "Roadmap", "presentation_type": "business", "slide_count": 3})),
        )
        .await;
        assert_eq!(status.as_u16(), 429);
        assert_eq!(body["success"], false);
        assert!(body.get("presentation").is_none());
    }

    #[tokio::test]
    async fn streamed_generation_ends_with_complete_event() {
        let (state, _) = state_with(happy_provider(3), test_config(Some("server-key")));
        let (status, headers, bytes) = send(
            build_api_router(state),
            Method::POST,
            "/api/generate",
            Some(json!({
                "prompt": "Roadmap",
                "presentation_type": "technical",
                "slide_count": 3,
                "streamProgress": true
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("event: progress"));
        assert!(text.contains("\"percentComplete\":100"));
        let last_event = text.rsplit("event: ").next().unwrap();
        assert!(last_event.starts_with("complete"), "{last_event}");
        assert!(!text.contains("event: error"));
    }

    #[tokio::test]
    async fn frameworks_lists_the_catalog() {
        let (state, _) = state_with(happy_provider(3), test_config(None));
        let (status, body) = json_request(build_api_router(state), Method::GET, "/api/frameworks", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["default"], "scqa");
        let ids: Vec<&str> = body["frameworks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["scqa", "prep", "star", "pyramid", "comparison"]);
        assert!(body["frameworks"][0]["bestFor"].is_array());
    }

    #[tokio::test]
    async fn export_renders_markdown_and_rejects_unknown_formats() {
        let (state, _) = state_with(happy_provider(3), test_config(None));
        let deck = serde_json::to_value(every_layout_deck()).unwrap();

        let (status, headers, bytes) = send(
            build_api_router(state.clone()),
            Method::POST,
            "/api/export?format=markdown",
            Some(deck.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/markdown")
        );
        assert!(String::from_utf8(bytes).unwrap().starts_with("# Capacity Review"));

        let (status, body) =
            json_request(build_api_router(state), Method::POST, "/api/export?format=pptx", Some(deck)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("pptx"));
    }
}
