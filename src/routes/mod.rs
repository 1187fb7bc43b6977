//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    http::HeaderMap,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Header naming the client whose local storage a request touches.
pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const ANONYMOUS_CLIENT: &str = "anonymous";

pub fn client_id(headers: &HeaderMap) -> String {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

/// Build the application router with:
/// - WebSocket at `/ws`
/// - JSON API under `/api/v1/...`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        // Learning operations
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/explanation", post(http::http_post_explanation))
        .route("/api/v1/quiz", post(http::http_post_quiz))
        .route("/api/v1/flashcards", post(http::http_post_flashcards))
        .route("/api/v1/reasoning", post(http::http_post_reasoning))
        .route("/api/v1/translate", post(http::http_post_translate))
        // Client-local state
        .route("/api/v1/access", get(http::http_get_access))
        .route("/api/v1/access/increment", post(http::http_post_access_increment))
        .route("/api/v1/access/reset", post(http::http_post_access_reset))
        .route(
            "/api/v1/history",
            get(http::http_get_history)
                .post(http::http_post_history)
                .delete(http::http_delete_history),
        )
        .route("/api/v1/history/item", delete(http::http_delete_history_item))
        // Identity boundary
        .route("/api/v1/auth/check-email", post(http::http_post_check_email))
        .route("/api/v1/auth/before-create", post(http::http_post_before_create))
        .route("/api/v1/auth/interpret-error", post(http::http_post_interpret_error))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::AgentConfig;
    use crate::gateway::testing::ScriptedService;
    use crate::gateway::ServiceError;

    fn app(svc: ScriptedService) -> Router {
        build_router(Arc::new(AppState::with_service(Arc::new(svc), AgentConfig::default())))
    }

    async fn call(app: &Router, method: Method, uri: &str, client: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(c) = client {
            req = req.header(CLIENT_ID_HEADER, c);
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    #[test]
    fn client_id_defaults_to_anonymous() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_id(&headers), "anonymous");
        headers.insert(CLIENT_ID_HEADER, "  ".parse().unwrap());
        assert_eq!(client_id(&headers), "anonymous");
        headers.insert(CLIENT_ID_HEADER, "tab-1".parse().unwrap());
        assert_eq!(client_id(&headers), "tab-1");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = call(&app(ScriptedService::new()), Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn explanation_returns_generated_text() {
        let app = app(ScriptedService::new().reply_json(json!({ "explanation": "Light becomes sugar." })));
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/explanation",
            None,
            Some(json!({ "topic": "Photosynthesis", "deepThink": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["explanation"], "Light becomes sugar.");
    }

    #[tokio::test]
    async fn short_topic_is_a_bad_request() {
        let (status, body) = call(
            &app(ScriptedService::new()),
            Method::POST,
            "/api/v1/explanation",
            None,
            Some(json!({ "topic": "ab" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation");
        assert_eq!(body["error"], "Please enter a valid topic (at least 3 characters).");
    }

    #[tokio::test]
    async fn quiz_failure_is_a_bad_gateway() {
        let app = app(ScriptedService::new().fail(ServiceError::Transport("connection reset".into())));
        let (status, body) =
            call(&app, Method::POST, "/api/v1/quiz", None, Some(json!({ "topic": "Gravity", "count": 2 }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "generation");
    }

    #[tokio::test]
    async fn reasoning_builds_context_from_messages() {
        let app = app(ScriptedService::new().reply_json(json!({ "answer": "Because of chlorophyll." })));
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/v1/reasoning",
            None,
            Some(json!({
                "topic": "Photosynthesis",
                "explanation": "Plants make sugar.",
                "messages": [{ "role": "user", "content": "What is it?" }],
                "question": "Why are leaves green?"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Because of chlorophyll.");
    }

    #[tokio::test]
    async fn access_counter_is_scoped_per_client() {
        let app = app(ScriptedService::new());
        for _ in 0..3 {
            call(&app, Method::POST, "/api/v1/access/increment", Some("a"), None).await;
        }
        let (_, a) = call(&app, Method::GET, "/api/v1/access", Some("a"), None).await;
        assert_eq!(a, json!({ "count": 3, "limit": 3, "limitReached": true }));

        let (_, b) = call(&app, Method::GET, "/api/v1/access", Some("b"), None).await;
        assert_eq!(b["count"], 0);

        let (_, reset) = call(&app, Method::POST, "/api/v1/access/reset", Some("a"), None).await;
        assert_eq!(reset["limitReached"], false);
    }

    #[tokio::test]
    async fn history_endpoints_round_trip() {
        let app = app(ScriptedService::new());
        call(&app, Method::POST, "/api/v1/history", None, Some(json!({ "topic": "Photosynthesis" }))).await;
        let (_, body) =
            call(&app, Method::POST, "/api/v1/history", None, Some(json!({ "topic": "photosynthesis" }))).await;
        assert_eq!(body["topics"], json!(["photosynthesis"]));

        call(&app, Method::POST, "/api/v1/history", None, Some(json!({ "topic": "Gravity" }))).await;
        let (_, body) =
            call(&app, Method::DELETE, "/api/v1/history/item", None, Some(json!({ "topic": "PHOTOSYNTHESIS" }))).await;
        assert_eq!(body["topics"], json!(["Gravity"]));

        call(&app, Method::DELETE, "/api/v1/history", None, None).await;
        let (_, body) = call(&app, Method::GET, "/api/v1/history", None, None).await;
        assert_eq!(body["topics"], json!([]));
    }

    #[tokio::test]
    async fn disposable_email_is_blocked_at_both_checks() {
        let app = app(ScriptedService::new());
        let (_, pre) =
            call(&app, Method::POST, "/api/v1/auth/check-email", None, Some(json!({ "email": "x@mailinator.com" })))
                .await;
        assert_eq!(pre["allowed"], false);

        let (status, hook) =
            call(&app, Method::POST, "/api/v1/auth/before-create", None, Some(json!({ "email": "x@yopmail.com" })))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(hook["code"], "invalid-argument");

        let (status, ok) =
            call(&app, Method::POST, "/api/v1/auth/before-create", None, Some(json!({ "email": "x@gmail.com" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ok["allowed"], true);
    }

    #[tokio::test]
    async fn provider_error_is_interpreted() {
        let (_, body) = call(
            &app(ScriptedService::new()),
            Method::POST,
            "/api/v1/auth/interpret-error",
            None,
            Some(json!({ "code": "auth/invalid-argument", "message": "raw" })),
        )
        .await;
        assert_eq!(body["kind"], "blocked_disposable_email");
        assert_eq!(body["message"], crate::auth::DISPOSABLE_PROVIDER_MESSAGE);
    }
}
