use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderValue, Method};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::ChatService;
use crate::config::AppConfig;
use crate::models::{ChatRequest, ChatResponse};

#[derive(Clone)]
struct AppState {
    chat: ChatService,
}

pub async fn run_server(config: AppConfig, chat_service: ChatService) -> Result<()> {
    let app = router(&config, chat_service)?;

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr))?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// `POST /chat` plus a liveness check. CORS headers are only sent back to
/// the one configured browser origin.
pub fn router(config: &AppConfig, chat_service: ChatService) -> Result<Router> {
    let origin: HeaderValue = config
        .cors_origin
        .parse()
        .with_context(|| format!("invalid CORS origin {}", config.cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let state = AppState { chat: chat_service };

    Ok(Router::new()
        .route("/chat", post(chat_handler))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Every pipeline outcome, errors included, is a 200 with a text body.
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let response = state.chat.answer_text(&request.question).await;
    Json(ChatResponse { response })
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::completion::testing::RecordingCompletion;
    use crate::embedding::testing::BagOfWordsEmbedder;
    use crate::partition::{PartitionLoader, PartitionSelector, ReloadPolicy};

    const ORIGIN: &str = "http://localhost:5173";

    fn app(root: &Path) -> Router {
        let mut config = AppConfig::from_env();
        config.cors_origin = ORIGIN.to_string();
        let chat = ChatService::new(
            Arc::new(PartitionLoader::new(root, ReloadPolicy::EveryQuery)),
            PartitionSelector::new("BoG").unwrap(),
            Arc::new(BagOfWordsEmbedder::default()),
            Arc::new(RecordingCompletion::default()),
            5,
        );
        router(&config, chat).unwrap()
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/chat")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn chat_returns_response_field() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"question":"hello"}"#))
            .unwrap();

        let response = app(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let text = json["response"].as_str().unwrap();
        assert!(text.starts_with("Error:"), "{text}");
    }

    #[tokio::test]
    async fn preflight_from_configured_origin_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path()).oneshot(preflight(ORIGIN)).await.unwrap();

        assert!(response.status().is_success());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            ORIGIN
        );
    }

    #[tokio::test]
    async fn preflight_from_other_origin_gets_no_allow_header() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path())
            .oneshot(preflight("http://other.example"))
            .await
            .unwrap();

        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
