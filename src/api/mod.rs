//! REST API module using Axum
//!
//! HTTP facade for the predictive-maintenance assistant:
//! - `GET /` health check with artifact status
//! - `POST /chat` conversation turn (always 200)
//! - `/static/*` generated plot images via `tower-http` file serving

pub mod handlers;

pub use handlers::ChatState;

use std::path::Path;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Build the CORS layer.
///
/// Set `FAILSIGHT_CORS_ORIGINS` to a comma-separated list of allowed
/// origins to restrict cross-origin access; unset, any origin may call the
/// API (the assistant is meant to be embedded in third-party pages).
fn build_cors_layer() -> CorsLayer {
    match std::env::var("FAILSIGHT_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
        }
        Err(_) => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    }
}

/// Create the complete application router.
pub fn create_app(state: ChatState, static_dir: &Path) -> Router {
    let cors = build_cors_layer();

    Router::new()
        .route("/", get(handlers::get_health))
        .route("/chat", post(handlers::post_chat))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ModelArtifacts;
    use crate::chat::{ToolRegistry, APOLOGY_REPLY};
    use crate::llm::{ChatContent, ScriptedBackend};
    use crate::plot::PlotRenderer;
    use crate::service::PredictionService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(dir: &tempfile::TempDir, backend: ScriptedBackend) -> ChatState {
        let renderer = PlotRenderer::new(dir.path().join("static")).unwrap();
        let service = Arc::new(PredictionService::new(
            ModelArtifacts::default(),
            renderer,
            "http://localhost:8000".into(),
        ));
        let registry = Arc::new(ToolRegistry::for_service(Arc::clone(&service)));
        ChatState::new(service, Arc::new(backend), registry)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(
            test_state(&dir, ScriptedBackend::new(vec![])),
            &dir.path().join("static"),
        );

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["models_loaded"], false);
    }

    #[tokio::test]
    async fn test_chat_endpoint_returns_reply() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::new(vec![ChatContent::model_text("all good")]);
        let app = create_app(test_state(&dir, backend), &dir.path().join("static"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"status please"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reply"], "all good");
    }

    #[tokio::test]
    async fn test_chat_endpoint_is_200_even_on_backend_failure() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend::failing("upstream down");
        let app = create_app(test_state(&dir, backend), &dir.path().join("static"));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":"hello","history":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reply"], APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn test_static_serving() {
        let dir = tempfile::tempdir().unwrap();
        let static_dir = dir.path().join("static");
        let app = create_app(test_state(&dir, ScriptedBackend::new(vec![])), &static_dir);
        std::fs::write(static_dir.join("plot_test.png"), b"not-a-real-png").unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/static/plot_test.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(
            test_state(&dir, ScriptedBackend::new(vec![])),
            &dir.path().join("static"),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
