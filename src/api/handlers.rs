//! API route handlers
//!
//! Request handling logic for the assistant endpoints:
//! - Health check with artifact status
//! - Chat turn processing through the tool-dispatch loop

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::chat::{self, ToolRegistry};
use crate::llm::ChatBackend;
use crate::service::PredictionService;
use crate::types::{ChatRequest, ChatResponse};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ChatState {
    /// Prediction service (health reporting; tool handlers hold their own Arc)
    pub service: Arc<PredictionService>,
    /// Chat backend the dispatch loop talks to
    pub backend: Arc<dyn ChatBackend>,
    /// Registered tools shared across requests
    pub registry: Arc<ToolRegistry>,
}

impl ChatState {
    pub fn new(
        service: Arc<PredictionService>,
        backend: Arc<dyn ChatBackend>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            service,
            backend,
            registry,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub models_loaded: bool,
}

/// GET / — liveness probe with artifact status.
pub async fn get_health(State(state): State<ChatState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Predictive maintenance assistant is running.",
        models_loaded: state.service.models_loaded(),
    })
}

/// POST /chat — run one conversation turn.
///
/// Always answers 200 with a reply string; failures inside the dispatch
/// loop surface as apology text, not HTTP errors, so the web client has a
/// single rendering path.
pub async fn post_chat(
    State(state): State<ChatState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    info!(
        history_turns = request.history.len(),
        "chat request received"
    );

    let reply = chat::handle_chat_message(
        state.backend.as_ref(),
        &state.registry,
        &request.message,
        &request.history,
    )
    .await;

    Json(ChatResponse { reply })
}
