//! HTTP API v1: chat and session administration.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`                 : Run one turn, get the reply
//! - `POST   /v1/sessions`             : Create a session
//! - `GET    /v1/sessions/{id}`        : Session metadata
//! - `DELETE /v1/sessions/{id}/context`: Clear turn-scoped state

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use addis_agent::TurnOrchestrator;
use addis_sessions::SessionMetadata;

/// Longest accepted chat message, in characters.
const MAX_MESSAGE_CHARS: usize = 8_000;

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub orchestrator: Arc<TurnOrchestrator>,
}

pub type SharedApiState = Arc<ApiV1State>;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}/context", delete(clear_context_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearContextResponse {
    pub session_id: String,
    pub cleared: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(api_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("message exceeds {MAX_MESSAGE_CHARS} characters"),
        ));
    }

    let session_id = match payload.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => state.orchestrator.store().create_session(),
    };
    info!(session_id = %session_id, message_len = message.len(), "v1/chat request");

    let reply = state.orchestrator.run_turn(&session_id, message).await;

    Ok(Json(ChatResponse { session_id, reply }))
}

async fn create_session_handler(
    State(state): State<SharedApiState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.orchestrator.store().create_session();
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionMetadata>, ApiError> {
    state
        .orchestrator
        .store()
        .session_metadata(&id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("session '{id}' not found")))
}

async fn clear_context_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<ClearContextResponse>, ApiError> {
    if state.orchestrator.store().clear_ephemeral_state(&id).await {
        Ok(Json(ClearContextResponse {
            session_id: id,
            cleared: true,
        }))
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("session '{id}' not found"),
        ))
    }
}
