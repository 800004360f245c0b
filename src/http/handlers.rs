use super::state::AppState;
use crate::error::SessionError;
use crate::session::{ConnectionState, SessionSnapshot, SessionStats, StartOptions};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Optional steering text for the remote model
    pub system_instruction: Option<String>,

    /// Optional BCP-47 tag of the language being spoken
    pub source_language: Option<String>,

    /// Optional BCP-47 tag to translate into
    pub target_language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub status: String,
    pub connection_state: ConnectionState,
}

#[derive(Debug, Serialize)]
pub struct StopSessionResponse {
    pub status: String,
    pub stats: Option<SessionStats>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Start the live translation session
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let current = state.controller.state();
    if matches!(
        current,
        ConnectionState::Connecting | ConnectionState::Connected
    ) {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("A session is already {}", current),
            }),
        )
            .into_response();
    }

    let opts = StartOptions {
        system_instruction: req.system_instruction,
        source_language: req.source_language,
        target_language: req.target_language,
    };

    match state.controller.start(opts).await {
        Ok(()) => {
            info!("Session started via HTTP");
            (
                StatusCode::OK,
                Json(StartSessionResponse {
                    status: "started".to_string(),
                    connection_state: state.controller.state(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to start session: {}", e);
            let code = match &e {
                SessionError::Connect(_) | SessionError::Channel(_) => StatusCode::BAD_GATEWAY,
                SessionError::Resource(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                code,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/stop
/// Stop the live translation session
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.stop().await {
        Some(stats) => (
            StatusCode::OK,
            Json(StopSessionResponse {
                status: "stopped".to_string(),
                stats: Some(stats),
            }),
        ),
        None => (
            StatusCode::OK,
            Json(StopSessionResponse {
                status: "idle".to_string(),
                stats: None,
            }),
        ),
    }
}

/// GET /session/status
/// Read model for the UI: connection state, last error, both transcripts
pub async fn get_session_status(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

/// GET /health
/// Health check
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
