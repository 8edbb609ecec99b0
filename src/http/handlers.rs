use super::state::AppState;
use crate::session::{BridgeError, SessionStats};
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

#[derive(Debug, Deserialize)]
pub struct MicRequest {
    pub muted: bool,
}

#[derive(Debug, Deserialize)]
pub struct OutputRequest {
    pub paused: bool,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub session_id: String,
    pub status: String,
    pub stats: SessionStats,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn connect_error_status(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::MissingCredential(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BridgeError::Microphone(_) | BridgeError::Output(_) => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::HandshakeRejected(_) | BridgeError::Transport(_) => StatusCode::BAD_GATEWAY,
        BridgeError::HandshakeTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/connect
/// Start the voice session; a new stream starts the dialogue over from the Aadhar step
pub async fn connect(State(state): State<AppState>) -> impl IntoResponse {
    let session_id = state.session.session_id().to_string();
    info!("Connect requested for session: {}", session_id);

    let opened = match state.session.connect().await {
        Ok(opened) => opened,
        Err(e) => {
            error!("Failed to connect session: {}", e);
            return error_response(connect_error_status(&e), e.to_string());
        }
    };

    let message = if opened {
        state.flow.reset();
        format!("Session {} connected", session_id)
    } else {
        format!("Session {} already connected", session_id)
    };

    (
        StatusCode::OK,
        Json(ConnectResponse {
            session_id,
            status: "open".to_string(),
            message,
        }),
    )
        .into_response()
}

/// POST /session/disconnect
pub async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.session.disconnect().await;

    (
        StatusCode::OK,
        Json(DisconnectResponse {
            session_id: state.session.session_id().to_string(),
            status: "closed".to_string(),
            stats,
        }),
    )
}

/// POST /session/mic
pub async fn set_mic(
    State(state): State<AppState>,
    Json(req): Json<MicRequest>,
) -> impl IntoResponse {
    state.session.set_mic_muted(req.muted).await;
    (StatusCode::OK, Json(state.session.stats().await))
}

/// POST /session/output
pub async fn set_output(
    State(state): State<AppState>,
    Json(req): Json<OutputRequest>,
) -> impl IntoResponse {
    if let Err(e) = state.session.set_output_paused(req.paused).await {
        error!("Failed to change output state: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to change output state: {}", e),
        );
    }

    (StatusCode::OK, Json(state.session.stats().await)).into_response()
}

/// GET /session
/// Connection state, counters and live audio levels
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.stats().await))
}

/// GET /flow
/// Current step of the verification dialogue
pub async fn get_flow(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.flow.snapshot()))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
