use super::state::AppState;
use crate::mode::IntentError;
use crate::session::{Intent, LifecycleError, PttInput, SessionHandle};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct KeyInputRequest {
    pub code: String,
    pub pressed: bool,
    #[serde(default)]
    pub repeat: bool,
}

#[derive(Debug, Deserialize)]
pub struct RewindRequest {
    pub target_utterance_id: String,
}

#[derive(Debug, Serialize)]
pub struct FinishResponse {
    pub session_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn intent_error_response(e: IntentError) -> Response {
    let status = match e {
        IntentError::NoSession => StatusCode::NOT_FOUND,
        _ => StatusCode::CONFLICT,
    };
    error_response(status, e)
}

fn lifecycle_error_response(e: LifecycleError) -> Response {
    match e {
        LifecycleError::NoSession => error_response(StatusCode::NOT_FOUND, e),
        LifecycleError::AlreadyActive(_) => error_response(StatusCode::CONFLICT, e),
        LifecycleError::Intent(e) => intent_error_response(e),
        LifecycleError::Api(_) => {
            error!("Session service error: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

async fn active_handle(state: &AppState) -> Result<SessionHandle, Response> {
    state
        .lifecycle
        .lock()
        .await
        .handle()
        .ok_or_else(|| intent_error_response(IntentError::NoSession))
}

/// Forward an intent and answer with the resulting view
async fn submit(state: &AppState, intent: Intent) -> Response {
    let handle = match active_handle(state).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.send(intent).await {
        Ok(()) => (StatusCode::OK, Json(handle.view())).into_response(),
        Err(e) => {
            warn!("Intent rejected: {}", e);
            intent_error_response(e)
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    match active_handle(&state).await {
        Ok(handle) => (StatusCode::OK, Json(handle.view())).into_response(),
        Err(response) => response,
    }
}

/// POST /ptt/down
pub async fn ptt_down(State(state): State<AppState>) -> impl IntoResponse {
    submit(&state, Intent::Ptt(PttInput::PointerDown)).await
}

/// POST /ptt/up
pub async fn ptt_up(State(state): State<AppState>) -> impl IntoResponse {
    submit(&state, Intent::Ptt(PttInput::PointerUp)).await
}

/// POST /ptt/leave
/// Pointer left the talk button
pub async fn ptt_leave(State(state): State<AppState>) -> impl IntoResponse {
    submit(&state, Intent::Ptt(PttInput::PointerLeave)).await
}

/// POST /input/key
pub async fn key_input(
    State(state): State<AppState>,
    Json(req): Json<KeyInputRequest>,
) -> impl IntoResponse {
    let input = PttInput::Key {
        code: req.code,
        pressed: req.pressed,
        repeat: req.repeat,
    };
    submit(&state, Intent::Ptt(input)).await
}

/// POST /time-stop
pub async fn time_stop(State(state): State<AppState>) -> impl IntoResponse {
    submit(&state, Intent::TimeStop).await
}

/// GET /rewind/targets
/// Fetch the active branch transcript into the rewind panel
pub async fn rewind_targets(State(state): State<AppState>) -> impl IntoResponse {
    // The transcript fetch must not hold up PTT and the other handlers
    let source = match state.lifecycle.lock().await.rewind_source() {
        Ok(source) => source,
        Err(e) => return lifecycle_error_response(e),
    };
    match source.fetch().await {
        Ok(targets) => (StatusCode::OK, Json(targets)).into_response(),
        Err(e) => lifecycle_error_response(e),
    }
}

/// POST /rewind
pub async fn rewind_to(
    State(state): State<AppState>,
    Json(req): Json<RewindRequest>,
) -> impl IntoResponse {
    submit(
        &state,
        Intent::RewindTo {
            target_utterance_id: req.target_utterance_id,
        },
    )
    .await
}

/// POST /rewind/cancel
pub async fn rewind_cancel(State(state): State<AppState>) -> impl IntoResponse {
    submit(&state, Intent::RewindCancel).await
}

/// POST /finish
/// End the session and release the room
pub async fn finish(State(state): State<AppState>) -> impl IntoResponse {
    let mut lifecycle = state.lifecycle.lock().await;
    let session_id = match lifecycle.session() {
        Some(info) => info.session_id.clone(),
        None => return lifecycle_error_response(LifecycleError::NoSession),
    };

    match lifecycle.end().await {
        Ok(()) => {
            info!("Session {} finished", session_id);
            (
                StatusCode::OK,
                Json(FinishResponse {
                    session_id,
                    status: "ended".to_string(),
                }),
            )
                .into_response()
        }
        Err(e) => lifecycle_error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
