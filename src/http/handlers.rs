use super::state::AppState;
use crate::api::InterviewSetup;
use crate::session::{
    LiveSessionController, SessionConfig, SessionError, SessionId, SessionSnapshot,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Existing backend session id; when absent the backend creates one
    pub session_id: Option<String>,

    /// Interview settings used when the backend creates the session
    pub setup: Option<InterviewSetup>,
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

fn not_found(session_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Session {} not found", session_id),
    )
}

fn session_error_status(e: &SessionError) -> StatusCode {
    match e {
        SessionError::MissingSession => StatusCode::BAD_REQUEST,
        SessionError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        SessionError::Capture(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::InvalidState { .. } | SessionError::AccessPending => StatusCode::CONFLICT,
        SessionError::Transport(_) => StatusCode::BAD_GATEWAY,
        SessionError::Disposed => StatusCode::GONE,
    }
}

async fn find_session(state: &AppState, session_id: &str) -> Option<Arc<LiveSessionController>> {
    let id = SessionId::parse(session_id).ok()?;
    state.sessions.read().await.get(&id).cloned()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /sessions
/// Create a live session and start connecting it
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    let session_id = match req.session_id {
        Some(raw) => match SessionId::parse(raw) {
            Ok(id) => id,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
        },
        None => {
            let setup = req.setup.unwrap_or_default();
            match state.backend.start_interview(&setup).await {
                Ok(id) => id,
                Err(e) => {
                    error!("Failed to create interview session: {}", e);
                    return error_response(StatusCode::BAD_GATEWAY, e);
                }
            }
        }
    };

    // Check, spawn and register under one write guard so an id never gets two transports
    let snapshot = {
        let mut sessions = state.sessions.write().await;

        if let Some(existing) = sessions.get(&session_id) {
            if !existing.state().is_terminal() {
                return error_response(
                    StatusCode::CONFLICT,
                    format!("Session {} is already live", session_id),
                );
            }
        }

        // Finished sessions have released everything; forget them
        let before = sessions.len();
        sessions.retain(|_, session| !session.state().is_terminal());
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} finished session(s)", evicted);
        }

        let config = SessionConfig::from_config(&state.config, session_id.as_str());
        let controller = match LiveSessionController::spawn(
            config,
            (state.transports)(),
            Arc::clone(&state.captor),
            Arc::clone(&state.speech),
        ) {
            Ok(controller) => Arc::new(controller),
            Err(e) => return error_response(session_error_status(&e), e),
        };

        let snapshot = controller.snapshot();
        sessions.insert(session_id.clone(), controller);
        snapshot
    };

    info!("Live session {} created", session_id);

    (StatusCode::CREATED, Json(snapshot)).into_response()
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSnapshot>> {
    let sessions = state.sessions.read().await;
    let mut snapshots: Vec<SessionSnapshot> = sessions.values().map(|s| s.snapshot()).collect();
    snapshots.sort_by(|a, b| a.started_at.cmp(&b.started_at));
    Json(snapshots)
}

/// GET /sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match find_session(&state, &session_id).await {
        Some(session) => (StatusCode::OK, Json(session.snapshot())).into_response(),
        None => not_found(&session_id),
    }
}

/// POST /sessions/:session_id/recording/start
pub async fn start_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = find_session(&state, &session_id).await else {
        return not_found(&session_id);
    };

    match session.start_recording().await {
        Ok(()) => (StatusCode::OK, Json(session.snapshot())).into_response(),
        Err(e) => {
            info!("Recording not started for {}: {}", session_id, e);
            error_response(session_error_status(&e), e)
        }
    }
}

/// POST /sessions/:session_id/recording/stop
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = find_session(&state, &session_id).await else {
        return not_found(&session_id);
    };

    session.stop_recording().await;
    (StatusCode::OK, Json(session.snapshot())).into_response()
}

/// DELETE /sessions/:session_id
/// Dispose a session and forget it
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let removed = match SessionId::parse(&session_id) {
        Ok(id) => state.sessions.write().await.remove(&id),
        Err(_) => None,
    };

    match removed {
        Some(session) => {
            session.dispose().await;
            info!("Live session {} disposed", session_id);
            (StatusCode::OK, Json(session.snapshot())).into_response()
        }
        None => not_found(&session_id),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
