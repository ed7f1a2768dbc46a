//! Session lifecycle handlers.

use axum::extract::{Path, State};
use axum::Json;

use voltstream_core::types::id::{SessionId, UserId};
use voltstream_entity::session::{Session, SessionSummary};
use voltstream_session::{StartSessionRequest, StopSessionRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/sessions — start a charging session.
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<Session>, ApiError> {
    let session = state.sessions.start_session(request).await?;
    Ok(Json(session))
}

/// POST /api/sessions/{id}/stop — stop a session; idempotent on
/// already-terminal sessions.
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<StopSessionRequest>,
) -> Result<Json<SessionSummary>, ApiError> {
    let summary = state.sessions.stop_session(&session_id, request).await?;
    Ok(Json(summary))
}

/// POST /api/sessions/{id}/pause
pub async fn pause_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    let session = state.sessions.pause_session(&session_id).await?;
    Ok(Json(session))
}

/// POST /api/sessions/{id}/resume
pub async fn resume_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    let session = state.sessions.resume_session(&session_id).await?;
    Ok(Json(session))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    let session = state.sessions.get_session(&session_id).await?;
    Ok(Json(session))
}

/// GET /api/users/{user_id}/sessions/active — the user's live session,
/// or `null`.
pub async fn active_session(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Option<Session>>, ApiError> {
    let session = state.sessions.active_session_for_user(&user_id).await?;
    Ok(Json(session))
}

/// GET /api/users/{user_id}/sessions — session history, newest first.
pub async fn session_history(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = state.sessions.sessions_for_user(&user_id).await?;
    Ok(Json(sessions))
}
