use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::dto::session_dto::{
    SessionStatusResponse, StartSessionRequest, StartSessionResponse, SubmitSessionRequest,
    SubmitSessionResponse,
};
use crate::AppState;

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> crate::error::Result<Json<StartSessionResponse>> {
    let handle = state
        .session_service
        .start(req.candidate_id, req.test_id, req.application_id)
        .await?;
    Ok(Json(StartSessionResponse {
        session_id: handle.session_id,
        attempt_number: handle.attempt_number,
        started_at: handle.started_at,
        deadline: handle.deadline,
    }))
}

#[axum::debug_handler]
pub async fn submit_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SubmitSessionRequest>,
) -> crate::error::Result<Json<SubmitSessionResponse>> {
    if req.answers.keys().any(|question_id| question_id.as_str().is_empty()) {
        return Err(crate::error::Error::BadRequest(
            "answer sheet contains an empty question id".to_string(),
        ));
    }
    let record = state
        .session_service
        .submit(session_id, req.answers)
        .await?;
    Ok(Json(record.into()))
}

#[axum::debug_handler]
pub async fn abandon_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Json<SubmitSessionResponse>> {
    let record = state.session_service.abandon(session_id).await?;
    Ok(Json(record.into()))
}

#[axum::debug_handler]
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Json<SessionStatusResponse>> {
    let status = state.session_service.session_status(session_id).await?;
    Ok(Json(SessionStatusResponse {
        session_id: status.record.id,
        status: status.record.status,
        attempt_number: status.record.attempt_number,
        deadline: status.record.deadline,
        remaining_seconds: status.remaining_seconds,
    }))
}
