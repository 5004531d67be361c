// src/handlers.rs
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{
        CreatePollData, CreatePollResponse, PollListResponse, PollResponse, VoteRequest,
        VoteResponse,
    },
    poll,
    state::AppState,
};

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// List active polls with their vote counts
pub async fn list_polls(State(state): State<AppState>) -> Result<Json<PollListResponse>, AppError> {
    let polls = poll::get_polls(state.store.as_ref()).await?;
    tracing::debug!("Listing {} polls", polls.len());

    Ok(Json(PollListResponse {
        success: true,
        polls,
    }))
}

/// Create a poll (signed-in users only)
pub async fn create_poll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreatePollData>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatePollResponse>), AppError> {
    let user = user.ok_or(AppError::Unauthenticated)?;
    let Json(data) = payload.map_err(|e| AppError::MalformedPayload(e.body_text()))?;
    let poll_id = poll::create_poll(state.store.as_ref(), Some(&user), data).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePollResponse {
            success: true,
            poll_id,
        }),
    ))
}

/// Get one poll with its vote counts
pub async fn get_poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PollResponse>, AppError> {
    let poll = poll::get_poll_by_id(state.store.as_ref(), &id).await?;

    Ok(Json(PollResponse {
        success: true,
        poll,
    }))
}

/// Vote on a poll (one vote per user per poll)
pub async fn vote(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VoteResponse>), AppError> {
    let user = user.ok_or(AppError::Unauthenticated)?;
    let Json(request) = payload.map_err(|e| AppError::MalformedPayload(e.body_text()))?;
    poll::vote_on_poll(state.store.as_ref(), Some(&user), &id, request.option_id).await?;

    Ok((StatusCode::CREATED, Json(VoteResponse { success: true })))
}
