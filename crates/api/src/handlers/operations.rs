//! Handlers for mining operations.
//!
//! All endpoints require authentication via [`AuthUser`]; the caller is
//! always the acting user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use minebud_core::permissions::ParticipantAction;
use minebud_core::types::DbId;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOperationRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinOperationRequest {
    #[validate(length(min = 1, max = 32))]
    pub join_code: String,
}

/// `action` is parsed by the handler so unknown values get a
/// `VALIDATION_ERROR` listing the valid ones.
#[derive(Debug, Deserialize)]
pub struct ParticipantActionRequest {
    pub action: String,
    pub target_user_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/operations
///
/// Create an operation directed by the caller.
pub async fn create_operation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateOperationRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let operation = state
        .operations
        .create_operation(auth.user_id, &input.title, input.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: operation })))
}

/// POST /api/v1/operations/join
///
/// Join the active operation carrying the given code.
pub async fn join_operation(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<JoinOperationRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let participant = state
        .operations
        .join_operation(auth.user_id, &input.join_code)
        .await?;

    Ok(Json(DataResponse { data: participant }))
}

/// GET /api/v1/operations/current
///
/// The caller's current operation, or `null`.
pub async fn current_operation(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let operation = state.operations.current_operation(auth.user_id).await?;
    Ok(Json(DataResponse { data: operation }))
}

/// GET /api/v1/operations/{id}/status
///
/// Operation, participants, total value and display phase. Finalizes the
/// operation first if its grace period has elapsed.
pub async fn get_status(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let status = state.operations.get_operation_status(id).await?;
    Ok(Json(DataResponse { data: status }))
}

/// GET /api/v1/operations/{id}/mining
///
/// Per-user mined deltas and prices. Captures the caller's ledger first.
pub async fn get_mining(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let data = state.operations.get_mining_data(id, auth.user_id).await?;
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/operations/{id}/actions
///
/// Kick, ban, promote, leave or end.
pub async fn participant_action(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<ParticipantActionRequest>,
) -> AppResult<impl IntoResponse> {
    let action = ParticipantAction::from_str(&input.action)?;
    if action.requires_target() && input.target_user_id.is_none() {
        return Err(AppError::BadRequest(format!(
            "'{}' requires target_user_id",
            action.as_str()
        )));
    }
    let outcome = state
        .operations
        .participant_action(auth.user_id, id, action, input.target_user_id)
        .await?;

    Ok(Json(DataResponse { data: outcome }))
}
