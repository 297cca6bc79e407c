//! HTTP error mapping.
//!
//! Every failure leaves the server as `{ "error": <message>, "code": <CODE> }`
//! with a matching status. Database and internal failures are logged and
//! replaced by a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use minebud_core::error::{CoreError, JoinRejection};
use minebud_lifecycle::LifecycleError;
use serde::Serialize;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed request that never reached the domain layer.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Core(core) => AppError::Core(core),
            LifecycleError::Database(db) => AppError::Database(db),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Status, code and client-facing message for one error.
struct Rendered(StatusCode, &'static str, String);

impl Rendered {
    fn internal(detail: &dyn std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Request failed");
        Rendered(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            INTERNAL_MESSAGE.to_string(),
        )
    }
}

fn render_core(err: &CoreError) -> Rendered {
    match err {
        CoreError::NotFound { entity, id } => Rendered(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => {
            Rendered(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        CoreError::Conflict(msg) => Rendered(StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => {
            Rendered(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
        }
        CoreError::Forbidden(msg) => Rendered(StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Join(rejection) => Rendered(
            join_status(*rejection),
            rejection.code(),
            rejection.to_string(),
        ),
        CoreError::Internal(msg) => Rendered::internal(msg),
    }
}

fn join_status(rejection: JoinRejection) -> StatusCode {
    match rejection {
        JoinRejection::InvalidCode => StatusCode::NOT_FOUND,
        JoinRejection::Banned => StatusCode::FORBIDDEN,
        JoinRejection::AlreadyActive => StatusCode::CONFLICT,
    }
}

/// `RowNotFound` is 404 and a unique violation on a `uq_*` constraint is
/// 409. Anything else is a sanitized 500.
fn render_sqlx(err: &sqlx::Error) -> Rendered {
    match err {
        sqlx::Error::RowNotFound => Rendered(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            match db_err.constraint().filter(|c| c.starts_with("uq_")) {
                Some(constraint) => Rendered(
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                ),
                None => Rendered::internal(db_err),
            }
        }
        other => Rendered::internal(other),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Rendered(status, code, error) = match &self {
            AppError::Core(core) => render_core(core),
            AppError::Database(db) => render_sqlx(db),
            AppError::BadRequest(msg) => {
                Rendered(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
            }
        };
        (status, Json(ErrorBody { error, code })).into_response()
    }
}
