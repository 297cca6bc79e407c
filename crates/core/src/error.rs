use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Join rejected: {0}")]
    Join(JoinRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons a join-by-code request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejection {
    /// No active operation carries the supplied code.
    #[error("invalid or expired join code")]
    InvalidCode,

    /// The user holds a ban record for the operation.
    #[error("you have been banned from this operation")]
    Banned,

    /// The user already participates in another active operation.
    #[error("you are already in an active operation")]
    AlreadyActive,
}

impl JoinRejection {
    /// Stable machine-readable code used in API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCode => "INVALID_CODE",
            Self::Banned => "BANNED",
            Self::AlreadyActive => "ALREADY_ACTIVE",
        }
    }
}

impl From<JoinRejection> for CoreError {
    fn from(rejection: JoinRejection) -> Self {
        CoreError::Join(rejection)
    }
}
