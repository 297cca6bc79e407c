use minebud_core::error::{CoreError, JoinRejection};

/// Errors surfaced by [`OperationService`](crate::OperationService).
///
/// Gateway failures never appear here: captures and price lookups degrade
/// and log instead.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<JoinRejection> for LifecycleError {
    fn from(rejection: JoinRejection) -> Self {
        LifecycleError::Core(rejection.into())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
