use axum::routing::{get, post};
use axum::Router;

use crate::handlers::operations;
use crate::state::AppState;

/// Routes mounted at `/operations`.
///
/// ```text
/// POST   /                   create
/// POST   /join               join by code
/// GET    /current            caller's current operation
/// GET    /{id}/status        status (finalizes when due)
/// GET    /{id}/mining        per-user deltas and prices
/// POST   /{id}/actions       kick, ban, promote, leave, end
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(operations::create_operation))
        .route("/join", post(operations::join_operation))
        .route("/current", get(operations::current_operation))
        .route("/{id}/status", get(operations::get_status))
        .route("/{id}/mining", get(operations::get_mining))
        .route("/{id}/actions", post(operations::participant_action))
}
