use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Operations currently running or in their grace period.
    pub open_operations: Option<i64>,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let open_operations = minebud_db::repositories::OperationRepo::count_open(&state.pool)
        .await
        .map_err(|e| tracing::warn!(error = %e, "Health check query failed"))
        .ok();
    let db_healthy = open_operations.is_some();

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        open_operations,
    })
}

/// Unauthenticated liveness route, mounted at the root.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
