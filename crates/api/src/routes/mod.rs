pub mod health;
pub mod operations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /operations                      create (POST)
/// /operations/join                 join by code (POST)
/// /operations/current              caller's current operation
/// /operations/{id}/status          status, finalizes when due
/// /operations/{id}/mining          per-user deltas and prices
/// /operations/{id}/actions         participant actions (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/operations", operations::router())
}
