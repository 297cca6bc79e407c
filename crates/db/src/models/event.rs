//! Lifecycle event log rows.

use serde::Serialize;
use sqlx::FromRow;
use minebud_core::types::{DbId, Timestamp};

/// A row from the `lifecycle_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LifecycleEventRow {
    pub id: DbId,
    pub event_type: String,
    pub operation_id: Option<DbId>,
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
