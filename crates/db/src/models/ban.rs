use serde::Serialize;
use sqlx::FromRow;
use minebud_core::types::{DbId, Timestamp};

/// A row from the `operation_bans` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OperationBan {
    pub operation_id: DbId,
    pub user_id: DbId,
    pub banned_by: DbId,
    pub banned_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
