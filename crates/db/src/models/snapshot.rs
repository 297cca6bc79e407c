//! Ledger snapshot rows.

use serde::Serialize;
use sqlx::FromRow;
use minebud_core::delta::{SnapshotKind, SnapshotRow};
use minebud_core::error::CoreError;
use minebud_core::types::{DbId, ResourceTypeId, Timestamp};

/// A row from the `ledger_snapshots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerSnapshot {
    pub id: DbId,
    pub operation_id: DbId,
    pub user_id: DbId,
    pub resource_type_id: ResourceTypeId,
    pub quantity: i64,
    pub kind: String,
    pub captured_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LedgerSnapshot {
    /// Reduce to the input of the delta computation.
    pub fn to_row(&self) -> Result<SnapshotRow, CoreError> {
        Ok(SnapshotRow {
            user_id: self.user_id,
            resource_type_id: self.resource_type_id,
            quantity: self.quantity,
            kind: SnapshotKind::from_str(&self.kind)?,
            sequence: self.id,
        })
    }
}
