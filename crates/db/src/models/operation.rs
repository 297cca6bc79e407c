//! Operation rows and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use minebud_core::error::CoreError;
use minebud_core::operation::{OperationStatus, TerminationType};
use minebud_core::types::{DbId, Timestamp};

/// A row from the `operations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Operation {
    pub id: DbId,
    pub director_id: DbId,
    pub join_code: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub termination_type: Option<String>,
    /// Grace deadline while `ending`; actual end time once `ended`.
    pub ended_at: Option<Timestamp>,
    pub last_activity_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Operation {
    pub fn status(&self) -> Result<OperationStatus, CoreError> {
        OperationStatus::from_str(&self.status)
    }

    pub fn termination(&self) -> Result<Option<TerminationType>, CoreError> {
        self.termination_type
            .as_deref()
            .map(TerminationType::from_str)
            .transpose()
    }

    pub fn is_active(&self) -> bool {
        self.status == OperationStatus::Active.as_str()
    }

    pub fn is_ended(&self) -> bool {
        self.status == OperationStatus::Ended.as_str()
    }
}

/// DTO for creating an operation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOperation {
    pub director_id: DbId,
    pub title: String,
    pub description: Option<String>,
}
