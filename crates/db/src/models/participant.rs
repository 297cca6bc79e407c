//! Participant rows.

use serde::Serialize;
use sqlx::FromRow;
use minebud_core::error::CoreError;
use minebud_core::ledger::ParticipantStatus;
use minebud_core::permissions::Membership;
use minebud_core::succession::Candidate;
use minebud_core::types::{DbId, Timestamp};

/// A row from the `operation_participants` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Participant {
    pub operation_id: DbId,
    pub user_id: DbId,
    pub status: String,
    pub is_admin: bool,
    pub join_time: Timestamp,
    pub leave_time: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Participant {
    pub fn status(&self) -> Result<ParticipantStatus, CoreError> {
        ParticipantStatus::from_str(&self.status)
    }

    pub fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active.as_str()
    }

    /// View used by the permission check.
    pub fn membership(&self) -> Result<Membership, CoreError> {
        Ok(Membership {
            user_id: self.user_id,
            status: self.status()?,
            is_admin: self.is_admin,
        })
    }

    /// View used by director succession.
    pub fn candidate(&self) -> Candidate {
        Candidate {
            user_id: self.user_id,
            is_admin: self.is_admin,
            join_time: self.join_time,
        }
    }
}

/// Participant joined with the user's display name, for status listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ParticipantWithUser {
    pub user_id: DbId,
    pub display_name: String,
    pub status: String,
    pub is_admin: bool,
    pub join_time: Timestamp,
    pub leave_time: Option<Timestamp>,
}
