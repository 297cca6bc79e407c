//! User rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use minebud_core::gateway::LedgerAccount;
use minebud_core::types::{DbId, Timestamp};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub external_id: i64,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    pub active_operation_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    /// Credentials for reading this user's external ledger.
    pub fn ledger_account(&self) -> LedgerAccount {
        LedgerAccount {
            external_id: self.external_id,
            access_token: self.access_token.clone(),
        }
    }
}

/// DTO for creating or refreshing a user from the identity layer.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertUser {
    pub external_id: i64,
    pub display_name: String,
    pub access_token: Option<String>,
}
