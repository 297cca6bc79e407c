//! Repository for the `operation_bans` table.

use sqlx::{Postgres, Transaction};
use minebud_core::types::DbId;

/// Provides ban record operations.
pub struct BanRepo;

impl BanRepo {
    /// Record a ban. Re-banning refreshes `banned_by` and `banned_at`.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        user_id: DbId,
        banned_by: DbId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO operation_bans (operation_id, user_id, banned_by) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (operation_id, user_id) DO UPDATE \
                 SET banned_by = EXCLUDED.banned_by, banned_at = NOW()",
        )
        .bind(operation_id)
        .bind(user_id)
        .bind(banned_by)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn exists(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM operation_bans WHERE operation_id = $1 AND user_id = $2 \
             )",
        )
        .bind(operation_id)
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
    }
}
