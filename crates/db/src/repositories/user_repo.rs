//! Repository for the `users` table and the global active-operation pointer.

use sqlx::{PgPool, Postgres, Transaction};
use minebud_core::types::DbId;

use crate::models::user::{UpsertUser, User};

/// Column list for `users` queries.
const COLUMNS: &str = "id, external_id, display_name, access_token, active_operation_id, \
                       created_at, updated_at";

/// Provides user lookups and pointer maintenance.
pub struct UserRepo;

impl UserRepo {
    /// Insert a user or refresh their display name and token.
    pub async fn upsert(pool: &PgPool, input: &UpsertUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (external_id, display_name, access_token) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (external_id) DO UPDATE \
                 SET display_name = EXCLUDED.display_name, \
                     access_token = COALESCE(EXCLUDED.access_token, users.access_token) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(input.external_id)
            .bind(&input.display_name)
            .bind(&input.access_token)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Point the user at `operation_id`, only if they have no current
    /// operation. Returns `false` when the pointer was already set.
    pub async fn claim_active_operation(
        tx: &mut Transaction<'_, Postgres>,
        user_id: DbId,
        operation_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET active_operation_id = $2 \
             WHERE id = $1 AND active_operation_id IS NULL",
        )
        .bind(user_id)
        .bind(operation_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the pointer for each user that still points at `operation_id`.
    /// Users who have already moved on are left alone.
    pub async fn release_active_operation(
        tx: &mut Transaction<'_, Postgres>,
        user_ids: &[DbId],
        operation_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET active_operation_id = NULL \
             WHERE id = ANY($1) AND active_operation_id = $2",
        )
        .bind(user_ids)
        .bind(operation_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }
}
