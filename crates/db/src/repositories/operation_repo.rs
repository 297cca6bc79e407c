//! Repository for the `operations` table.
//!
//! Every state transition is a single conditioned `UPDATE`: the `WHERE`
//! clause names the status the caller expects, and zero rows affected means
//! another trigger got there first.

use sqlx::{PgPool, Postgres, Transaction};
use minebud_core::operation::TerminationType;
use minebud_core::types::DbId;

use crate::models::operation::{CreateOperation, Operation};

/// Column list for `operations` queries.
const COLUMNS: &str = "id, director_id, join_code, title, description, status, \
                       termination_type, ended_at, last_activity_at, created_at, updated_at";

/// Provides lifecycle operations for mining operations.
pub struct OperationRepo;

impl OperationRepo {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM operations WHERE id = $1");
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The operation a user's global pointer refers to, if any.
    pub async fn find_current_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operations \
             WHERE id = (SELECT active_operation_id FROM users WHERE id = $1)"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Lock an operation row for the rest of the transaction.
    pub async fn lock_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM operations WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Find an active operation by join code and hold a share lock on it so
    /// that an end or finalize cannot commit underneath the join.
    pub async fn lock_active_by_join_code(
        tx: &mut Transaction<'_, Postgres>,
        join_code: &str,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operations \
             WHERE join_code = $1 AND status = 'active' \
             FOR SHARE"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(join_code)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Ids of `ending` operations whose grace deadline has passed.
    pub async fn list_due_ids(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM operations \
             WHERE status = 'ending' AND ended_at <= NOW() \
             ORDER BY ended_at",
        )
        .fetch_all(pool)
        .await
    }

    /// Ids of `active` operations idle for longer than `threshold_secs`.
    pub async fn list_inactive_ids(
        pool: &PgPool,
        threshold_secs: i64,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM operations \
             WHERE status = 'active' \
               AND last_activity_at < NOW() - ($1::bigint * INTERVAL '1 second') \
             ORDER BY last_activity_at",
        )
        .bind(threshold_secs)
        .fetch_all(pool)
        .await
    }

    /// Number of operations not yet ended.
    pub async fn count_open(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM operations WHERE status <> 'ended'")
            .fetch_one(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a new active operation. Fails with a unique violation on
    /// `uq_operations_join_code` if the code is taken.
    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        input: &CreateOperation,
        join_code: &str,
    ) -> Result<Operation, sqlx::Error> {
        let query = format!(
            "INSERT INTO operations (director_id, join_code, title, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(input.director_id)
            .bind(join_code)
            .bind(input.title.trim())
            .bind(&input.description)
            .fetch_one(&mut **tx)
            .await
    }

    /// `active -> ending` with a deadline `grace_secs` from now.
    ///
    /// Returns the updated row, or `None` if the operation was not active.
    pub async fn begin_ending(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        grace_secs: i64,
        termination: TerminationType,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!(
            "UPDATE operations \
             SET status = 'ending', \
                 ended_at = NOW() + ($2::bigint * INTERVAL '1 second'), \
                 termination_type = $3 \
             WHERE id = $1 AND status = 'active' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .bind(grace_secs)
            .bind(termination.as_str())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Any non-ended status `-> ended` immediately. A termination type
    /// already recorded by `begin_ending` is kept.
    ///
    /// Returns `true` if this call performed the transition.
    pub async fn end_immediately(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        termination: TerminationType,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations \
             SET status = 'ended', ended_at = NOW(), \
                 termination_type = COALESCE(termination_type, $2) \
             WHERE id = $1 AND status <> 'ended'",
        )
        .bind(id)
        .bind(termination.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `ending -> ended` once the deadline has passed. `ended_at` keeps the
    /// deadline, which is the actual end time.
    ///
    /// Returns `true` only for the one caller that performed the transition.
    pub async fn mark_finalized(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations SET status = 'ended' \
             WHERE id = $1 AND status = 'ending' AND ended_at <= NOW()",
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move the director role, conditioned on the current director.
    pub async fn transfer_director(
        tx: &mut Transaction<'_, Postgres>,
        id: DbId,
        from_user: DbId,
        to_user: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations SET director_id = $3 \
             WHERE id = $1 AND director_id = $2 AND status <> 'ended'",
        )
        .bind(id)
        .bind(from_user)
        .bind(to_user)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record ledger movement on an active operation.
    pub async fn touch_activity(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operations SET last_activity_at = NOW() \
             WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
