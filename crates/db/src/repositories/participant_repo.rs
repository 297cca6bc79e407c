//! Repository for the `operation_participants` table.
//!
//! Writes that move a participant out of `active` are conditioned on
//! `status = 'active'`, so a write that loses a race affects zero rows.

use std::collections::HashMap;

use sqlx::{Connection, PgPool, Postgres, Transaction};
use minebud_core::ledger::{
    partition_departures, Departure, DeparturePlan, ParticipantStatus, PriorStatuses,
};
use minebud_core::types::DbId;

use crate::is_unique_violation;
use crate::models::participant::{Participant, ParticipantWithUser};

/// Column list for `operation_participants` queries.
const COLUMNS: &str = "operation_id, user_id, status, is_admin, join_time, leave_time, \
                       created_at, updated_at";

/// Unique index enforcing one row per user per exclusive status.
pub const EXCLUSIVE_STATUS_INDEX: &str = "uq_participants_user_exclusive_status";

/// Rows touched by applying a [`DeparturePlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartureOutcome {
    /// `(user_id, status written)` for updated rows.
    pub updated: Vec<(DbId, ParticipantStatus)>,
    /// Users whose row was deleted, including buckets that fell back to delete.
    pub deleted: Vec<DbId>,
}

impl DepartureOutcome {
    fn record(&mut self, status: ParticipantStatus, user_ids: Vec<DbId>) {
        self.updated
            .extend(user_ids.into_iter().map(|id| (id, status)));
    }
}

/// Provides membership operations for operation participants.
pub struct ParticipantRepo;

impl ParticipantRepo {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn find(
        pool: &PgPool,
        operation_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Participant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operation_participants \
             WHERE operation_id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, Participant>(&query)
            .bind(operation_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Same as [`find`](Self::find), inside a transaction.
    pub async fn find_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        user_id: DbId,
    ) -> Result<Option<Participant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operation_participants \
             WHERE operation_id = $1 AND user_id = $2"
        );
        sqlx::query_as::<_, Participant>(&query)
            .bind(operation_id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Everyone who took part in an operation, with display names, in join
    /// order.
    ///
    /// Users whose row the ladder deleted still have their captures; they are
    /// listed as `left`, spanning their first to last capture.
    pub async fn list_with_users(
        pool: &PgPool,
        operation_id: DbId,
    ) -> Result<Vec<ParticipantWithUser>, sqlx::Error> {
        sqlx::query_as::<_, ParticipantWithUser>(
            "SELECT p.user_id, u.display_name, p.status, p.is_admin, p.join_time, p.leave_time \
             FROM operation_participants p \
             JOIN users u ON u.id = p.user_id \
             WHERE p.operation_id = $1 \
             UNION ALL \
             SELECT s.user_id, u.display_name, 'left', false, \
                    MIN(s.captured_at), MAX(s.captured_at) \
             FROM ledger_snapshots s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.operation_id = $1 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM operation_participants p \
                   WHERE p.operation_id = s.operation_id AND p.user_id = s.user_id \
               ) \
             GROUP BY s.user_id, u.display_name \
             ORDER BY join_time, user_id",
        )
        .bind(operation_id)
        .fetch_all(pool)
        .await
    }

    /// Ids of active participants.
    pub async fn list_active_user_ids(
        pool: &PgPool,
        operation_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM operation_participants \
             WHERE operation_id = $1 AND status = 'active' \
             ORDER BY user_id",
        )
        .bind(operation_id)
        .fetch_all(pool)
        .await
    }

    /// Lock and return the active participants of an operation, in join order.
    pub async fn lock_active(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
    ) -> Result<Vec<Participant>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operation_participants \
             WHERE operation_id = $1 AND status = 'active' \
             ORDER BY join_time, user_id \
             FOR UPDATE"
        );
        sqlx::query_as::<_, Participant>(&query)
            .bind(operation_id)
            .fetch_all(&mut **tx)
            .await
    }

    /// Bulk-fetch the exclusive terminal statuses each user holds in
    /// operations other than `operation_id`.
    pub async fn fetch_prior_statuses(
        tx: &mut Transaction<'_, Postgres>,
        user_ids: &[DbId],
        operation_id: DbId,
    ) -> Result<HashMap<DbId, PriorStatuses>, sqlx::Error> {
        let rows: Vec<(DbId, String)> = sqlx::query_as(
            "SELECT DISTINCT user_id, status FROM operation_participants \
             WHERE user_id = ANY($1) AND operation_id <> $2 \
               AND status IN ('left', 'kicked')",
        )
        .bind(user_ids)
        .bind(operation_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut grouped: HashMap<DbId, Vec<String>> = HashMap::new();
        for (user_id, status) in rows {
            grouped.entry(user_id).or_default().push(status);
        }
        Ok(grouped
            .into_iter()
            .map(|(user_id, statuses)| {
                let prior = PriorStatuses::from_statuses(statuses.iter().map(String::as_str));
                (user_id, prior)
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Add a user to an operation, or reactivate their earlier row.
    ///
    /// Returns `None` if the user is already active in this operation.
    pub async fn join(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        user_id: DbId,
        is_admin: bool,
    ) -> Result<Option<Participant>, sqlx::Error> {
        let query = format!(
            "INSERT INTO operation_participants (operation_id, user_id, is_admin) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (operation_id, user_id) DO UPDATE \
                 SET status = 'active', join_time = NOW(), leave_time = NULL \
                 WHERE operation_participants.status <> 'active' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Participant>(&query)
            .bind(operation_id)
            .bind(user_id)
            .bind(is_admin)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Grant admin to an active participant.
    pub async fn set_admin(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE operation_participants SET is_admin = true \
             WHERE operation_id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(operation_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a ladder plan: one bulk statement per bucket, each conditioned
    /// on `status = 'active'` and run in its own savepoint.
    ///
    /// If a status bucket collides with the exclusive-status index (a
    /// conflicting row appeared after the prior statuses were fetched), that
    /// bucket alone is rolled back, its users' prior statuses are fetched
    /// again and the ladder is re-applied to them. A second collision
    /// deletes the rows of the colliding sub-bucket.
    pub async fn apply_departures(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        departure: Departure,
        plan: &DeparturePlan,
    ) -> Result<DepartureOutcome, sqlx::Error> {
        let mut outcome = DepartureOutcome::default();

        for (status, users) in plan.status_buckets() {
            if users.is_empty() {
                continue;
            }
            match Self::write_status(tx, operation_id, status, users).await? {
                Some(user_ids) => outcome.record(status, user_ids),
                None => {
                    tracing::debug!(
                        operation_id,
                        status = status.as_str(),
                        users = users.len(),
                        "Exclusive status taken concurrently, re-resolving bucket"
                    );
                    Self::reapply_bucket(tx, operation_id, departure, users, &mut outcome).await?;
                }
            }
        }

        if !plan.deleted.is_empty() {
            outcome
                .deleted
                .extend(Self::delete_active(tx, operation_id, &plan.deleted).await?);
        }

        Ok(outcome)
    }

    /// Re-run the ladder for the users of a bucket that collided.
    async fn reapply_bucket(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        departure: Departure,
        users: &[DbId],
        outcome: &mut DepartureOutcome,
    ) -> Result<(), sqlx::Error> {
        let prior = Self::fetch_prior_statuses(tx, users, operation_id).await?;
        let replan = partition_departures(departure, users, &prior);

        for (status, users) in replan.status_buckets() {
            if users.is_empty() {
                continue;
            }
            match Self::write_status(tx, operation_id, status, users).await? {
                Some(user_ids) => outcome.record(status, user_ids),
                None => {
                    tracing::warn!(
                        operation_id,
                        status = status.as_str(),
                        users = users.len(),
                        "Exclusive status still taken, deleting rows instead"
                    );
                    outcome
                        .deleted
                        .extend(Self::delete_active(tx, operation_id, users).await?);
                }
            }
        }
        if !replan.deleted.is_empty() {
            outcome
                .deleted
                .extend(Self::delete_active(tx, operation_id, &replan.deleted).await?);
        }
        Ok(())
    }

    /// Move still-active rows to `status` inside a savepoint. Returns `None`
    /// (with the savepoint rolled back) on an exclusive-status collision.
    async fn write_status(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        status: ParticipantStatus,
        users: &[DbId],
    ) -> Result<Option<Vec<DbId>>, sqlx::Error> {
        let mut savepoint = Connection::begin(&mut **tx).await?;
        let written = sqlx::query_scalar::<_, DbId>(
            "UPDATE operation_participants \
             SET status = $3, leave_time = NOW() \
             WHERE operation_id = $1 AND user_id = ANY($2) AND status = 'active' \
             RETURNING user_id",
        )
        .bind(operation_id)
        .bind(users)
        .bind(status.as_str())
        .fetch_all(&mut *savepoint)
        .await;

        match written {
            Ok(user_ids) => {
                savepoint.commit().await?;
                Ok(Some(user_ids))
            }
            Err(e) if is_unique_violation(&e, Some(EXCLUSIVE_STATUS_INDEX)) => {
                savepoint.rollback().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete still-active rows for the given users, returning who was removed.
    async fn delete_active(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        user_ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "DELETE FROM operation_participants \
             WHERE operation_id = $1 AND user_id = ANY($2) AND status = 'active' \
             RETURNING user_id",
        )
        .bind(operation_id)
        .bind(user_ids)
        .fetch_all(&mut **tx)
        .await
    }
}
