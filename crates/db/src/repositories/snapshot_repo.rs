//! Repository for the `ledger_snapshots` table.

use std::collections::{BTreeMap, HashMap};

use sqlx::{PgPool, Postgres, Transaction};
use minebud_core::delta::SnapshotKind;
use minebud_core::types::{DbId, ResourceTypeId, Timestamp};

use crate::models::snapshot::LedgerSnapshot;

/// Column list for `ledger_snapshots` queries.
const COLUMNS: &str = "id, operation_id, user_id, resource_type_id, quantity, kind, \
                       captured_at, created_at, updated_at";

/// Provides capture and query operations for ledger snapshots.
pub struct SnapshotRepo;

impl SnapshotRepo {
    /// Store one capture: a row per resource type, all sharing the
    /// transaction's timestamp. Repeated `start` rows for the same
    /// (operation, user, type) are ignored.
    ///
    /// Returns the number of rows inserted.
    pub async fn insert_capture(
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        user_id: DbId,
        kind: SnapshotKind,
        quantities: &BTreeMap<ResourceTypeId, i64>,
    ) -> Result<u64, sqlx::Error> {
        if quantities.is_empty() {
            return Ok(0);
        }
        let type_ids: Vec<ResourceTypeId> = quantities.keys().copied().collect();
        let amounts: Vec<i64> = quantities.values().copied().collect();

        let result = sqlx::query(
            "INSERT INTO ledger_snapshots \
                 (operation_id, user_id, resource_type_id, quantity, kind, captured_at) \
             SELECT $1, $2, t.type_id, t.quantity, $5, NOW() \
             FROM UNNEST($3::bigint[], $4::bigint[]) AS t(type_id, quantity) \
             ON CONFLICT (operation_id, user_id, resource_type_id) WHERE kind = 'start' \
             DO NOTHING",
        )
        .bind(operation_id)
        .bind(user_id)
        .bind(&type_ids)
        .bind(&amounts)
        .bind(kind.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    /// The most recent quantity per resource type for one user, across all
    /// capture kinds.
    pub async fn latest_quantities(
        pool: &PgPool,
        operation_id: DbId,
        user_id: DbId,
    ) -> Result<HashMap<ResourceTypeId, i64>, sqlx::Error> {
        let rows: Vec<(ResourceTypeId, i64)> = sqlx::query_as(
            "SELECT DISTINCT ON (resource_type_id) resource_type_id, quantity \
             FROM ledger_snapshots \
             WHERE operation_id = $1 AND user_id = $2 \
             ORDER BY resource_type_id, id DESC",
        )
        .bind(operation_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Rows needed by the delta computation: every `start` row plus the
    /// latest `update`/`end` row per (user, type).
    pub async fn delta_inputs(
        pool: &PgPool,
        operation_id: DbId,
    ) -> Result<Vec<LedgerSnapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ledger_snapshots \
             WHERE operation_id = $1 AND kind = 'start' \
             UNION ALL \
             (SELECT DISTINCT ON (user_id, resource_type_id) {COLUMNS} \
              FROM ledger_snapshots \
              WHERE operation_id = $1 AND kind IN ('update', 'end') \
              ORDER BY user_id, resource_type_id, id DESC)"
        );
        sqlx::query_as::<_, LedgerSnapshot>(&query)
            .bind(operation_id)
            .fetch_all(pool)
            .await
    }

    /// Distinct `update` captures (one per user and capture time) taken
    /// after `since`.
    pub async fn count_update_captures_since(
        pool: &PgPool,
        operation_id: DbId,
        since: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM ( \
                 SELECT DISTINCT user_id, captured_at FROM ledger_snapshots \
                 WHERE operation_id = $1 AND kind = 'update' AND captured_at > $2 \
             ) captures",
        )
        .bind(operation_id)
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Every resource type seen in any capture.
    pub async fn known_resource_types(pool: &PgPool) -> Result<Vec<ResourceTypeId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT resource_type_id FROM ledger_snapshots ORDER BY resource_type_id",
        )
        .fetch_all(pool)
        .await
    }

    /// Whether the user has any capture in the operation.
    pub async fn has_captures(
        pool: &PgPool,
        operation_id: DbId,
        user_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS ( \
                 SELECT 1 FROM ledger_snapshots WHERE operation_id = $1 AND user_id = $2 \
             )",
        )
        .bind(operation_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// All rows for one user, oldest first.
    pub async fn list_for_user(
        pool: &PgPool,
        operation_id: DbId,
        user_id: DbId,
    ) -> Result<Vec<LedgerSnapshot>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM ledger_snapshots \
             WHERE operation_id = $1 AND user_id = $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, LedgerSnapshot>(&query)
            .bind(operation_id)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }
}
