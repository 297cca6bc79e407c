//! Repository for the `lifecycle_events` table.

use sqlx::{PgPool, Postgres, Transaction};
use minebud_core::types::DbId;

use crate::models::event::LifecycleEventRow;

/// Column list for `lifecycle_events` queries.
const COLUMNS: &str = "id, event_type, operation_id, actor_user_id, payload, created_at, updated_at";

/// Provides persistence for lifecycle events.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event, returning its id.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        operation_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO lifecycle_events (event_type, operation_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(operation_id)
        .bind(actor_user_id)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// Same as [`insert`](Self::insert), inside the caller's transaction so
    /// the row commits together with the transition it records.
    pub async fn insert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        event_type: &str,
        operation_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO lifecycle_events (event_type, operation_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(operation_id)
        .bind(actor_user_id)
        .bind(payload)
        .fetch_one(&mut **tx)
        .await
    }

    /// Events for one operation, oldest first.
    pub async fn list_for_operation(
        pool: &PgPool,
        operation_id: DbId,
    ) -> Result<Vec<LifecycleEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lifecycle_events WHERE operation_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, LifecycleEventRow>(&query)
            .bind(operation_id)
            .fetch_all(pool)
            .await
    }
}
