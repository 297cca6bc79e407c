//! Repository for the `resource_prices` table.

use std::collections::HashMap;

use sqlx::PgPool;
use minebud_core::types::ResourceTypeId;

use crate::models::price::ResourcePrice;

/// Column list for `resource_prices` queries.
const COLUMNS: &str = "id, name, best_buy, created_at, updated_at";

/// Provides price cache operations.
pub struct PriceRepo;

impl PriceRepo {
    /// Insert or refresh a price. A `None` name keeps the stored one.
    pub async fn upsert(
        pool: &PgPool,
        type_id: ResourceTypeId,
        name: Option<&str>,
        best_buy: f64,
    ) -> Result<ResourcePrice, sqlx::Error> {
        let query = format!(
            "INSERT INTO resource_prices (id, name, best_buy) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE \
                 SET name = COALESCE(EXCLUDED.name, resource_prices.name), \
                     best_buy = EXCLUDED.best_buy \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ResourcePrice>(&query)
            .bind(type_id)
            .bind(name)
            .bind(best_buy)
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_types(
        pool: &PgPool,
        type_ids: &[ResourceTypeId],
    ) -> Result<Vec<ResourcePrice>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM resource_prices WHERE id = ANY($1) ORDER BY id");
        sqlx::query_as::<_, ResourcePrice>(&query)
            .bind(type_ids)
            .fetch_all(pool)
            .await
    }

    /// `type -> best buy` for the given types. Unknown types are absent.
    pub async fn price_map(
        pool: &PgPool,
        type_ids: &[ResourceTypeId],
    ) -> Result<HashMap<ResourceTypeId, f64>, sqlx::Error> {
        Ok(Self::list_for_types(pool, type_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.best_buy))
            .collect())
    }

    /// Types among `type_ids` with no price, or a price older than
    /// `max_age_secs`.
    pub async fn stale_types(
        pool: &PgPool,
        type_ids: &[ResourceTypeId],
        max_age_secs: i64,
    ) -> Result<Vec<ResourceTypeId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT t.type_id FROM UNNEST($1::bigint[]) AS t(type_id) \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM resource_prices p \
                 WHERE p.id = t.type_id \
                   AND p.updated_at > NOW() - ($2::bigint * INTERVAL '1 second') \
             ) \
             ORDER BY t.type_id",
        )
        .bind(type_ids)
        .bind(max_age_secs)
        .fetch_all(pool)
        .await
    }
}
