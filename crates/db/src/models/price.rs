use serde::Serialize;
use sqlx::FromRow;
use minebud_core::types::{ResourceTypeId, Timestamp};

/// A row from the `resource_prices` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResourcePrice {
    pub id: ResourceTypeId,
    pub name: Option<String>,
    pub best_buy: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
