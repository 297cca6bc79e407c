//! Periodic price refresh for every resource type seen in any capture.

use minebud_db::repositories::{PriceRepo, SnapshotRepo};
use serde::Serialize;

use crate::error::LifecycleResult;
use crate::service::OperationService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriceRefreshReport {
    pub refreshed: usize,
    pub failed: usize,
}

impl OperationService {
    /// Refetch the best buy price of every known resource type. Lookup
    /// failures keep the cached price and are counted, not raised.
    pub async fn refresh_prices(&self) -> LifecycleResult<PriceRefreshReport> {
        let types = SnapshotRepo::known_resource_types(&self.pool).await?;
        let mut report = PriceRefreshReport::default();

        for type_id in types {
            match self.gateway.fetch_best_buy(type_id).await {
                Ok(price) => {
                    PriceRepo::upsert(&self.pool, type_id, None, price.unwrap_or(0.0)).await?;
                    report.refreshed += 1;
                }
                Err(e) => {
                    tracing::warn!(type_id, error = %e, "Price refresh failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            refreshed = report.refreshed,
            failed = report.failed,
            "Price refresh complete"
        );
        Ok(report)
    }
}
