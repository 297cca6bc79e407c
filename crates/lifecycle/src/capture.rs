//! Ledger snapshot capture.
//!
//! A capture reads the user's cumulative ledger from the gateway outside any
//! transaction, then stores one row per resource type. Gateway failures are
//! logged and the capture is skipped; they never fail the caller.

use minebud_core::delta::{aggregate_readings, reading_changed, SnapshotKind};
use minebud_core::types::{DbId, ResourceTypeId};
use minebud_db::repositories::{OperationRepo, PriceRepo, SnapshotRepo};
use serde::Serialize;

use crate::error::LifecycleResult;
use crate::service::OperationService;

/// Result of one capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    Captured {
        rows: u64,
        /// The reading moved since the previous capture.
        activity: bool,
    },
    /// The gateway could not be read.
    Skipped,
}

impl OperationService {
    /// Capture a user's ledger into an operation.
    ///
    /// `update` and `end` captures that observe any movement bump the
    /// operation's activity clock. Afterwards, prices for every type seen
    /// are refreshed if missing or stale.
    pub async fn capture_snapshot(
        &self,
        operation_id: DbId,
        user_id: DbId,
        kind: SnapshotKind,
    ) -> LifecycleResult<CaptureOutcome> {
        let user = self.require_user(user_id).await?;

        let readings = match self.gateway.fetch_readings(&user.ledger_account()).await {
            Ok(readings) => readings,
            Err(e) => {
                tracing::warn!(
                    operation_id,
                    user_id,
                    kind = kind.as_str(),
                    error = %e,
                    "Ledger read failed, capture skipped"
                );
                return Ok(CaptureOutcome::Skipped);
            }
        };
        let totals = aggregate_readings(&readings);

        let previous = match kind {
            SnapshotKind::Start => None,
            _ => Some(SnapshotRepo::latest_quantities(&self.pool, operation_id, user_id).await?),
        };

        let mut tx = self.pool.begin().await?;
        let rows = SnapshotRepo::insert_capture(&mut tx, operation_id, user_id, kind, &totals).await?;
        tx.commit().await?;

        let activity = match previous {
            Some(prev) if reading_changed(&prev, &totals) => {
                OperationRepo::touch_activity(&self.pool, operation_id).await?
            }
            _ => false,
        };

        tracing::debug!(
            operation_id,
            user_id,
            kind = kind.as_str(),
            rows,
            activity,
            "Ledger captured"
        );

        let types: Vec<ResourceTypeId> = totals.keys().copied().collect();
        self.ensure_prices(&types).await?;

        Ok(CaptureOutcome::Captured { rows, activity })
    }

    /// Capture, logging instead of propagating any failure. Used after a
    /// transition has committed, where the transition must stand regardless.
    pub(crate) async fn capture_best_effort(
        &self,
        operation_id: DbId,
        user_id: DbId,
        kind: SnapshotKind,
    ) {
        if let Err(e) = self.capture_snapshot(operation_id, user_id, kind).await {
            tracing::warn!(
                operation_id,
                user_id,
                kind = kind.as_str(),
                error = %e,
                "Capture failed"
            );
        }
    }

    /// Fetch prices for types with no cached price or one older than the
    /// configured maximum age. A type without buy orders is cached at zero.
    pub(crate) async fn ensure_prices(&self, type_ids: &[ResourceTypeId]) -> LifecycleResult<()> {
        if type_ids.is_empty() {
            return Ok(());
        }
        let stale = PriceRepo::stale_types(&self.pool, type_ids, self.config.price_max_age_secs).await?;
        for type_id in stale {
            let best_buy = match self.gateway.fetch_best_buy(type_id).await {
                Ok(price) => price.unwrap_or(0.0),
                Err(e) => {
                    tracing::warn!(type_id, error = %e, "Price lookup failed");
                    continue;
                }
            };
            let name = match self.gateway.fetch_type_name(type_id).await {
                Ok(name) => Some(name),
                Err(e) => {
                    tracing::debug!(type_id, error = %e, "Type name lookup failed");
                    None
                }
            };
            PriceRepo::upsert(&self.pool, type_id, name.as_deref(), best_buy).await?;
        }
        Ok(())
    }
}
