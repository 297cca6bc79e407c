//! Periodic sweep loops.
//!
//! Each [`SweepLoop`] is a long-lived Tokio task that runs one [`Sweep`] on a
//! fixed interval until cancelled. Failures are logged and the loop keeps
//! ticking.

use std::time::Duration;

use minebud_lifecycle::{LifecycleResult, OperationService};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// One kind of periodic reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// Finalize `ending` operations whose grace period has elapsed.
    FinalizeDue,
    /// End operations with no recorded mining activity for too long.
    Inactivity,
    /// Refresh stale reference prices.
    PriceRefresh,
}

impl Sweep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FinalizeDue => "finalize",
            Self::Inactivity => "inactivity",
            Self::PriceRefresh => "price_refresh",
        }
    }

    /// Run one pass against `service`. The service logs the outcome.
    pub async fn run_once(&self, service: &OperationService) -> LifecycleResult<()> {
        match self {
            Self::FinalizeDue => {
                let report = service.sweep_finalize_due().await?;
                tracing::debug!(sweep = self.name(), ?report, "Sweep pass done");
            }
            Self::Inactivity => {
                let report = service.sweep_inactive().await?;
                tracing::debug!(sweep = self.name(), ?report, "Sweep pass done");
            }
            Self::PriceRefresh => {
                let report = service.refresh_prices().await?;
                tracing::debug!(sweep = self.name(), ?report, "Sweep pass done");
            }
        }
        Ok(())
    }
}

/// A sweep bound to a service and an interval.
pub struct SweepLoop {
    sweep: Sweep,
    service: OperationService,
    interval: Duration,
}

impl SweepLoop {
    pub fn new(sweep: Sweep, service: OperationService, interval: Duration) -> Self {
        Self {
            sweep,
            service,
            interval,
        }
    }

    /// Run the loop until the cancellation token is triggered.
    ///
    /// The first pass runs immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            sweep = self.sweep.name(),
            interval_secs = self.interval.as_secs(),
            "Sweep loop started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(sweep = self.sweep.name(), "Sweep loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep.run_once(&self.service).await {
                        tracing::error!(sweep = self.sweep.name(), error = %e, "Sweep pass failed");
                    }
                }
            }
        }
    }
}
