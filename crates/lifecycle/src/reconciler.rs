//! Ending and finalizing operations.
//!
//! [`OperationService::finalize_if_due`] is the single finalize primitive.
//! The status read path calls it when it notices an elapsed deadline, and the
//! worker sweep calls it for every due operation. Both may race; the
//! conditioned `ending -> ended` write lets exactly one of them win, and only
//! the winner ends participants and records `operation.finalized`.
//!
//! Terminal events are inserted into `lifecycle_events` inside the
//! transaction that performs the transition; the bus only fans them out
//! after commit.

use minebud_core::delta::SnapshotKind;
use minebud_core::ledger::{partition_departures, Departure};
use minebud_core::operation::TerminationType;
use minebud_core::types::DbId;
use minebud_db::models::operation::Operation;
use minebud_db::repositories::{
    DepartureOutcome, EventRepo, OperationRepo, ParticipantRepo, UserRepo,
};
use minebud_events::{event_types, LifecycleEvent};
use serde::Serialize;
use sqlx::{Postgres, Transaction};

use crate::error::LifecycleResult;
use crate::service::OperationService;

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Candidates the sweep looked at.
    pub examined: usize,
    /// Candidates this pass transitioned.
    pub transitioned: usize,
    /// Candidates that raised an error and were skipped.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Transaction-level helpers
// ---------------------------------------------------------------------------

/// Move `users` out of `active` through the escalation ladder and clear
/// their global pointers.
pub(crate) async fn depart_users(
    tx: &mut Transaction<'_, Postgres>,
    operation_id: DbId,
    departure: Departure,
    users: &[DbId],
) -> Result<DepartureOutcome, sqlx::Error> {
    if users.is_empty() {
        return Ok(DepartureOutcome::default());
    }
    let prior = ParticipantRepo::fetch_prior_statuses(tx, users, operation_id).await?;
    let plan = partition_departures(departure, users, &prior);
    let outcome = ParticipantRepo::apply_departures(tx, operation_id, departure, &plan).await?;
    UserRepo::release_active_operation(tx, users, operation_id).await?;
    Ok(outcome)
}

/// End every remaining active participant of an operation.
pub(crate) async fn end_participants(
    tx: &mut Transaction<'_, Postgres>,
    operation_id: DbId,
) -> Result<Vec<DbId>, sqlx::Error> {
    let active: Vec<DbId> = ParticipantRepo::lock_active(tx, operation_id)
        .await?
        .into_iter()
        .map(|p| p.user_id)
        .collect();
    depart_users(tx, operation_id, Departure::Leave, &active).await?;
    Ok(active)
}

/// Write `event` to `lifecycle_events` in `tx` and return it flagged as
/// persisted, ready to publish once `tx` commits.
pub(crate) async fn record_event(
    tx: &mut Transaction<'_, Postgres>,
    event: LifecycleEvent,
) -> Result<LifecycleEvent, sqlx::Error> {
    EventRepo::insert_in_tx(
        tx,
        &event.event_type,
        event.operation_id,
        event.actor_user_id,
        &event.payload,
    )
    .await?;
    Ok(event.mark_persisted())
}

/// `operation.ended` for an operation that skipped the grace period.
pub(crate) fn ended_event(
    operation_id: DbId,
    termination: TerminationType,
    actor_user_id: Option<DbId>,
    departed: &[DbId],
) -> LifecycleEvent {
    let mut event = LifecycleEvent::new(event_types::OPERATION_ENDED)
        .for_operation(operation_id)
        .with_payload(serde_json::json!({
            "termination_type": termination.as_str(),
            "participants": departed,
        }));
    if let Some(actor) = actor_user_id {
        event = event.with_actor(actor);
    }
    event
}

pub(crate) fn departure_payload(outcome: &DepartureOutcome) -> serde_json::Value {
    serde_json::json!({
        "updated": outcome
            .updated
            .iter()
            .map(|(user_id, status)| serde_json::json!({ "user_id": user_id, "status": status.as_str() }))
            .collect::<Vec<_>>(),
        "deleted": outcome.deleted,
    })
}

impl OperationService {
    // -----------------------------------------------------------------------
    // Finalize
    // -----------------------------------------------------------------------

    /// Finalize an `ending` operation whose deadline has passed.
    ///
    /// Returns `true` only for the caller that performed the transition. A
    /// loser (already ended, not yet due, or beaten by a concurrent caller)
    /// gets `false` and has no side effects.
    pub async fn finalize_if_due(&self, operation_id: DbId) -> LifecycleResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !OperationRepo::mark_finalized(&mut tx, operation_id).await? {
            return Ok(false);
        }
        let departed = end_participants(&mut tx, operation_id).await?;
        let event = record_event(
            &mut tx,
            LifecycleEvent::new(event_types::OPERATION_FINALIZED)
                .for_operation(operation_id)
                .with_payload(serde_json::json!({ "participants": departed })),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(operation_id, participants = departed.len(), "Operation finalized");
        self.publish(event);

        for user_id in departed {
            self.capture_best_effort(operation_id, user_id, SnapshotKind::End)
                .await;
        }
        Ok(true)
    }

    /// Start the grace period on an active operation.
    ///
    /// Returns the updated operation, or `None` if it was no longer active.
    pub async fn begin_ending(
        &self,
        operation_id: DbId,
        termination: TerminationType,
        actor_user_id: Option<DbId>,
    ) -> LifecycleResult<Option<Operation>> {
        let mut tx = self.pool.begin().await?;
        let updated = OperationRepo::begin_ending(
            &mut tx,
            operation_id,
            self.config.grace_period_secs,
            termination,
        )
        .await?;
        tx.commit().await?;

        if let Some(operation) = &updated {
            self.publish_ending(operation, termination, actor_user_id);
        }
        Ok(updated)
    }

    /// Administrative override: end a non-ended operation now, skipping
    /// any grace period.
    ///
    /// Returns `true` if this call performed the transition.
    pub async fn end_immediately(
        &self,
        operation_id: DbId,
        termination: TerminationType,
        actor_user_id: Option<DbId>,
    ) -> LifecycleResult<bool> {
        let mut tx = self.pool.begin().await?;
        if !OperationRepo::end_immediately(&mut tx, operation_id, termination).await? {
            return Ok(false);
        }
        let departed = end_participants(&mut tx, operation_id).await?;
        let event = record_event(
            &mut tx,
            ended_event(operation_id, termination, actor_user_id, &departed),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            operation_id,
            termination = termination.as_str(),
            participants = departed.len(),
            "Operation ended immediately"
        );
        self.publish(event);
        for user_id in departed {
            self.capture_best_effort(operation_id, user_id, SnapshotKind::End)
                .await;
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Sweeps
    // -----------------------------------------------------------------------

    /// Finalize every due operation. A failure on one operation is logged
    /// and the sweep moves on.
    pub async fn sweep_finalize_due(&self) -> LifecycleResult<SweepReport> {
        let due = OperationRepo::list_due_ids(&self.pool).await?;
        let mut report = SweepReport {
            examined: due.len(),
            ..Default::default()
        };

        for operation_id in due {
            match self.finalize_if_due(operation_id).await {
                Ok(true) => report.transitioned += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(operation_id, error = %e, "Finalize failed");
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                finalized = report.transitioned,
                failed = report.failed,
                "Finalize sweep complete"
            );
        }
        Ok(report)
    }

    /// Move active operations idle past the inactivity threshold into
    /// `ending`. They finalize through the normal grace path.
    pub async fn sweep_inactive(&self) -> LifecycleResult<SweepReport> {
        let idle =
            OperationRepo::list_inactive_ids(&self.pool, self.config.inactivity_threshold_secs)
                .await?;
        let mut report = SweepReport {
            examined: idle.len(),
            ..Default::default()
        };

        for operation_id in idle {
            match self
                .begin_ending(operation_id, TerminationType::Inactivity, None)
                .await
            {
                Ok(Some(_)) => report.transitioned += 1,
                Ok(None) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(operation_id, error = %e, "Inactivity end failed");
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                ended = report.transitioned,
                failed = report.failed,
                "Inactivity sweep complete"
            );
        }
        Ok(report)
    }

    // ---- event helpers ----

    pub(crate) fn publish_ending(
        &self,
        operation: &Operation,
        termination: TerminationType,
        actor_user_id: Option<DbId>,
    ) {
        tracing::info!(
            operation_id = operation.id,
            termination = termination.as_str(),
            "Operation ending"
        );
        let mut event = LifecycleEvent::new(event_types::OPERATION_ENDING)
            .for_operation(operation.id)
            .with_payload(serde_json::json!({
                "termination_type": termination.as_str(),
                "ended_at": operation.ended_at,
            }));
        if let Some(actor) = actor_user_id {
            event = event.with_actor(actor);
        }
        self.publish(event);
    }
}
