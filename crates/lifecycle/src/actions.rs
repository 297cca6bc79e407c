//! Participant actions: kick, ban, promote, leave and end.
//!
//! Each action locks the operation row for the duration of its transaction,
//! so it serializes against joins, finalization and other actions on the
//! same operation.

use minebud_core::delta::SnapshotKind;
use minebud_core::error::CoreError;
use minebud_core::ledger::{Departure, ParticipantStatus};
use minebud_core::operation::TerminationType;
use minebud_core::permissions::{authorize, ActionContext, Membership, ParticipantAction};
use minebud_core::succession::{choose_successor, Candidate, Succession};
use minebud_core::types::DbId;
use minebud_db::models::operation::Operation;
use minebud_db::models::participant::Participant;
use minebud_db::repositories::{BanRepo, DepartureOutcome, OperationRepo, ParticipantRepo};
use minebud_events::{event_types, LifecycleEvent};
use serde::Serialize;
use sqlx::{Postgres, Transaction};

use crate::error::LifecycleResult;
use crate::reconciler::{
    departure_payload, depart_users, end_participants, ended_event, record_event,
};
use crate::service::OperationService;

/// What a participant action did.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// `status` is `None` when the row had to be deleted.
    Kicked {
        user_id: DbId,
        status: Option<ParticipantStatus>,
    },
    Banned { user_id: DbId },
    Promoted { director_id: DbId },
    Left {
        status: Option<ParticipantStatus>,
        new_director_id: Option<DbId>,
        operation_ended: bool,
    },
    Ending { operation: Operation },
}

fn status_of(outcome: &DepartureOutcome, user_id: DbId) -> Option<ParticipantStatus> {
    outcome
        .updated
        .iter()
        .find(|(id, _)| *id == user_id)
        .map(|(_, status)| *status)
}

async fn membership(
    tx: &mut Transaction<'_, Postgres>,
    operation_id: DbId,
    user_id: DbId,
) -> LifecycleResult<Option<Membership>> {
    Ok(ParticipantRepo::find_in_tx(tx, operation_id, user_id)
        .await?
        .map(|p| p.membership())
        .transpose()?)
}

impl OperationService {
    /// Perform `action` as `actor_id` on an operation.
    pub async fn participant_action(
        &self,
        actor_id: DbId,
        operation_id: DbId,
        action: ParticipantAction,
        target_user_id: Option<DbId>,
    ) -> LifecycleResult<ActionOutcome> {
        let mut tx = self.pool.begin().await?;
        let operation = OperationRepo::lock_for_update(&mut tx, operation_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Operation",
                id: operation_id,
            })?;

        let actor = membership(&mut tx, operation_id, actor_id).await?;
        let target = match target_user_id {
            Some(target_id) => membership(&mut tx, operation_id, target_id).await?,
            None => None,
        };
        authorize(&ActionContext {
            action,
            operation_status: operation.status()?,
            director_id: operation.director_id,
            actor_id,
            actor: actor.as_ref(),
            target_id: target_user_id,
            target: target.as_ref(),
        })?;

        match action {
            ParticipantAction::End => self.end_operation(tx, operation_id, actor_id).await,
            ParticipantAction::Leave => self.leave(tx, &operation, actor_id).await,
            ParticipantAction::Kick | ParticipantAction::Ban | ParticipantAction::Promote => {
                let target_id = target_user_id.ok_or_else(|| {
                    CoreError::Validation(format!("{} requires a target user", action.as_str()))
                })?;
                match action {
                    ParticipantAction::Promote => {
                        self.promote(tx, operation_id, actor_id, target_id).await
                    }
                    _ => self.remove(tx, operation_id, actor_id, action, target_id).await,
                }
            }
        }
    }

    // ---- per-action transactions ----

    async fn end_operation(
        &self,
        mut tx: Transaction<'_, Postgres>,
        operation_id: DbId,
        actor_id: DbId,
    ) -> LifecycleResult<ActionOutcome> {
        let operation = OperationRepo::begin_ending(
            &mut tx,
            operation_id,
            self.config.grace_period_secs,
            TerminationType::Manual,
        )
        .await?
        .ok_or_else(|| CoreError::Conflict("Operation is no longer active".to_string()))?;
        tx.commit().await?;

        self.publish_ending(&operation, TerminationType::Manual, Some(actor_id));
        Ok(ActionOutcome::Ending { operation })
    }

    async fn remove(
        &self,
        mut tx: Transaction<'_, Postgres>,
        operation_id: DbId,
        actor_id: DbId,
        action: ParticipantAction,
        target_id: DbId,
    ) -> LifecycleResult<ActionOutcome> {
        let departure = if action == ParticipantAction::Ban {
            BanRepo::upsert(&mut tx, operation_id, target_id, actor_id).await?;
            Departure::Ban
        } else {
            Departure::Kick
        };
        let outcome = depart_users(&mut tx, operation_id, departure, &[target_id]).await?;
        tx.commit().await?;

        tracing::info!(
            operation_id,
            actor_id,
            target_id,
            action = action.as_str(),
            "Participant removed"
        );
        self.publish_departed(operation_id, actor_id, action, &outcome);

        Ok(match action {
            ParticipantAction::Ban => ActionOutcome::Banned { user_id: target_id },
            _ => ActionOutcome::Kicked {
                user_id: target_id,
                status: status_of(&outcome, target_id),
            },
        })
    }

    async fn promote(
        &self,
        mut tx: Transaction<'_, Postgres>,
        operation_id: DbId,
        actor_id: DbId,
        target_id: DbId,
    ) -> LifecycleResult<ActionOutcome> {
        self.hand_over(&mut tx, operation_id, actor_id, target_id).await?;
        tx.commit().await?;

        self.publish_director_changed(operation_id, actor_id, target_id, "promote");
        Ok(ActionOutcome::Promoted {
            director_id: target_id,
        })
    }

    /// Voluntary leave. A departing director hands over to the earliest
    /// admin, else the earliest member; if nobody remains the operation
    /// ends at once.
    async fn leave(
        &self,
        mut tx: Transaction<'_, Postgres>,
        operation: &Operation,
        actor_id: DbId,
    ) -> LifecycleResult<ActionOutcome> {
        let operation_id = operation.id;
        let outcome = depart_users(&mut tx, operation_id, Departure::Leave, &[actor_id]).await?;

        let mut succession = None;
        let mut ended = None;
        if operation.director_id == actor_id {
            let remaining: Vec<Candidate> = ParticipantRepo::lock_active(&mut tx, operation_id)
                .await?
                .iter()
                .map(Participant::candidate)
                .collect();
            let decision = choose_successor(&remaining);
            match decision {
                Succession::PromoteAdmin(next) | Succession::PromoteMember(next) => {
                    self.hand_over(&mut tx, operation_id, actor_id, next).await?;
                }
                Succession::EndOperation => {
                    OperationRepo::end_immediately(&mut tx, operation_id, TerminationType::Manual)
                        .await?;
                    end_participants(&mut tx, operation_id).await?;
                    let event = ended_event(
                        operation_id,
                        TerminationType::Manual,
                        Some(actor_id),
                        &[],
                    );
                    ended = Some(record_event(&mut tx, event).await?);
                }
            }
            succession = Some(decision);
        }
        tx.commit().await?;

        tracing::info!(operation_id, user_id = actor_id, "Participant left");
        self.publish_departed(operation_id, actor_id, ParticipantAction::Leave, &outcome);

        let (new_director_id, operation_ended) = match succession {
            Some(Succession::PromoteAdmin(next)) | Some(Succession::PromoteMember(next)) => {
                self.publish_director_changed(operation_id, actor_id, next, "succession");
                (Some(next), false)
            }
            Some(Succession::EndOperation) => {
                tracing::info!(operation_id, "Last participant left, operation ended");
                if let Some(event) = ended {
                    self.publish(event);
                }
                (None, true)
            }
            None => (None, false),
        };

        self.capture_best_effort(operation_id, actor_id, SnapshotKind::End)
            .await;

        Ok(ActionOutcome::Left {
            status: status_of(&outcome, actor_id),
            new_director_id,
            operation_ended,
        })
    }

    /// Move the director role to `to_user` and make sure they are admin.
    async fn hand_over(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        operation_id: DbId,
        from_user: DbId,
        to_user: DbId,
    ) -> LifecycleResult<()> {
        if !OperationRepo::transfer_director(tx, operation_id, from_user, to_user).await? {
            return Err(CoreError::Conflict("Director changed concurrently".to_string()).into());
        }
        ParticipantRepo::set_admin(tx, operation_id, to_user).await?;
        Ok(())
    }

    // ---- event helpers ----

    fn publish_departed(
        &self,
        operation_id: DbId,
        actor_id: DbId,
        action: ParticipantAction,
        outcome: &DepartureOutcome,
    ) {
        let mut payload = departure_payload(outcome);
        payload["reason"] = serde_json::Value::from(action.as_str());
        self.publish(
            LifecycleEvent::new(event_types::PARTICIPANT_DEPARTED)
                .for_operation(operation_id)
                .with_actor(actor_id)
                .with_payload(payload),
        );
    }

    fn publish_director_changed(&self, operation_id: DbId, from: DbId, to: DbId, reason: &str) {
        tracing::info!(operation_id, from, to, reason, "Director changed");
        self.publish(
            LifecycleEvent::new(event_types::DIRECTOR_CHANGED)
                .for_operation(operation_id)
                .with_actor(from)
                .with_payload(serde_json::json!({
                    "from": from,
                    "to": to,
                    "reason": reason,
                })),
        );
    }
}
