//! Creating, joining and reading operations.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use minebud_core::delta::{
    compute_deltas, suppress_for_warmup, total_value, user_value, DeltaMap, SnapshotKind,
    SnapshotRow,
};
use minebud_core::error::{CoreError, JoinRejection};
use minebud_core::join_code::{
    generate_join_code, normalize_join_code, validate_join_code, MAX_JOIN_CODE_ATTEMPTS,
};
use minebud_core::operation::{display_phase, validate_title, DisplayPhase, OperationStatus};
use minebud_core::types::{DbId, ResourceTypeId};
use minebud_db::is_unique_violation;
use minebud_db::models::operation::{CreateOperation, Operation};
use minebud_db::models::participant::{Participant, ParticipantWithUser};
use minebud_db::repositories::participant_repo::EXCLUSIVE_STATUS_INDEX;
use minebud_db::repositories::{
    BanRepo, OperationRepo, ParticipantRepo, PriceRepo, SnapshotRepo, UserRepo,
};
use minebud_events::{event_types, LifecycleEvent};
use serde::Serialize;
use sqlx::{Postgres, Transaction};

use crate::error::LifecycleResult;
use crate::service::OperationService;

/// Unique constraint on `operations.join_code`.
const JOIN_CODE_CONSTRAINT: &str = "uq_operations_join_code";

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A participant row with the value they have mined so far.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSummary {
    #[serde(flatten)]
    pub participant: ParticipantWithUser,
    pub mined_value: f64,
}

/// Status read model for one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationStatusView {
    pub operation: Operation,
    pub display: DisplayPhase,
    pub participants: Vec<ParticipantSummary>,
    pub total_value: f64,
    /// Deltas are withheld while the operation warms up.
    pub warming_up: bool,
}

/// Per-user mined quantities and the prices used to value them.
#[derive(Debug, Clone, Serialize)]
pub struct MiningData {
    pub operation_id: DbId,
    pub warming_up: bool,
    pub per_user_deltas: DeltaMap,
    pub prices: BTreeMap<ResourceTypeId, f64>,
    pub total_value: f64,
}

/// Deltas for an operation after the freshness guard.
struct Valuation {
    deltas: DeltaMap,
    prices: BTreeMap<ResourceTypeId, f64>,
    warming_up: bool,
}

impl OperationService {
    // -----------------------------------------------------------------------
    // Create / join
    // -----------------------------------------------------------------------

    /// Create an operation directed by `director_id`, who joins it as admin.
    ///
    /// Join codes are random; a collision with an existing code is retried
    /// with a fresh code up to [`MAX_JOIN_CODE_ATTEMPTS`] times.
    pub async fn create_operation(
        &self,
        director_id: DbId,
        title: &str,
        description: Option<&str>,
    ) -> LifecycleResult<Operation> {
        validate_title(title).map_err(CoreError::Validation)?;
        let director = self.require_user(director_id).await?;
        if director.active_operation_id.is_some() {
            return Err(JoinRejection::AlreadyActive.into());
        }

        let input = CreateOperation {
            director_id,
            title: title.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        };

        for attempt in 1..=MAX_JOIN_CODE_ATTEMPTS {
            let code = generate_join_code();
            let mut tx = self.pool.begin().await?;
            let operation = match OperationRepo::create(&mut tx, &input, &code).await {
                Ok(operation) => operation,
                Err(e) if is_unique_violation(&e, Some(JOIN_CODE_CONSTRAINT)) => {
                    tracing::debug!(attempt, "Join code collision, retrying");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if !UserRepo::claim_active_operation(&mut tx, director_id, operation.id).await? {
                return Err(JoinRejection::AlreadyActive.into());
            }
            join_participant(&mut tx, operation.id, director_id, true).await?;
            tx.commit().await?;

            tracing::info!(
                operation_id = operation.id,
                director_id,
                "Operation created"
            );
            self.publish(
                LifecycleEvent::new(event_types::OPERATION_CREATED)
                    .for_operation(operation.id)
                    .with_actor(director_id)
                    .with_payload(serde_json::json!({
                        "title": operation.title,
                        "join_code": operation.join_code,
                    })),
            );
            self.capture_best_effort(operation.id, director_id, SnapshotKind::Start)
                .await;
            return Ok(operation);
        }

        Err(CoreError::Internal(format!(
            "No free join code after {MAX_JOIN_CODE_ATTEMPTS} attempts"
        ))
        .into())
    }

    /// Join the active operation carrying `join_code`.
    pub async fn join_operation(&self, user_id: DbId, join_code: &str) -> LifecycleResult<Participant> {
        let code = normalize_join_code(join_code);
        if validate_join_code(&code).is_err() {
            return Err(JoinRejection::InvalidCode.into());
        }
        self.require_user(user_id).await?;

        let mut tx = self.pool.begin().await?;
        let operation = OperationRepo::lock_active_by_join_code(&mut tx, &code)
            .await?
            .ok_or(JoinRejection::InvalidCode)?;

        if BanRepo::exists(&mut tx, operation.id, user_id).await? {
            return Err(JoinRejection::Banned.into());
        }
        if !UserRepo::claim_active_operation(&mut tx, user_id, operation.id).await? {
            return Err(JoinRejection::AlreadyActive.into());
        }
        let participant = join_participant(&mut tx, operation.id, user_id, false).await?;
        tx.commit().await?;

        tracing::info!(operation_id = operation.id, user_id, "Participant joined");
        self.publish(
            LifecycleEvent::new(event_types::PARTICIPANT_JOINED)
                .for_operation(operation.id)
                .with_actor(user_id),
        );
        self.capture_best_effort(operation.id, user_id, SnapshotKind::Start)
            .await;
        Ok(participant)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The operation the user currently belongs to, if any.
    pub async fn current_operation(&self, user_id: DbId) -> LifecycleResult<Option<Operation>> {
        Ok(OperationRepo::find_current_for_user(&self.pool, user_id).await?)
    }

    /// Status of an operation. An `ending` operation is offered to
    /// [`finalize_if_due`](Self::finalize_if_due) first, which checks the
    /// deadline against the database clock, so pollers see the ended state
    /// without waiting for the sweep.
    pub async fn get_operation_status(&self, operation_id: DbId) -> LifecycleResult<OperationStatusView> {
        let mut operation = self.require_operation(operation_id).await?;

        if operation.status()? == OperationStatus::Ending {
            match self.finalize_if_due(operation_id).await {
                Ok(true) => operation = self.require_operation(operation_id).await?,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(operation_id, error = %e, "Finalize on read failed");
                }
            }
        }

        let participants = ParticipantRepo::list_with_users(&self.pool, operation_id).await?;
        let valuation = self.valuation(&operation).await?;

        let participants = participants
            .into_iter()
            .map(|participant| ParticipantSummary {
                mined_value: user_value(&valuation.deltas, participant.user_id),
                participant,
            })
            .collect();

        Ok(OperationStatusView {
            display: display_phase(operation.status()?, operation.ended_at, Utc::now()),
            total_value: total_value(&valuation.deltas),
            warming_up: valuation.warming_up,
            participants,
            operation,
        })
    }

    /// Mined quantities per user. The caller's ledger is captured first when
    /// they are still active in a running operation.
    ///
    /// While the operation runs, only active participants are reported;
    /// once it has ended, everyone who took part is. Taking part means
    /// holding a participant row or having a capture in the operation.
    pub async fn get_mining_data(&self, operation_id: DbId, caller_id: DbId) -> LifecycleResult<MiningData> {
        let operation = self.require_operation(operation_id).await?;
        let caller = ParticipantRepo::find(&self.pool, operation_id, caller_id).await?;
        let took_part = match &caller {
            Some(_) => true,
            None => SnapshotRepo::has_captures(&self.pool, operation_id, caller_id).await?,
        };
        if !took_part {
            return Err(
                CoreError::Forbidden("You are not a participant in this operation".to_string()).into(),
            );
        }

        if !operation.is_ended() && caller.as_ref().is_some_and(Participant::is_active) {
            self.capture_best_effort(operation_id, caller_id, SnapshotKind::Update)
                .await;
        }

        let mut valuation = self.valuation(&operation).await?;
        if !operation.is_ended() {
            let active: HashSet<DbId> = ParticipantRepo::list_active_user_ids(&self.pool, operation_id)
                .await?
                .into_iter()
                .collect();
            valuation.deltas.retain(|user_id, _| active.contains(user_id));
        }

        Ok(MiningData {
            operation_id,
            warming_up: valuation.warming_up,
            total_value: total_value(&valuation.deltas),
            per_user_deltas: valuation.deltas,
            prices: valuation.prices,
        })
    }

    // ---- private helpers ----

    /// Compute deltas and apply the freshness guard.
    async fn valuation(&self, operation: &Operation) -> LifecycleResult<Valuation> {
        let now = Utc::now();
        let updates =
            SnapshotRepo::count_update_captures_since(&self.pool, operation.id, operation.created_at)
                .await?;
        if suppress_for_warmup(operation.created_at, now, updates, self.config.warmup_window_secs) {
            return Ok(Valuation {
                deltas: DeltaMap::new(),
                prices: BTreeMap::new(),
                warming_up: true,
            });
        }

        let rows = SnapshotRepo::delta_inputs(&self.pool, operation.id)
            .await?
            .iter()
            .map(|s| s.to_row())
            .collect::<Result<Vec<SnapshotRow>, CoreError>>()?;

        let mut type_ids: Vec<ResourceTypeId> = rows.iter().map(|r| r.resource_type_id).collect();
        type_ids.sort_unstable();
        type_ids.dedup();
        let prices = PriceRepo::price_map(&self.pool, &type_ids).await?;

        Ok(Valuation {
            deltas: compute_deltas(&rows, &prices),
            prices: prices.into_iter().collect(),
            warming_up: false,
        })
    }
}

/// Insert or reactivate a participant row. A user already active here or
/// elsewhere is rejected as already active.
async fn join_participant(
    tx: &mut Transaction<'_, Postgres>,
    operation_id: DbId,
    user_id: DbId,
    is_admin: bool,
) -> LifecycleResult<Participant> {
    match ParticipantRepo::join(tx, operation_id, user_id, is_admin).await {
        Ok(Some(participant)) => Ok(participant),
        Ok(None) => Err(JoinRejection::AlreadyActive.into()),
        Err(e) if is_unique_violation(&e, Some(EXCLUSIVE_STATUS_INDEX)) => {
            Err(JoinRejection::AlreadyActive.into())
        }
        Err(e) => Err(e.into()),
    }
}
