//! Kick, ban, promote, leave and end, including director succession.

mod common;

use assert_matches::assert_matches;
use common::*;
use minebud_core::error::CoreError;
use minebud_core::ledger::ParticipantStatus;
use minebud_core::permissions::ParticipantAction;
use minebud_db::models::operation::Operation;
use minebud_db::models::user::User;
use minebud_db::repositories::OperationRepo;
use minebud_lifecycle::{ActionOutcome, LifecycleError};
use sqlx::PgPool;

/// Director plus two members, all joined in order.
async fn crew(h: &Harness, pool: &PgPool) -> (Operation, User, User, User) {
    let director = new_user(pool, 2001).await;
    let first = new_user(pool, 2002).await;
    let second = new_user(pool, 2003).await;
    let op = h.service.create_operation(director.id, "Crew", None).await.unwrap();
    h.service.join_operation(first.id, &op.join_code).await.unwrap();
    h.service.join_operation(second.id, &op.join_code).await.unwrap();
    (op, director, first, second)
}

async fn director_of(pool: &PgPool, op: &Operation) -> i64 {
    OperationRepo::find_by_id(pool, op.id).await.unwrap().unwrap().director_id
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_member_cannot_kick_or_end(pool: PgPool) {
    let h = harness(&pool, test_config());
    let (op, director, first, _) = crew(&h, &pool).await;

    let kick = h
        .service
        .participant_action(first.id, op.id, ParticipantAction::Kick, Some(director.id))
        .await;
    assert_matches!(kick, Err(LifecycleError::Core(CoreError::Forbidden(_))));

    let end = h
        .service
        .participant_action(first.id, op.id, ParticipantAction::End, None)
        .await;
    assert_matches!(end, Err(LifecycleError::Core(CoreError::Forbidden(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_outsider_and_missing_target(pool: PgPool) {
    let h = harness(&pool, test_config());
    let (op, director, _, _) = crew(&h, &pool).await;
    let outsider = new_user(&pool, 2999).await;

    let result = h
        .service
        .participant_action(outsider.id, op.id, ParticipantAction::Leave, None)
        .await;
    assert_matches!(result, Err(LifecycleError::Core(CoreError::Forbidden(_))));

    let result = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::Kick, None)
        .await;
    assert_matches!(result, Err(LifecycleError::Core(CoreError::Validation(_))));

    let result = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::Kick, Some(outsider.id))
        .await;
    assert_matches!(result, Err(LifecycleError::Core(CoreError::Validation(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unknown_operation_is_not_found(pool: PgPool) {
    let h = harness(&pool, test_config());
    let user = new_user(&pool, 2001).await;

    let result = h
        .service
        .participant_action(user.id, 424242, ParticipantAction::Leave, None)
        .await;
    assert_matches!(
        result,
        Err(LifecycleError::Core(CoreError::NotFound { entity: "Operation", .. }))
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_actions_other_than_leave_need_active_operation(pool: PgPool) {
    let config = minebud_lifecycle::LifecycleConfig {
        grace_period_secs: 600,
        ..test_config()
    };
    let h = harness(&pool, config);
    let (op, director, first, second) = crew(&h, &pool).await;

    h.service
        .participant_action(director.id, op.id, ParticipantAction::End, None)
        .await
        .unwrap();

    let kick = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::Kick, Some(first.id))
        .await;
    assert_matches!(kick, Err(LifecycleError::Core(CoreError::Conflict(_))));

    // Leaving during the grace period is still allowed.
    let leave = h
        .service
        .participant_action(second.id, op.id, ParticipantAction::Leave, None)
        .await
        .unwrap();
    assert_matches!(leave, ActionOutcome::Left { operation_ended: false, .. });
}

// ---------------------------------------------------------------------------
// Kick / ban
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_kick_releases_pointer_and_allows_rejoin(pool: PgPool) {
    let mut h = harness(&pool, test_config());
    let (op, director, first, _) = crew(&h, &pool).await;
    drain_event_types(&mut h.events);

    let outcome = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::Kick, Some(first.id))
        .await
        .unwrap();
    assert_matches!(
        outcome,
        ActionOutcome::Kicked { status: Some(ParticipantStatus::Kicked), .. }
    );
    assert_eq!(active_pointer(&pool, first.id).await, None);
    assert_eq!(drain_event_types(&mut h.events), vec!["participant.departed"]);

    h.service.join_operation(first.id, &op.join_code).await.unwrap();
    assert_eq!(
        participant_status(&pool, op.id, first.id).await.as_deref(),
        Some("active")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_second_kick_escalates_to_banned_status(pool: PgPool) {
    let h = harness(&pool, test_config());
    let director = new_user(&pool, 2001).await;
    let other_director = new_user(&pool, 2002).await;
    let miner = new_user(&pool, 2003).await;
    let first = h.service.create_operation(director.id, "One", None).await.unwrap();
    let second = h
        .service
        .create_operation(other_director.id, "Two", None)
        .await
        .unwrap();

    h.service.join_operation(miner.id, &first.join_code).await.unwrap();
    h.service
        .participant_action(director.id, first.id, ParticipantAction::Kick, Some(miner.id))
        .await
        .unwrap();

    h.service.join_operation(miner.id, &second.join_code).await.unwrap();
    let outcome = h
        .service
        .participant_action(other_director.id, second.id, ParticipantAction::Kick, Some(miner.id))
        .await
        .unwrap();
    assert_matches!(
        outcome,
        ActionOutcome::Kicked { status: Some(ParticipantStatus::Banned), .. }
    );

    // Escalation writes the status but no ban record.
    h.service.join_operation(miner.id, &second.join_code).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_admin_cannot_kick_admin(pool: PgPool) {
    let h = harness(&pool, test_config());
    let (op, director, first, second) = crew(&h, &pool).await;

    // Promote first, then hand director back so first stays admin.
    h.service
        .participant_action(director.id, op.id, ParticipantAction::Promote, Some(first.id))
        .await
        .unwrap();
    h.service
        .participant_action(first.id, op.id, ParticipantAction::Promote, Some(second.id))
        .await
        .unwrap();

    // Director is now second; first and the original director are admins.
    let result = h
        .service
        .participant_action(first.id, op.id, ParticipantAction::Ban, Some(director.id))
        .await;
    assert_matches!(result, Err(LifecycleError::Core(CoreError::Forbidden(_))));

    let banned = h
        .service
        .participant_action(second.id, op.id, ParticipantAction::Ban, Some(director.id))
        .await
        .unwrap();
    assert_matches!(banned, ActionOutcome::Banned { .. });
    assert_eq!(
        participant_status(&pool, op.id, director.id).await.as_deref(),
        Some("banned")
    );
}

// ---------------------------------------------------------------------------
// Promote / succession
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_promote_transfers_director(pool: PgPool) {
    let mut h = harness(&pool, test_config());
    let (op, director, first, _) = crew(&h, &pool).await;
    drain_event_types(&mut h.events);

    let outcome = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::Promote, Some(first.id))
        .await
        .unwrap();
    assert_matches!(outcome, ActionOutcome::Promoted { director_id } if director_id == first.id);
    assert_eq!(director_of(&pool, &op).await, first.id);
    assert_eq!(drain_event_types(&mut h.events), vec!["director.changed"]);

    // The former director can no longer end the operation.
    let end = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::End, None)
        .await;
    assert_matches!(end, Err(LifecycleError::Core(CoreError::Forbidden(_))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_director_leave_prefers_admin(pool: PgPool) {
    let h = harness(&pool, test_config());
    let (op, director, first, second) = crew(&h, &pool).await;
    sqlx::query(
        "UPDATE operation_participants SET is_admin = true WHERE operation_id = $1 AND user_id = $2",
    )
    .bind(op.id)
    .bind(second.id)
    .execute(&pool)
    .await
    .unwrap();

    let outcome = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::Leave, None)
        .await
        .unwrap();
    assert_matches!(
        outcome,
        ActionOutcome::Left { new_director_id: Some(id), operation_ended: false, .. } if id == second.id
    );
    assert_eq!(director_of(&pool, &op).await, second.id);
    let _ = first;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_director_leave_falls_back_to_earliest_member(pool: PgPool) {
    let mut h = harness(&pool, test_config());
    let (op, director, first, _) = crew(&h, &pool).await;
    drain_event_types(&mut h.events);

    h.service
        .participant_action(director.id, op.id, ParticipantAction::Leave, None)
        .await
        .unwrap();

    assert_eq!(director_of(&pool, &op).await, first.id);
    let status = h.service.get_operation_status(op.id).await.unwrap();
    let promoted = status
        .participants
        .iter()
        .find(|p| p.participant.user_id == first.id)
        .unwrap();
    assert!(promoted.participant.is_admin);
    assert_eq!(
        drain_event_types(&mut h.events),
        vec!["participant.departed", "director.changed"]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_last_director_leaving_ends_operation(pool: PgPool) {
    let mut h = harness(&pool, test_config());
    let director = new_user(&pool, 2001).await;
    let op = h.service.create_operation(director.id, "Solo", None).await.unwrap();
    drain_event_types(&mut h.events);

    let outcome = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::Leave, None)
        .await
        .unwrap();

    assert_matches!(outcome, ActionOutcome::Left { operation_ended: true, .. });
    let stored = OperationRepo::find_by_id(&pool, op.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "ended");
    assert_eq!(stored.termination_type.as_deref(), Some("manual"));
    assert!(stored.ended_at.is_some());
    assert_eq!(
        drain_event_types(&mut h.events),
        vec!["participant.departed", "operation.ended"]
    );
    assert_eq!(stored_event_types(&pool, op.id).await, vec!["operation.ended"]);
}

// ---------------------------------------------------------------------------
// End
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_end_starts_grace_period(pool: PgPool) {
    let config = minebud_lifecycle::LifecycleConfig {
        grace_period_secs: 5,
        ..test_config()
    };
    let h = harness(&pool, config);
    let (op, director, _, _) = crew(&h, &pool).await;

    let outcome = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::End, None)
        .await
        .unwrap();
    let ending = match outcome {
        ActionOutcome::Ending { operation } => operation,
        other => panic!("expected ending, got {other:?}"),
    };
    assert_eq!(ending.status, "ending");
    assert_eq!(ending.termination_type.as_deref(), Some("manual"));

    let again = h
        .service
        .participant_action(director.id, op.id, ParticipantAction::End, None)
        .await;
    assert_matches!(again, Err(LifecycleError::Core(CoreError::Conflict(_))));
}
