//! Participant action vocabulary and the permission matrix.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ledger::ParticipantStatus;
use crate::operation::OperationStatus;
use crate::types::DbId;

pub const ACTION_KICK: &str = "kick";
pub const ACTION_BAN: &str = "ban";
pub const ACTION_PROMOTE: &str = "promote";
pub const ACTION_LEAVE: &str = "leave";
pub const ACTION_END: &str = "end";

pub const VALID_ACTIONS: &[&str] = &[
    ACTION_KICK,
    ACTION_BAN,
    ACTION_PROMOTE,
    ACTION_LEAVE,
    ACTION_END,
];

/// An action a participant performs on an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantAction {
    Kick,
    Ban,
    Promote,
    Leave,
    End,
}

impl ParticipantAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kick => ACTION_KICK,
            Self::Ban => ACTION_BAN,
            Self::Promote => ACTION_PROMOTE,
            Self::Leave => ACTION_LEAVE,
            Self::End => ACTION_END,
        }
    }

    /// Parse from a string, returning a validation error for unknown actions.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            ACTION_KICK => Ok(Self::Kick),
            ACTION_BAN => Ok(Self::Ban),
            ACTION_PROMOTE => Ok(Self::Promote),
            ACTION_LEAVE => Ok(Self::Leave),
            ACTION_END => Ok(Self::End),
            other => Err(CoreError::Validation(format!(
                "Unknown action: '{other}'. Valid actions: {}",
                VALID_ACTIONS.join(", ")
            ))),
        }
    }

    /// Whether the action operates on another participant.
    pub fn requires_target(&self) -> bool {
        matches!(self, Self::Kick | Self::Ban | Self::Promote)
    }
}

/// A user's participation row as seen by the permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub user_id: DbId,
    pub status: ParticipantStatus,
    pub is_admin: bool,
}

impl Membership {
    fn is_active(&self) -> bool {
        self.status == ParticipantStatus::Active
    }
}

/// Inputs to [`authorize`], gathered under the operation row lock.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub action: ParticipantAction,
    pub operation_status: OperationStatus,
    pub director_id: DbId,
    pub actor_id: DbId,
    pub actor: Option<&'a Membership>,
    pub target_id: Option<DbId>,
    pub target: Option<&'a Membership>,
}

/// Check whether the actor may perform the action.
///
/// - Actor must be an active participant (`Forbidden`).
/// - Leave is allowed until the operation has ended (`Conflict` after).
/// - Every other action requires an `active` operation (`Conflict`).
/// - End and promote require the director; kick and ban require an admin,
///   and the director when the target is an admin (`Forbidden`).
/// - Targeted actions need a target (`Validation`) that is not the actor
///   (`Forbidden`) and is an active participant (`Validation`).
pub fn authorize(ctx: &ActionContext<'_>) -> Result<(), CoreError> {
    let actor = match ctx.actor {
        Some(m) if m.is_active() => m,
        _ => {
            return Err(CoreError::Forbidden(
                "You are not an active participant in this operation".to_string(),
            ))
        }
    };
    let is_director = ctx.actor_id == ctx.director_id;

    if ctx.action == ParticipantAction::Leave {
        if ctx.operation_status == OperationStatus::Ended {
            return Err(CoreError::Conflict("Operation has already ended".to_string()));
        }
        return Ok(());
    }

    if ctx.operation_status != OperationStatus::Active {
        return Err(CoreError::Conflict(format!(
            "Operation is {}, actions require an active operation",
            ctx.operation_status.as_str()
        )));
    }

    if ctx.action == ParticipantAction::End {
        if !is_director {
            return Err(CoreError::Forbidden(
                "Only the director can end the operation".to_string(),
            ));
        }
        return Ok(());
    }

    let target_id = ctx.target_id.ok_or_else(|| {
        CoreError::Validation(format!("{} requires a target user", ctx.action.as_str()))
    })?;

    if target_id == ctx.actor_id {
        return Err(CoreError::Forbidden(format!(
            "You cannot {} yourself",
            ctx.action.as_str()
        )));
    }

    match ctx.action {
        ParticipantAction::Promote if !is_director => {
            return Err(CoreError::Forbidden(
                "Only the director can promote participants".to_string(),
            ));
        }
        ParticipantAction::Kick | ParticipantAction::Ban if !actor.is_admin => {
            return Err(CoreError::Forbidden(format!(
                "Only admins can {} participants",
                ctx.action.as_str()
            )));
        }
        _ => {}
    }

    let target = match ctx.target {
        Some(m) if m.is_active() => m,
        _ => {
            return Err(CoreError::Validation(format!(
                "User {target_id} is not an active participant"
            )))
        }
    };

    if matches!(ctx.action, ParticipantAction::Kick | ParticipantAction::Ban)
        && target.is_admin
        && !is_director
    {
        return Err(CoreError::Forbidden(format!(
            "Only the director can {} another admin",
            ctx.action.as_str()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const DIRECTOR: DbId = 1;
    const ADMIN: DbId = 2;
    const MEMBER: DbId = 3;
    const OTHER: DbId = 4;

    fn member(user_id: DbId, is_admin: bool) -> Membership {
        Membership {
            user_id,
            status: ParticipantStatus::Active,
            is_admin,
        }
    }

    #[test]
    fn test_targeted_actions() {
        use ParticipantAction::*;
        for action in [Kick, Ban, Promote] {
            assert!(action.requires_target());
        }
        assert!(!Leave.requires_target());
        assert!(!End.requires_target());
    }

    fn check(
        action: ParticipantAction,
        actor: &Membership,
        target: Option<&Membership>,
    ) -> Result<(), CoreError> {
        authorize(&ActionContext {
            action,
            operation_status: OperationStatus::Active,
            director_id: DIRECTOR,
            actor_id: actor.user_id,
            actor: Some(actor),
            target_id: target.map(|t| t.user_id),
            target,
        })
    }

    #[test]
    fn test_non_admin_cannot_kick_or_ban() {
        let actor = member(MEMBER, false);
        let target = member(OTHER, false);
        assert_matches!(
            check(ParticipantAction::Kick, &actor, Some(&target)),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            check(ParticipantAction::Ban, &actor, Some(&target)),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn test_admin_can_kick_member_but_not_admin() {
        let actor = member(ADMIN, true);
        assert!(check(ParticipantAction::Kick, &actor, Some(&member(MEMBER, false))).is_ok());
        assert_matches!(
            check(ParticipantAction::Ban, &actor, Some(&member(OTHER, true))),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn test_director_can_kick_admin() {
        let actor = member(DIRECTOR, true);
        assert!(check(ParticipantAction::Kick, &actor, Some(&member(ADMIN, true))).is_ok());
    }

    #[test]
    fn test_self_target_is_forbidden() {
        let actor = member(DIRECTOR, true);
        assert_matches!(
            check(ParticipantAction::Kick, &actor, Some(&actor)),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn test_only_director_promotes_and_ends() {
        let admin = member(ADMIN, true);
        assert_matches!(
            check(ParticipantAction::Promote, &admin, Some(&member(MEMBER, false))),
            Err(CoreError::Forbidden(_))
        );
        assert_matches!(
            check(ParticipantAction::End, &admin, None),
            Err(CoreError::Forbidden(_))
        );
        let director = member(DIRECTOR, true);
        assert!(check(ParticipantAction::Promote, &director, Some(&member(MEMBER, false))).is_ok());
        assert!(check(ParticipantAction::End, &director, None).is_ok());
    }

    #[test]
    fn test_inactive_target_is_validation_error() {
        let director = member(DIRECTOR, true);
        let gone = Membership {
            user_id: MEMBER,
            status: ParticipantStatus::Left,
            is_admin: false,
        };
        assert_matches!(
            check(ParticipantAction::Kick, &director, Some(&gone)),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            check(ParticipantAction::Kick, &director, None),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn test_non_participant_actor_is_forbidden() {
        let result = authorize(&ActionContext {
            action: ParticipantAction::Leave,
            operation_status: OperationStatus::Active,
            director_id: DIRECTOR,
            actor_id: OTHER,
            actor: None,
            target_id: None,
            target: None,
        });
        assert_matches!(result, Err(CoreError::Forbidden(_)));
    }

    #[test]
    fn test_admin_actions_require_active_operation() {
        let director = member(DIRECTOR, true);
        let result = authorize(&ActionContext {
            action: ParticipantAction::Kick,
            operation_status: OperationStatus::Ending,
            director_id: DIRECTOR,
            actor_id: DIRECTOR,
            actor: Some(&director),
            target_id: Some(MEMBER),
            target: Some(&member(MEMBER, false)),
        });
        assert_matches!(result, Err(CoreError::Conflict(_)));
    }

    #[test]
    fn test_leave_allowed_while_ending() {
        let actor = member(MEMBER, false);
        let ctx = ActionContext {
            action: ParticipantAction::Leave,
            operation_status: OperationStatus::Ending,
            director_id: DIRECTOR,
            actor_id: MEMBER,
            actor: Some(&actor),
            target_id: None,
            target: None,
        };
        assert!(authorize(&ctx).is_ok());

        let ended = ActionContext {
            operation_status: OperationStatus::Ended,
            ..ctx
        };
        assert_matches!(authorize(&ended), Err(CoreError::Conflict(_)));
    }

    #[test]
    fn test_unknown_action_is_validation_error() {
        assert_matches!(
            ParticipantAction::from_str("mutiny"),
            Err(CoreError::Validation(_))
        );
        assert_eq!(
            ParticipantAction::from_str("promote").unwrap(),
            ParticipantAction::Promote
        );
    }
}
