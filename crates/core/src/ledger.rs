//! Participant statuses and the escalation ladder.
//!
//! The store allows a user at most one row per *exclusive* status
//! (`active`, `left`, `kicked`) across all operations. When a departure would
//! write a status the user already holds elsewhere, the ladder picks the next
//! free rung instead, ending with deleting the row outright. `banned` is not
//! exclusive, so it is always writable.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Participant status
// ---------------------------------------------------------------------------

pub const PARTICIPANT_ACTIVE: &str = "active";
pub const PARTICIPANT_LEFT: &str = "left";
pub const PARTICIPANT_KICKED: &str = "kicked";
pub const PARTICIPANT_BANNED: &str = "banned";

/// Status of a user's participation row in one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Active,
    Left,
    Kicked,
    Banned,
}

impl ParticipantStatus {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => PARTICIPANT_ACTIVE,
            Self::Left => PARTICIPANT_LEFT,
            Self::Kicked => PARTICIPANT_KICKED,
            Self::Banned => PARTICIPANT_BANNED,
        }
    }

    /// Parse from a string, returning an error for unknown statuses.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            PARTICIPANT_ACTIVE => Ok(Self::Active),
            PARTICIPANT_LEFT => Ok(Self::Left),
            PARTICIPANT_KICKED => Ok(Self::Kicked),
            PARTICIPANT_BANNED => Ok(Self::Banned),
            other => Err(CoreError::Internal(format!(
                "Unknown participant status: '{other}'"
            ))),
        }
    }

    /// Whether the store allows only one row per user with this status.
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, Self::Banned)
    }
}

// ---------------------------------------------------------------------------
// Ladder
// ---------------------------------------------------------------------------

/// How a participant is leaving an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Voluntary leave, or the operation ending around them.
    Leave,
    Kick,
    Ban,
}

/// Exclusive terminal statuses a user already holds in *other* operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorStatuses {
    pub left: bool,
    pub kicked: bool,
}

impl PriorStatuses {
    /// Build from the status strings fetched for one user.
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
        let mut prior = Self::default();
        for status in statuses {
            match status {
                PARTICIPANT_LEFT => prior.left = true,
                PARTICIPANT_KICKED => prior.kicked = true,
                _ => {}
            }
        }
        prior
    }
}

/// What to do with the departing participant's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Update the row to this status.
    Write(ParticipantStatus),
    /// Delete the row; every exclusive rung is taken.
    Delete,
}

/// Resolve a departure against the user's statuses in other operations.
///
/// | departure | prior        | result          |
/// |-----------|--------------|-----------------|
/// | leave     | none         | write `left`    |
/// | leave     | left         | write `kicked`  |
/// | leave     | kicked       | write `banned`  |
/// | leave     | left, kicked | delete          |
/// | kick      | not kicked   | write `kicked`  |
/// | kick      | kicked       | write `banned`  |
/// | ban       | any          | write `banned`  |
pub fn resolve_departure(departure: Departure, prior: PriorStatuses) -> Resolution {
    match departure {
        Departure::Leave => match (prior.left, prior.kicked) {
            (false, false) => Resolution::Write(ParticipantStatus::Left),
            (true, false) => Resolution::Write(ParticipantStatus::Kicked),
            (false, true) => Resolution::Write(ParticipantStatus::Banned),
            (true, true) => Resolution::Delete,
        },
        Departure::Kick if prior.kicked => Resolution::Write(ParticipantStatus::Banned),
        Departure::Kick => Resolution::Write(ParticipantStatus::Kicked),
        Departure::Ban => Resolution::Write(ParticipantStatus::Banned),
    }
}

/// Users grouped by the write each needs, for one bulk statement per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeparturePlan {
    pub left: Vec<DbId>,
    pub kicked: Vec<DbId>,
    pub banned: Vec<DbId>,
    pub deleted: Vec<DbId>,
}

impl DeparturePlan {
    /// Status buckets paired with their target status, in write order.
    pub fn status_buckets(&self) -> [(ParticipantStatus, &[DbId]); 3] {
        [
            (ParticipantStatus::Kicked, self.kicked.as_slice()),
            (ParticipantStatus::Banned, self.banned.as_slice()),
            (ParticipantStatus::Left, self.left.as_slice()),
        ]
    }
}

/// Partition `users` into ladder buckets. Users absent from `prior` have no
/// conflicting rows.
pub fn partition_departures(
    departure: Departure,
    users: &[DbId],
    prior: &HashMap<DbId, PriorStatuses>,
) -> DeparturePlan {
    let mut plan = DeparturePlan::default();
    for &user_id in users {
        let existing = prior.get(&user_id).copied().unwrap_or_default();
        match resolve_departure(departure, existing) {
            Resolution::Write(ParticipantStatus::Left) => plan.left.push(user_id),
            Resolution::Write(ParticipantStatus::Kicked) => plan.kicked.push(user_id),
            Resolution::Write(ParticipantStatus::Banned) => plan.banned.push(user_id),
            Resolution::Write(ParticipantStatus::Active) => {}
            Resolution::Delete => plan.deleted.push(user_id),
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: PriorStatuses = PriorStatuses {
        left: false,
        kicked: false,
    };
    const LEFT: PriorStatuses = PriorStatuses {
        left: true,
        kicked: false,
    };
    const KICKED: PriorStatuses = PriorStatuses {
        left: false,
        kicked: true,
    };
    const BOTH: PriorStatuses = PriorStatuses {
        left: true,
        kicked: true,
    };

    #[test]
    fn test_leave_ladder() {
        use ParticipantStatus::*;
        assert_eq!(resolve_departure(Departure::Leave, NONE), Resolution::Write(Left));
        assert_eq!(resolve_departure(Departure::Leave, LEFT), Resolution::Write(Kicked));
        assert_eq!(resolve_departure(Departure::Leave, KICKED), Resolution::Write(Banned));
        assert_eq!(resolve_departure(Departure::Leave, BOTH), Resolution::Delete);
    }

    #[test]
    fn test_kick_escalates_only_on_prior_kick() {
        use ParticipantStatus::*;
        assert_eq!(resolve_departure(Departure::Kick, NONE), Resolution::Write(Kicked));
        assert_eq!(resolve_departure(Departure::Kick, LEFT), Resolution::Write(Kicked));
        assert_eq!(resolve_departure(Departure::Kick, KICKED), Resolution::Write(Banned));
    }

    #[test]
    fn test_ban_is_always_writable() {
        for prior in [NONE, LEFT, KICKED, BOTH] {
            assert_eq!(
                resolve_departure(Departure::Ban, prior),
                Resolution::Write(ParticipantStatus::Banned)
            );
        }
    }

    #[test]
    fn test_prior_from_statuses_ignores_non_exclusive() {
        let prior = PriorStatuses::from_statuses(["banned", "left", "active"]);
        assert_eq!(prior, LEFT);
    }

    #[test]
    fn test_partition_buckets() {
        let prior = HashMap::from([(2, LEFT), (3, KICKED), (4, BOTH)]);
        let plan = partition_departures(Departure::Leave, &[1, 2, 3, 4], &prior);

        assert_eq!(plan.left, vec![1]);
        assert_eq!(plan.kicked, vec![2]);
        assert_eq!(plan.banned, vec![3]);
        assert_eq!(plan.deleted, vec![4]);
    }

    #[test]
    fn test_exclusive_statuses() {
        assert!(ParticipantStatus::Active.is_exclusive());
        assert!(ParticipantStatus::Left.is_exclusive());
        assert!(ParticipantStatus::Kicked.is_exclusive());
        assert!(!ParticipantStatus::Banned.is_exclusive());
    }
}
