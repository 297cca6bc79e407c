//! Director succession when the director leaves.

use crate::types::{DbId, Timestamp};

/// Another active participant who could take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub user_id: DbId,
    pub is_admin: bool,
    pub join_time: Timestamp,
}

/// Outcome of a director departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Succession {
    /// Hand the operation to an existing admin.
    PromoteAdmin(DbId),
    /// No admin remains; make this member admin and director.
    PromoteMember(DbId),
    /// Nobody else is active; the operation ends.
    EndOperation,
}

/// Choose the next director from the remaining active participants: the
/// earliest-joined admin, else the earliest-joined member. Ties on
/// `join_time` fall back to the lower user id.
pub fn choose_successor(candidates: &[Candidate]) -> Succession {
    let earliest = |admin: bool| {
        candidates
            .iter()
            .filter(|c| c.is_admin == admin)
            .min_by_key(|c| (c.join_time, c.user_id))
            .map(|c| c.user_id)
    };

    if let Some(user_id) = earliest(true) {
        Succession::PromoteAdmin(user_id)
    } else if let Some(user_id) = earliest(false) {
        Succession::PromoteMember(user_id)
    } else {
        Succession::EndOperation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candidate(user_id: DbId, is_admin: bool, joined_secs: i64) -> Candidate {
        Candidate {
            user_id,
            is_admin,
            join_time: Utc.timestamp_opt(1_700_000_000 + joined_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_admin_preferred_over_earlier_member() {
        let result = choose_successor(&[candidate(10, false, 0), candidate(20, true, 50)]);
        assert_eq!(result, Succession::PromoteAdmin(20));
    }

    #[test]
    fn test_earliest_admin_wins() {
        let result = choose_successor(&[candidate(30, true, 90), candidate(20, true, 10)]);
        assert_eq!(result, Succession::PromoteAdmin(20));
    }

    #[test]
    fn test_member_promoted_when_no_admin() {
        let result = choose_successor(&[candidate(40, false, 5), candidate(41, false, 1)]);
        assert_eq!(result, Succession::PromoteMember(41));
    }

    #[test]
    fn test_empty_ends_operation() {
        assert_eq!(choose_successor(&[]), Succession::EndOperation);
    }
}
