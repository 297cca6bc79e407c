//! Operation status vocabulary, lifecycle timing constants, and read-time
//! countdown helpers.
//!
//! Only the deadline (`ended_at`) is persisted. Remaining seconds and the
//! display phase are derived from it at read time so that every reader sees
//! the same countdown regardless of which trigger moved the operation.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// An active operation with no ledger movement for this long is ended.
pub const INACTIVITY_THRESHOLD_SECS: i64 = 2 * 60 * 60;

/// Delay between an end request and the actual finalization.
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 5;

/// How long after finalization an operation is reported as `syncing`.
pub const SYNC_WINDOW_SECS: i64 = 10 * 60;

/// Maximum operation title length in characters.
pub const TITLE_MAX_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Status constants
// ---------------------------------------------------------------------------

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_ENDING: &str = "ending";
pub const STATUS_ENDED: &str = "ended";

pub const TERMINATION_MANUAL: &str = "manual";
pub const TERMINATION_INACTIVITY: &str = "inactivity";

/// Lifecycle status of an operation. Transitions only move forward:
/// `active -> ending -> ended`, or straight to `ended` on override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Active,
    Ending,
    Ended,
}

impl OperationStatus {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => STATUS_ACTIVE,
            Self::Ending => STATUS_ENDING,
            Self::Ended => STATUS_ENDED,
        }
    }

    /// Parse from a string, returning an error for unknown statuses.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            STATUS_ACTIVE => Ok(Self::Active),
            STATUS_ENDING => Ok(Self::Ending),
            STATUS_ENDED => Ok(Self::Ended),
            other => Err(CoreError::Internal(format!(
                "Unknown operation status: '{other}'"
            ))),
        }
    }
}

/// Why an operation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationType {
    Manual,
    Inactivity,
}

impl TerminationType {
    /// Return the database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => TERMINATION_MANUAL,
            Self::Inactivity => TERMINATION_INACTIVITY,
        }
    }

    /// Parse from a string, returning an error for unknown types.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            TERMINATION_MANUAL => Ok(Self::Manual),
            TERMINATION_INACTIVITY => Ok(Self::Inactivity),
            other => Err(CoreError::Internal(format!(
                "Unknown termination type: '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Countdown / phase
// ---------------------------------------------------------------------------

/// Seconds remaining until `deadline`, clamped at zero.
pub fn countdown_secs(deadline: Timestamp, now: Timestamp) -> i64 {
    (deadline - now).num_seconds().max(0)
}

/// Presentation phase derived from the stored status and deadline.
///
/// `Syncing` is never persisted: it is an `ended` operation still inside the
/// sync window after its end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum DisplayPhase {
    Active,
    Ending { countdown_secs: i64 },
    Syncing { countdown_secs: i64 },
    Ended,
}

/// Compute the display phase for an operation.
pub fn display_phase(
    status: OperationStatus,
    ended_at: Option<Timestamp>,
    now: Timestamp,
) -> DisplayPhase {
    match (status, ended_at) {
        (OperationStatus::Active, _) => DisplayPhase::Active,
        (OperationStatus::Ending, Some(deadline)) => DisplayPhase::Ending {
            countdown_secs: countdown_secs(deadline, now),
        },
        (OperationStatus::Ending, None) => DisplayPhase::Ending { countdown_secs: 0 },
        (OperationStatus::Ended, Some(ended)) => {
            let sync_deadline = ended + chrono::Duration::seconds(SYNC_WINDOW_SECS);
            if now < sync_deadline {
                DisplayPhase::Syncing {
                    countdown_secs: countdown_secs(sync_deadline, now),
                }
            } else {
                DisplayPhase::Ended
            }
        }
        (OperationStatus::Ended, None) => DisplayPhase::Ended,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate an operation title: non-blank and at most [`TITLE_MAX_LEN`] chars.
pub fn validate_title(title: &str) -> Result<(), String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Operation title must not be empty".to_string());
    }
    if trimmed.chars().count() > TITLE_MAX_LEN {
        return Err(format!(
            "Operation title must be at most {TITLE_MAX_LEN} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_status_round_trips_through_db_strings() {
        for status in [
            OperationStatus::Active,
            OperationStatus::Ending,
            OperationStatus::Ended,
        ] {
            assert_eq!(OperationStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(OperationStatus::from_str("syncing").is_err());
    }

    #[test]
    fn test_countdown_clamps_at_zero() {
        assert_eq!(countdown_secs(at(5), at(0)), 5);
        assert_eq!(countdown_secs(at(5), at(9)), 0);
    }

    #[test]
    fn test_display_phase_ending_counts_down() {
        let phase = display_phase(OperationStatus::Ending, Some(at(5)), at(2));
        assert_eq!(phase, DisplayPhase::Ending { countdown_secs: 3 });
    }

    #[test]
    fn test_display_phase_syncing_within_window() {
        let ended = at(0);
        let phase = display_phase(OperationStatus::Ended, Some(ended), ended + Duration::seconds(60));
        assert_eq!(
            phase,
            DisplayPhase::Syncing {
                countdown_secs: SYNC_WINDOW_SECS - 60
            }
        );

        let later = ended + Duration::seconds(SYNC_WINDOW_SECS);
        assert_eq!(
            display_phase(OperationStatus::Ended, Some(ended), later),
            DisplayPhase::Ended
        );
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Belt sweep").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(TITLE_MAX_LEN + 1)).is_err());
        assert!(validate_title(&"x".repeat(TITLE_MAX_LEN)).is_ok());
    }
}
