//! Snapshot-to-delta computation.
//!
//! The external ledger reports absolute, cumulative quantities. An operation
//! stores a `start` capture per participant as the baseline, then `update`
//! and `end` captures over time. What a user mined during the operation is
//! the latest capture minus the baseline, per resource type.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::error::CoreError;
use crate::gateway::LedgerReading;
use crate::types::{DbId, ResourceTypeId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Operations younger than this may show no deltas until enough captures
/// have landed.
pub const WARMUP_WINDOW_SECS: i64 = 120;

/// Distinct `update` captures required to leave warm-up early.
pub const MIN_WARMUP_UPDATES: i64 = 2;

pub const SNAPSHOT_START: &str = "start";
pub const SNAPSHOT_UPDATE: &str = "update";
pub const SNAPSHOT_END: &str = "end";

/// Which point in the operation a capture was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Start,
    Update,
    End,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => SNAPSHOT_START,
            Self::Update => SNAPSHOT_UPDATE,
            Self::End => SNAPSHOT_END,
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            SNAPSHOT_START => Ok(Self::Start),
            SNAPSHOT_UPDATE => Ok(Self::Update),
            SNAPSHOT_END => Ok(Self::End),
            other => Err(CoreError::Internal(format!(
                "Unknown snapshot kind: '{other}'"
            ))),
        }
    }
}

/// One stored reading, reduced to what the computation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRow {
    pub user_id: DbId,
    pub resource_type_id: ResourceTypeId,
    pub quantity: i64,
    pub kind: SnapshotKind,
    /// Monotonic capture sequence; later captures have larger values.
    pub sequence: DbId,
}

/// Quantity mined since the baseline and its value at the current price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinedDelta {
    pub quantity: i64,
    pub value: f64,
}

/// `user -> resource type -> delta`, ordered for stable output.
pub type DeltaMap = BTreeMap<DbId, BTreeMap<ResourceTypeId, MinedDelta>>;

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Compute per-user, per-type deltas.
///
/// The baseline is the `start` quantity (0 if absent). The current value is
/// the `update`/`end` row with the highest sequence. Non-positive deltas are
/// dropped. Unknown prices value the delta at 0.
pub fn compute_deltas(rows: &[SnapshotRow], prices: &HashMap<ResourceTypeId, f64>) -> DeltaMap {
    let mut baseline: HashMap<(DbId, ResourceTypeId), i64> = HashMap::new();
    let mut latest: HashMap<(DbId, ResourceTypeId), (DbId, i64)> = HashMap::new();

    for row in rows {
        let key = (row.user_id, row.resource_type_id);
        match row.kind {
            SnapshotKind::Start => {
                baseline.entry(key).or_insert(row.quantity);
            }
            SnapshotKind::Update | SnapshotKind::End => {
                let entry = latest.entry(key).or_insert((row.sequence, row.quantity));
                if row.sequence > entry.0 {
                    *entry = (row.sequence, row.quantity);
                }
            }
        }
    }

    let mut deltas = DeltaMap::new();
    for ((user_id, type_id), (_, current)) in latest {
        let quantity = current - baseline.get(&(user_id, type_id)).copied().unwrap_or(0);
        if quantity <= 0 {
            continue;
        }
        let price = prices.get(&type_id).copied().unwrap_or(0.0);
        deltas.entry(user_id).or_default().insert(
            type_id,
            MinedDelta {
                quantity,
                value: quantity as f64 * price,
            },
        );
    }
    deltas
}

/// Whether the freshness guard hides deltas: the operation is still inside
/// the warm-up window and fewer than [`MIN_WARMUP_UPDATES`] qualifying
/// update captures exist.
pub fn suppress_for_warmup(
    created_at: Timestamp,
    now: Timestamp,
    qualifying_updates: i64,
    window_secs: i64,
) -> bool {
    (now - created_at).num_seconds() < window_secs && qualifying_updates < MIN_WARMUP_UPDATES
}

/// Sum of every delta's value.
pub fn total_value(deltas: &DeltaMap) -> f64 {
    deltas
        .values()
        .flat_map(|types| types.values())
        .map(|d| d.value)
        .sum()
}

/// Sum of one user's delta values.
pub fn user_value(deltas: &DeltaMap, user_id: DbId) -> f64 {
    deltas
        .get(&user_id)
        .map(|types| types.values().map(|d| d.value).sum())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Collapse raw ledger entries into one cumulative quantity per type.
pub fn aggregate_readings(readings: &[LedgerReading]) -> BTreeMap<ResourceTypeId, i64> {
    let mut totals = BTreeMap::new();
    for reading in readings {
        *totals.entry(reading.resource_type_id).or_insert(0) += reading.quantity;
    }
    totals
}

/// Whether a fresh reading differs from the previous one for any type.
/// Types missing from `previous` count as zero.
pub fn reading_changed(
    previous: &HashMap<ResourceTypeId, i64>,
    current: &BTreeMap<ResourceTypeId, i64>,
) -> bool {
    current
        .iter()
        .any(|(type_id, qty)| previous.get(type_id).copied().unwrap_or(0) != *qty)
}
