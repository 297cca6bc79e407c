//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the lifecycle service
//! and its subscribers (persistence, and anything downstream that reacts to
//! `operation.finalized`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use minebud_core::types::DbId;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Dot-separated names of every lifecycle event.
pub mod event_types {
    pub const OPERATION_CREATED: &str = "operation.created";
    pub const OPERATION_ENDING: &str = "operation.ending";
    /// Administrative override straight to `ended`.
    pub const OPERATION_ENDED: &str = "operation.ended";
    /// Grace period elapsed and the operation was finalized. Published
    /// exactly once per operation; downstream statistics key off it.
    pub const OPERATION_FINALIZED: &str = "operation.finalized";
    pub const PARTICIPANT_JOINED: &str = "participant.joined";
    pub const PARTICIPANT_DEPARTED: &str = "participant.departed";
    pub const DIRECTOR_CHANGED: &str = "director.changed";
}

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// A lifecycle transition that has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// One of [`event_types`].
    pub event_type: String,

    pub operation_id: Option<DbId>,

    /// User who triggered the transition; `None` for sweeps.
    pub actor_user_id: Option<DbId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,

    /// Already written to `lifecycle_events` in the transaction that made
    /// the transition.
    #[serde(skip)]
    pub persisted: bool,
}

impl LifecycleEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            operation_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
            persisted: false,
        }
    }

    pub fn for_operation(mut self, operation_id: DbId) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn mark_persisted(mut self) -> Self {
        self.persisted = true;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Events buffered per subscriber before the slowest one starts lagging.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of committed lifecycle events to every subscriber.
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// A subscriber more than `capacity` events behind loses the oldest ones
    /// and sees `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    /// Hand `event` to every subscriber and return how many there were.
    /// With no subscribers the event is discarded.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(event_type = %event.event_type, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
