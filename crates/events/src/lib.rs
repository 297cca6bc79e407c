//! Lifecycle event bus and durable event log.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`LifecycleEvent`]: the envelope published on every lifecycle transition.
//! - [`EventPersistence`]: background service that writes events to the
//!   `lifecycle_events` table, except the terminal ones the lifecycle
//!   service already wrote in the transition's own transaction.

pub mod bus;
pub mod persistence;

pub use bus::{event_types, EventBus, LifecycleEvent};
pub use persistence::EventPersistence;
