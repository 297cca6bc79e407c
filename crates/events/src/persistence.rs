//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes each [`LifecycleEvent`] to `lifecycle_events`. Events flagged
//! [`persisted`](LifecycleEvent::persisted) are skipped. It runs as a
//! long-lived background task and exits when the bus is dropped.

use tokio::sync::broadcast;
use minebud_core::types::DbId;
use minebud_db::repositories::EventRepo;
use minebud_db::DbPool;

use crate::bus::LifecycleEvent;

/// Background service that persists lifecycle events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<LifecycleEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) if event.persisted => {}
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            operation_id = ?event.operation_id,
                            "Failed to persist lifecycle event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write a single event.
    pub async fn persist(pool: &DbPool, event: &LifecycleEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(
            pool,
            &event.event_type,
            event.operation_id,
            event.actor_user_id,
            &event.payload,
        )
        .await
    }
}
