//! The lifecycle service handle shared by the API and the worker.

use std::sync::Arc;

use minebud_core::error::CoreError;
use minebud_core::gateway::LedgerGateway;
use minebud_core::types::DbId;
use minebud_db::models::operation::Operation;
use minebud_db::models::user::User;
use minebud_db::repositories::{OperationRepo, UserRepo};
use minebud_db::DbPool;
use minebud_events::{EventBus, LifecycleEvent};

use crate::config::LifecycleConfig;
use crate::error::LifecycleResult;

/// Coordinates operation state transitions.
///
/// Cheap to clone; every field is a shared handle.
#[derive(Clone)]
pub struct OperationService {
    pub(crate) pool: DbPool,
    pub(crate) gateway: Arc<dyn LedgerGateway>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) config: LifecycleConfig,
}

impl OperationService {
    pub fn new(
        pool: DbPool,
        gateway: Arc<dyn LedgerGateway>,
        events: Arc<EventBus>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            pool,
            gateway,
            events,
            config,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    // ---- shared lookups ----

    pub(crate) async fn require_user(&self, user_id: DbId) -> LifecycleResult<User> {
        UserRepo::find_by_id(&self.pool, user_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "User",
                id: user_id,
            })
            .map_err(Into::into)
    }

    pub(crate) async fn require_operation(&self, operation_id: DbId) -> LifecycleResult<Operation> {
        OperationRepo::find_by_id(&self.pool, operation_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Operation",
                id: operation_id,
            })
            .map_err(Into::into)
    }

    /// Publish an event for a transition that has already committed.
    pub(crate) fn publish(&self, event: LifecycleEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            operation_id = ?event.operation_id,
            "Publishing lifecycle event"
        );
        self.events.publish(event);
    }
}
