//! Shared helpers for lifecycle integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use minebud_core::gateway::{GatewayError, LedgerAccount, LedgerGateway, LedgerReading};
use minebud_core::join_code::generate_join_code;
use minebud_core::types::{DbId, ResourceTypeId};
use minebud_db::models::user::{UpsertUser, User};
use minebud_db::repositories::{EventRepo, UserRepo};
use minebud_events::{EventBus, LifecycleEvent};
use minebud_lifecycle::{LifecycleConfig, OperationService};
use sqlx::PgPool;
use tokio::sync::broadcast;

pub const VELDSPAR: ResourceTypeId = 1230;
pub const SCORDITE: ResourceTypeId = 1228;

/// In-memory ledger and market keyed by external id and type.
#[derive(Default)]
pub struct FakeGateway {
    readings: Mutex<HashMap<i64, HashMap<ResourceTypeId, i64>>>,
    prices: Mutex<HashMap<ResourceTypeId, f64>>,
    failing: AtomicBool,
}

impl FakeGateway {
    pub fn set_reading(&self, external_id: i64, type_id: ResourceTypeId, quantity: i64) {
        self.readings
            .lock()
            .unwrap()
            .entry(external_id)
            .or_default()
            .insert(type_id, quantity);
    }

    pub fn set_price(&self, type_id: ResourceTypeId, price: f64) {
        self.prices.lock().unwrap().insert(type_id, price);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerGateway for FakeGateway {
    async fn fetch_readings(
        &self,
        account: &LedgerAccount,
    ) -> Result<Vec<LedgerReading>, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("connection refused".to_string()));
        }
        let readings = self.readings.lock().unwrap();
        Ok(readings
            .get(&account.external_id)
            .map(|types| {
                types
                    .iter()
                    .map(|(&resource_type_id, &quantity)| LedgerReading {
                        resource_type_id,
                        quantity,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_best_buy(&self, type_id: ResourceTypeId) -> Result<Option<f64>, GatewayError> {
        Ok(self.prices.lock().unwrap().get(&type_id).copied())
    }

    async fn fetch_type_name(&self, type_id: ResourceTypeId) -> Result<String, GatewayError> {
        Ok(format!("Type {type_id}"))
    }
}

pub struct Harness {
    pub service: OperationService,
    pub gateway: Arc<FakeGateway>,
    pub events: broadcast::Receiver<LifecycleEvent>,
}

/// Zero grace and no warm-up unless a test overrides them.
pub fn test_config() -> LifecycleConfig {
    LifecycleConfig {
        grace_period_secs: 0,
        warmup_window_secs: 0,
        ..LifecycleConfig::default()
    }
}

pub fn harness(pool: &PgPool, config: LifecycleConfig) -> Harness {
    let gateway = Arc::new(FakeGateway::default());
    let bus = Arc::new(EventBus::default());
    let events = bus.subscribe();
    let service = OperationService::new(pool.clone(), gateway.clone(), bus, config);
    Harness {
        service,
        gateway,
        events,
    }
}

pub async fn new_user(pool: &PgPool, external_id: i64) -> User {
    UserRepo::upsert(
        pool,
        &UpsertUser {
            external_id,
            display_name: format!("Pilot {external_id}"),
            access_token: Some(format!("token-{external_id}")),
        },
    )
    .await
    .unwrap()
}

/// Event types received so far, in order.
pub fn drain_event_types(rx: &mut broadcast::Receiver<LifecycleEvent>) -> Vec<String> {
    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type);
    }
    types
}

pub async fn participant_status(pool: &PgPool, operation_id: DbId, user_id: DbId) -> Option<String> {
    sqlx::query_scalar(
        "SELECT status FROM operation_participants WHERE operation_id = $1 AND user_id = $2",
    )
    .bind(operation_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .unwrap()
}

pub async fn active_pointer(pool: &PgPool, user_id: DbId) -> Option<DbId> {
    sqlx::query_scalar("SELECT active_operation_id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Give `user` a row with `status` in a fresh ended operation, as if they
/// had taken part in it earlier.
pub async fn seed_history(pool: &PgPool, user: &User, status: &str) {
    let operation_id: DbId = sqlx::query_scalar(
        "INSERT INTO operations (director_id, join_code, title, status, ended_at, termination_type) \
         VALUES ($1, $2, 'Earlier op', 'ended', NOW(), 'manual') \
         RETURNING id",
    )
    .bind(user.id)
    .bind(generate_join_code())
    .fetch_one(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO operation_participants (operation_id, user_id, status, leave_time) \
         VALUES ($1, $2, $3, NOW())",
    )
    .bind(operation_id)
    .bind(user.id)
    .bind(status)
    .execute(pool)
    .await
    .unwrap();
}

/// Event types written to `lifecycle_events` for one operation, oldest first.
pub async fn stored_event_types(pool: &PgPool, operation_id: DbId) -> Vec<String> {
    EventRepo::list_for_operation(pool, operation_id)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.event_type)
        .collect()
}
