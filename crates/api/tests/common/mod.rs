//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use minebud_api::auth::jwt::{generate_access_token, JwtConfig};
use minebud_api::config::ServerConfig;
use minebud_api::router::build_app_router;
use minebud_api::state::AppState;
use minebud_core::gateway::{GatewayError, LedgerAccount, LedgerGateway, LedgerReading};
use minebud_core::types::{DbId, ResourceTypeId};
use minebud_db::models::user::{UpsertUser, User};
use minebud_db::repositories::UserRepo;
use minebud_events::EventBus;
use minebud_lifecycle::{LifecycleConfig, OperationService};
use sqlx::PgPool;
use tower::ServiceExt;

/// Ledger that reports nothing mined and prices nothing.
pub struct QuietGateway;

#[async_trait]
impl LedgerGateway for QuietGateway {
    async fn fetch_readings(
        &self,
        _account: &LedgerAccount,
    ) -> Result<Vec<LedgerReading>, GatewayError> {
        Ok(Vec::new())
    }

    async fn fetch_best_buy(&self, _type_id: ResourceTypeId) -> Result<Option<f64>, GatewayError> {
        Ok(None)
    }

    async fn fetch_type_name(&self, type_id: ResourceTypeId) -> Result<String, GatewayError> {
        Ok(format!("Type {type_id}"))
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            issuer: "minebud".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Build the full application router over `pool`, with the same middleware
/// stack as production.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let operations = OperationService::new(
        pool.clone(),
        Arc::new(QuietGateway),
        Arc::new(EventBus::default()),
        LifecycleConfig {
            warmup_window_secs: 0,
            ..LifecycleConfig::default()
        },
    );
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        operations,
    };
    build_app_router(state, &config)
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

/// Bearer token for `user_id` signed with the test secret.
pub fn token(user_id: DbId) -> String {
    generate_access_token(user_id, &test_config().jwt).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
