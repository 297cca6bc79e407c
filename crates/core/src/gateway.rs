//! Boundary to the external mining ledger and market data.
//!
//! The lifecycle service only depends on [`LedgerGateway`]; the HTTP adapter
//! lives in `minebud-gateway` and tests substitute an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::ResourceTypeId;

/// One ledger entry: a cumulative quantity for a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReading {
    pub resource_type_id: ResourceTypeId,
    pub quantity: i64,
}

/// Credentials needed to read one user's ledger.
#[derive(Debug, Clone)]
pub struct LedgerAccount {
    /// The user's id in the external system.
    pub external_id: i64,
    /// Bearer token minted by the identity layer, if any.
    pub access_token: Option<String>,
}

/// Errors from the external dependency. Never fatal to the lifecycle: the
/// caller logs them and degrades (skipped capture, price 0).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No ledger credentials for external user {0}")]
    MissingCredentials(i64),

    #[error("Ledger request failed: {0}")]
    Request(String),

    #[error("Ledger API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected ledger response: {0}")]
    Decode(String),
}

/// Read access to the external ledger and market.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Fetch the user's current cumulative ledger entries.
    async fn fetch_readings(&self, account: &LedgerAccount)
        -> Result<Vec<LedgerReading>, GatewayError>;

    /// Best buy price for a resource type at the reference market.
    /// `None` when no buy orders exist.
    async fn fetch_best_buy(&self, type_id: ResourceTypeId) -> Result<Option<f64>, GatewayError>;

    /// Display name for a resource type.
    async fn fetch_type_name(&self, type_id: ResourceTypeId) -> Result<String, GatewayError>;
}
