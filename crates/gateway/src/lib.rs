//! HTTP adapter for the external mining ledger and market API.
//!
//! Implements [`minebud_core::gateway::LedgerGateway`] over `reqwest`.

pub mod api;
pub mod config;

pub use api::LedgerApi;
pub use config::GatewayConfig;
