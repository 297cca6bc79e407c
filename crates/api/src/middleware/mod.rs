//! Axum extractors that run before handlers.

pub mod auth;
