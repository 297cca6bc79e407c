//! Pilot authentication.

pub mod jwt;
