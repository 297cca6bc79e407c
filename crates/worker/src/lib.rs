//! Background reconciliation for mining operations.
//!
//! Runs the periodic sweeps that finalize operations whose grace period has
//! lapsed, end idle operations and keep reference prices fresh.

pub mod config;
pub mod sweeps;

pub use config::WorkerConfig;
pub use sweeps::{Sweep, SweepLoop};
