//! Operation lifecycle orchestration.
//!
//! [`OperationService`] ties the pure rules in `minebud-core` to the
//! repositories in `minebud-db`. Every transition is one committed
//! transaction guarded by conditioned writes, so the interactive path, the
//! status-poll path and the periodic sweeps can all race safely.

pub mod actions;
pub mod capture;
pub mod config;
pub mod error;
pub mod operations;
pub mod pricing;
pub mod reconciler;
pub mod service;

pub use actions::ActionOutcome;
pub use capture::CaptureOutcome;
pub use config::LifecycleConfig;
pub use error::{LifecycleError, LifecycleResult};
pub use operations::{MiningData, OperationStatusView, ParticipantSummary};
pub use pricing::PriceRefreshReport;
pub use reconciler::SweepReport;
pub use service::OperationService;
