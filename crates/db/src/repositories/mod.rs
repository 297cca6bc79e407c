//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` for standalone reads, or a `Transaction` for writes
//! that must commit together.

pub mod ban_repo;
pub mod event_repo;
pub mod operation_repo;
pub mod participant_repo;
pub mod price_repo;
pub mod snapshot_repo;
pub mod user_repo;

pub use ban_repo::BanRepo;
pub use event_repo::EventRepo;
pub use operation_repo::OperationRepo;
pub use participant_repo::{DepartureOutcome, ParticipantRepo};
pub use price_repo::PriceRepo;
pub use snapshot_repo::SnapshotRepo;
pub use user_repo::UserRepo;
