//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct matching the
//! database row, plus the `Deserialize` DTOs used to create rows.

pub mod ban;
pub mod event;
pub mod operation;
pub mod participant;
pub mod price;
pub mod snapshot;
pub mod user;
