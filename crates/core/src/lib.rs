//! Domain rules for mining operations.
//!
//! Everything in this crate is pure: status vocabularies, the escalation
//! ladder, permission checks, director succession, and the snapshot delta
//! computation. Persistence lives in `minebud-db`; orchestration lives in
//! `minebud-lifecycle`.

pub mod delta;
pub mod error;
pub mod gateway;
pub mod join_code;
pub mod ledger;
pub mod operation;
pub mod permissions;
pub mod succession;
pub mod types;
