//! Echoline Database Layer
//!
//! Postgres repositories for media records and their owners, plus the store
//! traits the pipeline and API depend on.

pub mod db;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod store;

pub use db::{MediaRecordRepository, OwnerRepository};
pub use store::{MediaRecordStore, OwnerStore, PersistOutcome};
