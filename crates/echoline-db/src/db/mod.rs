//! Postgres repositories
//!
//! `media_record` owns the claim primitive and all writes to `media_records`;
//! `owner` maps an owner reference onto its table and mirrors derived fields.

pub mod media_record;
pub mod owner;

pub use media_record::MediaRecordRepository;
pub use owner::OwnerRepository;
