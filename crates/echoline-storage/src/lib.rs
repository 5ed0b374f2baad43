//! Echoline Storage Library
//!
//! Read access to the object storage that holds uploaded feedback media. The
//! pipeline resolves a record's `(storage_provider, storage_key)` through the
//! [`StorageGateway`] to fetch bytes for transcription, and the API streams the
//! same bytes through it for authenticated downloads.
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod gateway;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use echoline_core::StorageBackend;
pub use factory::{create_gateway, create_storage};
pub use gateway::StorageGateway;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
