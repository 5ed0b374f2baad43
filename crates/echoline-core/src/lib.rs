//! Echoline Core Library
//!
//! Domain models, error types, retry policy and configuration shared by every
//! Echoline component: the record stores, the pipeline worker and the HTTP API.

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod pipeline_error;
pub mod storage_types;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BaseConfig, Config, PipelineConfig, PipelineServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use pipeline_error::{PipelineError, PipelineErrorCode, PipelineResultExt};
pub use storage_types::StorageBackend;
