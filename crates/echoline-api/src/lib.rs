//! Echoline API Library
//!
//! HTTP surface of the feedback-media pipeline: the scheduler trigger, manual
//! retry, the PII-free status query, authenticated downloads and health checks.

mod api_doc;
pub mod auth;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
