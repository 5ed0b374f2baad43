//! Feedback-media pipeline worker.
//!
//! [`PipelineOrchestrator`] claims eligible media records of one media type and
//! drives them through transcription, normalization and sentiment before
//! committing to the media record and its owner. [`PipelineScheduler`] runs it
//! periodically, one loop per media type. [`RetryService`] and [`StatusService`]
//! are the out-of-band operations on the same stores.

pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod stage;
pub mod status;

pub use orchestrator::{PipelineOrchestrator, StageServices};
pub use retry::RetryService;
pub use scheduler::PipelineScheduler;
pub use stage::StageOutcome;
pub use status::StatusService;
