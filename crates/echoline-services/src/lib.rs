//! Clients for the external services the pipeline depends on.
//!
//! Each stage is a trait (`TranscriptionService`, `NormalizationService`,
//! `SentimentService`) so the orchestrator can be driven by fakes in tests.
//! The production implementations talk to AssemblyAI and the Anthropic
//! Messages API over `reqwest`.

pub mod anthropic;
pub mod disabled;
pub mod error;
pub mod normalization;
pub mod sentiment;
pub mod transcription;

pub use anthropic::AnthropicClient;
pub use disabled::DisabledStage;
pub use error::{ServiceError, TranscriptionError};
pub use normalization::{ClaudeNormalizer, Normalization, NormalizationService};
pub use sentiment::{ClaudeSentimentScorer, SentimentService};
pub use transcription::{AssemblyAiTranscriber, Transcript, TranscriptionService};
