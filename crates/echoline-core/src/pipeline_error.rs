//! Pipeline item error types
//!
//! A `PipelineError` carries the machine-readable code that is persisted on a
//! failed media record (`error_code`) together with the upstream error, whose
//! rendered chain becomes `error_detail`. These errors are recorded and reported
//! per item; they never abort a batch.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::constants::MAX_ERROR_DETAIL_CHARS;

/// Codes written to `media_records.error_code` and to batch result entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineErrorCode {
    /// The object storage gateway could not resolve the storage key.
    StorageUnavailable,
    /// The transcription service returned an error or timed out.
    TranscriptionFailed,
    /// The transcription service rejected the media format.
    UnsupportedFormat,
    /// The media record write failed after processing.
    PersistFailed,
    /// The media record was committed but the owner write failed.
    OwnerUpdateFailed,
}

impl PipelineErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineErrorCode::StorageUnavailable => "storage_unavailable",
            PipelineErrorCode::TranscriptionFailed => "transcription_failed",
            PipelineErrorCode::UnsupportedFormat => "unsupported_format",
            PipelineErrorCode::PersistFailed => "persist_failed",
            PipelineErrorCode::OwnerUpdateFailed => "owner_update_failed",
        }
    }

    /// Whether a record failing with this code is picked up again after backoff.
    ///
    /// Only stage-1 codes move a record to `failed`; the other two describe
    /// commit problems and are reported without touching `retry_count`.
    pub fn marks_record_failed(&self) -> bool {
        matches!(
            self,
            PipelineErrorCode::StorageUnavailable
                | PipelineErrorCode::TranscriptionFailed
                | PipelineErrorCode::UnsupportedFormat
        )
    }
}

impl Display for PipelineErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineErrorCode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "storage_unavailable" => Ok(PipelineErrorCode::StorageUnavailable),
            "transcription_failed" => Ok(PipelineErrorCode::TranscriptionFailed),
            "unsupported_format" => Ok(PipelineErrorCode::UnsupportedFormat),
            "persist_failed" => Ok(PipelineErrorCode::PersistFailed),
            "owner_update_failed" => Ok(PipelineErrorCode::OwnerUpdateFailed),
            _ => Err(anyhow::anyhow!("Invalid pipeline error code: {}", s)),
        }
    }
}

/// Failure of one pipeline item.
#[derive(Debug)]
pub struct PipelineError {
    code: PipelineErrorCode,
    inner: anyhow::Error,
}

impl PipelineError {
    pub fn new(code: PipelineErrorCode, err: impl Into<anyhow::Error>) -> Self {
        Self {
            code,
            inner: err.into(),
        }
    }

    pub fn storage_unavailable(err: impl Into<anyhow::Error>) -> Self {
        Self::new(PipelineErrorCode::StorageUnavailable, err)
    }

    pub fn transcription_failed(err: impl Into<anyhow::Error>) -> Self {
        Self::new(PipelineErrorCode::TranscriptionFailed, err)
    }

    pub fn unsupported_format(err: impl Into<anyhow::Error>) -> Self {
        Self::new(PipelineErrorCode::UnsupportedFormat, err)
    }

    pub fn code(&self) -> PipelineErrorCode {
        self.code
    }

    /// Upstream message with its context chain, bounded for storage.
    pub fn detail(&self) -> String {
        let rendered = format!("{:#}", self.inner);
        if rendered.chars().count() <= MAX_ERROR_DETAIL_CHARS {
            rendered
        } else {
            rendered.chars().take(MAX_ERROR_DETAIL_CHARS).collect()
        }
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.inner)
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Extension trait for tagging a result with a pipeline error code.
pub trait PipelineResultExt<T> {
    fn with_code(self, code: PipelineErrorCode) -> Result<T, PipelineError>;
}

impl<T, E: Into<anyhow::Error>> PipelineResultExt<T> for Result<T, E> {
    fn with_code(self, code: PipelineErrorCode) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(code, e))
    }
}
