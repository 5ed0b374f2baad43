use thiserror::Error;

/// Failure of the transcription service.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// The media cannot be transcribed in its current encoding.
    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("Transcription failed: {0}")]
    Failed(String),
}

/// Failure of a text service (normalization, sentiment).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Request(err.to_string())
    }
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(err: reqwest::Error) -> Self {
        TranscriptionError::Failed(err.to_string())
    }
}
