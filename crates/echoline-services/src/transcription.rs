//! Speech-to-text stage backed by AssemblyAI.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;
use tokio::time::sleep;

use echoline_core::models::MediaType;

use crate::error::TranscriptionError;

/// Result of a successful transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// 0.0 to 1.0
    pub confidence: Option<f64>,
    pub language: Option<String>,
    /// 0.0 to 1.0
    pub language_confidence: Option<f64>,
}

#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(
        &self,
        media: Bytes,
        media_type: MediaType,
        mime_type: &str,
    ) -> Result<Transcript, TranscriptionError>;
}

/// AssemblyAI client: upload, start a job with language detection, poll.
pub struct AssemblyAiTranscriber {
    http_client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl Debug for AssemblyAiTranscriber {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AssemblyAiTranscriber")
            .field("base_url", &self.base_url)
            .finish()
    }
}

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_MAX_POLLS: u32 = 200;

impl AssemblyAiTranscriber {
    /// `base_url` is the API root, e.g. "https://api.assemblyai.com".
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                TranscriptionError::Failed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn upload(&self, media: Bytes) -> Result<String, TranscriptionError> {
        let response = self
            .http_client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(media)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranscriptionError::Failed(format!(
                "AssemblyAI upload failed: {} - {}",
                status, error_text
            )));
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Failed(format!("Invalid upload response: {}", e)))?;
        Ok(upload.upload_url)
    }

    async fn start(&self, upload_url: &str) -> Result<String, TranscriptionError> {
        let response = self
            .http_client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&json!({
                "audio_url": upload_url,
                "language_detection": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranscriptionError::Failed(format!(
                "AssemblyAI transcription start failed: {} - {}",
                status, error_text
            )));
        }

        let job: TranscriptJob = response
            .json()
            .await
            .map_err(|e| TranscriptionError::Failed(format!("Invalid start response: {}", e)))?;
        Ok(job.id)
    }

    async fn poll(&self, transcript_id: &str) -> Result<TranscriptStatus, TranscriptionError> {
        let url = format!("{}/v2/transcript/{}", self.base_url, transcript_id);

        for _ in 0..self.max_polls {
            let response = self
                .http_client
                .get(&url)
                .header("authorization", &self.api_key)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(TranscriptionError::Failed(format!(
                    "AssemblyAI status check failed: {} - {}",
                    status, error_text
                )));
            }

            let transcript: TranscriptStatus = response.json().await.map_err(|e| {
                TranscriptionError::Failed(format!("Invalid transcript status: {}", e))
            })?;

            match transcript.status.as_str() {
                "completed" => return Ok(transcript),
                "error" => {
                    let message = transcript
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string());
                    return Err(classify_job_error(message));
                }
                // queued | processing
                _ => sleep(self.poll_interval).await,
            }
        }

        Err(TranscriptionError::Failed(format!(
            "Transcription {} still pending after {} polls",
            transcript_id, self.max_polls
        )))
    }
}

#[async_trait]
impl TranscriptionService for AssemblyAiTranscriber {
    #[tracing::instrument(skip(self, media), fields(size_bytes = media.len()))]
    async fn transcribe(
        &self,
        media: Bytes,
        media_type: MediaType,
        mime_type: &str,
    ) -> Result<Transcript, TranscriptionError> {
        check_format(media_type, mime_type)?;
        if media.is_empty() {
            return Err(TranscriptionError::UnsupportedFormat(
                "media file is empty".to_string(),
            ));
        }

        let upload_url = self.upload(media).await?;
        let transcript_id = self.start(&upload_url).await?;
        tracing::debug!(transcript_id = %transcript_id, "Transcription started, polling");

        let result = self.poll(&transcript_id).await?;
        let text = result.text.unwrap_or_default();

        tracing::info!(
            transcript_id = %transcript_id,
            text_length = text.len(),
            language = result.language_code.as_deref().unwrap_or("unknown"),
            "Transcription completed"
        );

        Ok(Transcript {
            text,
            confidence: result.confidence,
            language: result.language_code,
            language_confidence: result.language_confidence,
        })
    }
}

/// Reject containers the upstream cannot decode before spending an upload.
fn check_format(media_type: MediaType, mime_type: &str) -> Result<(), TranscriptionError> {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let accepted = match media_type {
        MediaType::Audio => essence.starts_with("audio/"),
        MediaType::Video => essence.starts_with("video/"),
    };

    if accepted {
        Ok(())
    } else {
        Err(TranscriptionError::UnsupportedFormat(format!(
            "{} is not a supported {} format",
            mime_type, media_type
        )))
    }
}

fn classify_job_error(message: String) -> TranscriptionError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("does not appear to contain audio")
        || lower.contains("unsupported")
        || lower.contains("not supported")
        || lower.contains("could not be decoded")
    {
        TranscriptionError::UnsupportedFormat(message)
    } else {
        TranscriptionError::Failed(message)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptJob {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptStatus {
    status: String,
    text: Option<String>,
    confidence: Option<f64>,
    language_code: Option<String>,
    language_confidence: Option<f64>,
    error: Option<String>,
}
