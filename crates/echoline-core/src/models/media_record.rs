use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use super::owner::{OwnerRef, OwnerType};
use super::sentiment::Sentiment;
use crate::pipeline_error::PipelineErrorCode;
use crate::storage_types::StorageBackend;

/// Kind of attachment. Audio and video are scheduled as separate batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
}

impl MediaType {
    pub const ALL: [MediaType; 2] = [MediaType::Audio, MediaType::Video];
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaType::Audio => write!(f, "audio"),
            MediaType::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(MediaType::Audio),
            "video" => Ok(MediaType::Video),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// Processing state of a media record.
///
/// There is no in-flight variant: a claimed record keeps its status and holds a
/// lease (`claim_expires_at`) plus the `claim_token` of the claim that owns it
/// until its result is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "media_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Uploaded,
    Ready,
    Failed,
    Deleted,
}

impl Display for MediaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaStatus::Uploaded => write!(f, "uploaded"),
            MediaStatus::Ready => write!(f, "ready"),
            MediaStatus::Failed => write!(f, "failed"),
            MediaStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl FromStr for MediaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(MediaStatus::Uploaded),
            "ready" => Ok(MediaStatus::Ready),
            "failed" => Ok(MediaStatus::Failed),
            "deleted" => Ok(MediaStatus::Deleted),
            _ => Err(anyhow::anyhow!("Invalid media status: {}", s)),
        }
    }
}

/// Outputs of the three pipeline stages, written to the media record and
/// mirrored onto its owner on commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub transcript_text: String,
    pub transcript_confidence: Option<f64>,
    pub original_language: Option<String>,
    pub language_confidence: Option<f64>,
    pub normalized_text: String,
    pub normalized_language: Option<String>,
    pub sentiment: Option<Sentiment>,
}

/// One uploaded audio or video attachment and its processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: Uuid,
    pub owner_type: OwnerType,
    pub owner_id: Uuid,
    pub media_type: MediaType,
    pub storage_provider: StorageBackend,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: Option<i64>,
    pub duration_ms: Option<i64>,
    pub status: MediaStatus,
    pub transcript_text: Option<String>,
    pub transcript_confidence: Option<f64>,
    pub original_language: Option<String>,
    pub language_confidence: Option<f64>,
    pub normalized_text: Option<String>,
    pub normalized_language: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub error_code: Option<PipelineErrorCode>,
    pub error_detail: Option<String>,
    pub retry_count: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub claim_token: Option<Uuid>,
    pub owner_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for MediaRecord {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let sentiment = row
            .get::<Option<String>, _>("sentiment")
            .map(|s| s.parse::<Sentiment>())
            .transpose()
            .map_err(|e| sqlx::Error::Decode(format!("Failed to parse sentiment: {}", e).into()))?;
        let error_code = row
            .get::<Option<String>, _>("error_code")
            .map(|s| s.parse::<PipelineErrorCode>())
            .transpose()
            .map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse error_code: {}", e).into())
            })?;

        Ok(MediaRecord {
            id: row.get("id"),
            owner_type: row.get("owner_type"),
            owner_id: row.get("owner_id"),
            media_type: row.get("media_type"),
            storage_provider: row.get("storage_provider"),
            storage_key: row.get("storage_key"),
            mime_type: row.get("mime_type"),
            size_bytes: row.get("size_bytes"),
            duration_ms: row.get("duration_ms"),
            status: row.get("status"),
            transcript_text: row.get("transcript_text"),
            transcript_confidence: row.get("transcript_confidence"),
            original_language: row.get("original_language"),
            language_confidence: row.get("language_confidence"),
            normalized_text: row.get("normalized_text"),
            normalized_language: row.get("normalized_language"),
            sentiment,
            error_code,
            error_detail: row.get("error_detail"),
            retry_count: row.get("retry_count"),
            last_attempt_at: row.get("last_attempt_at"),
            last_error_at: row.get("last_error_at"),
            claim_expires_at: row.get("claim_expires_at"),
            claim_token: row.get("claim_token"),
            owner_synced_at: row.get("owner_synced_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl MediaRecord {
    /// A freshly ingested record, as the upload flow creates it.
    pub fn uploaded(
        owner: OwnerRef,
        media_type: MediaType,
        storage_provider: StorageBackend,
        storage_key: impl Into<String>,
        mime_type: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        MediaRecord {
            id: Uuid::new_v4(),
            owner_type: owner.owner_type(),
            owner_id: owner.id(),
            media_type,
            storage_provider,
            storage_key: storage_key.into(),
            mime_type: mime_type.into(),
            size_bytes: None,
            duration_ms: None,
            status: MediaStatus::Uploaded,
            transcript_text: None,
            transcript_confidence: None,
            original_language: None,
            language_confidence: None,
            normalized_text: None,
            normalized_language: None,
            sentiment: None,
            error_code: None,
            error_detail: None,
            retry_count: 0,
            last_attempt_at: None,
            last_error_at: None,
            claim_expires_at: None,
            claim_token: None,
            owner_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(self.owner_type, self.owner_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.status == MediaStatus::Deleted
    }

    /// Committed stage outputs, present only once the record is `ready`.
    pub fn derived_fields(&self) -> Option<DerivedFields> {
        if self.status != MediaStatus::Ready {
            return None;
        }
        let transcript_text = self.transcript_text.clone()?;
        Some(DerivedFields {
            normalized_text: self
                .normalized_text
                .clone()
                .unwrap_or_else(|| transcript_text.clone()),
            normalized_language: self
                .normalized_language
                .clone()
                .or_else(|| self.original_language.clone()),
            transcript_text,
            transcript_confidence: self.transcript_confidence,
            original_language: self.original_language.clone(),
            language_confidence: self.language_confidence,
            sentiment: self.sentiment,
        })
    }

    /// Status-dependent field invariants; returns the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.status {
            MediaStatus::Ready if self.transcript_text.is_none() => {
                Err(format!("media {} is ready without a transcript", self.id))
            }
            MediaStatus::Failed if self.error_code.is_none() => {
                Err(format!("media {} is failed without an error code", self.id))
            }
            MediaStatus::Failed if self.retry_count < 1 => {
                Err(format!("media {} is failed with retry_count 0", self.id))
            }
            _ if self.retry_count < 0 => Err(format!("media {} has negative retry_count", self.id)),
            _ => Ok(()),
        }
    }
}
