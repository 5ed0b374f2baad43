use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::media_record::{MediaRecord, MediaStatus};
use super::owner::{OwnerType, ProcessingStatus};
use crate::pipeline_error::PipelineErrorCode;

/// Processing state of one attachment, without any content fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaStatusView {
    pub id: Uuid,
    pub status: MediaStatus,
    pub error_code: Option<PipelineErrorCode>,
    pub retry_count: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl From<&MediaRecord> for MediaStatusView {
    fn from(record: &MediaRecord) -> Self {
        Self {
            id: record.id,
            status: record.status,
            error_code: record.error_code,
            retry_count: record.retry_count,
            last_attempt_at: record.last_attempt_at,
            last_error_at: record.last_error_at,
        }
    }
}

/// Media status of one owner, safe to serve unauthenticated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OwnerMediaStatus {
    pub owner_id: Uuid,
    pub owner_type: OwnerType,
    pub processing_status: ProcessingStatus,
    pub audio: Option<MediaStatusView>,
    pub video: Option<MediaStatusView>,
}
