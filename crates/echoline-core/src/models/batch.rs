use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::media_record::MediaType;
use crate::pipeline_error::{PipelineError, PipelineErrorCode};

/// A pipeline item that did not reach (or fully reach) `ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemFailure {
    pub id: Uuid,
    pub error_code: PipelineErrorCode,
    pub error_detail: String,
}

impl ItemFailure {
    pub fn from_error(id: Uuid, err: &PipelineError) -> Self {
        Self {
            id,
            error_code: err.code(),
            error_detail: err.detail(),
        }
    }
}

/// Non-blocking stage that fell back instead of failing the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DegradedStage {
    /// Normalization failed; the raw transcript was used as normalized text.
    NormalizationDegraded,
    /// Sentiment scoring failed; sentiment was left null.
    SentimentUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Degradation {
    pub id: Uuid,
    pub stage: DegradedStage,
    pub detail: String,
}

/// Outcome of one orchestrator invocation for one media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchResult {
    pub media_type: MediaType,
    /// Items claimed and attempted in this invocation.
    pub processed: usize,
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<ItemFailure>,
    /// Media committed `ready` but the owner write failed.
    pub partial: Vec<ItemFailure>,
    pub degraded: Vec<Degradation>,
    /// Claimed but not started before the invocation deadline.
    pub released: Vec<Uuid>,
    /// Earlier partial commits whose owner was re-synchronised.
    pub reconciled: Vec<Uuid>,
}

impl BatchResult {
    pub fn empty(media_type: MediaType) -> Self {
        Self {
            media_type,
            processed: 0,
            succeeded: Vec::new(),
            failed: Vec::new(),
            partial: Vec::new(),
            degraded: Vec::new(),
            released: Vec::new(),
            reconciled: Vec::new(),
        }
    }

    pub fn failure_for(&self, id: Uuid) -> Option<&ItemFailure> {
        self.failed.iter().find(|f| f.id == id)
    }
}
