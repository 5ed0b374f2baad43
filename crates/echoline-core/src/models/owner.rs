use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of record that owns a media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "owner_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    SurveyResponse,
    Feedback,
}

impl Display for OwnerType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OwnerType::SurveyResponse => write!(f, "survey_response"),
            OwnerType::Feedback => write!(f, "feedback"),
        }
    }
}

impl FromStr for OwnerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "survey_response" => Ok(OwnerType::SurveyResponse),
            "feedback" => Ok(OwnerType::Feedback),
            _ => Err(anyhow::anyhow!("Invalid owner type: {}", s)),
        }
    }
}

/// Reference from a media record to the record it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    SurveyResponse(Uuid),
    Feedback(Uuid),
}

impl OwnerRef {
    pub fn new(owner_type: OwnerType, id: Uuid) -> Self {
        match owner_type {
            OwnerType::SurveyResponse => OwnerRef::SurveyResponse(id),
            OwnerType::Feedback => OwnerRef::Feedback(id),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            OwnerRef::SurveyResponse(id) | OwnerRef::Feedback(id) => *id,
        }
    }

    pub fn owner_type(&self) -> OwnerType {
        match self {
            OwnerRef::SurveyResponse(_) => OwnerType::SurveyResponse,
            OwnerRef::Feedback(_) => OwnerType::Feedback,
        }
    }
}

impl Display for OwnerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.owner_type(), self.id())
    }
}

/// Owner-level mirror of media processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "processing_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Processing,
    Ready,
}

impl Display for ProcessingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Ready => write!(f, "ready"),
        }
    }
}

/// The pipeline-visible part of an owner record.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerSnapshot {
    pub owner: OwnerRef,
    pub processing_status: ProcessingStatus,
}
