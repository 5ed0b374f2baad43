//! Stand-in for an enrichment stage whose credentials are not configured.
//!
//! Every call fails with [`ServiceError::NotConfigured`], which the pipeline
//! treats like any other degraded stage.

use async_trait::async_trait;
use echoline_core::models::Sentiment;

use crate::error::ServiceError;
use crate::normalization::{Normalization, NormalizationService};
use crate::sentiment::SentimentService;

#[derive(Debug, Clone)]
pub struct DisabledStage {
    reason: String,
}

impl DisabledStage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> ServiceError {
        ServiceError::NotConfigured(self.reason.clone())
    }
}

#[async_trait]
impl NormalizationService for DisabledStage {
    async fn normalize(&self, _text: &str) -> Result<Normalization, ServiceError> {
        Err(self.error())
    }
}

#[async_trait]
impl SentimentService for DisabledStage {
    async fn score(&self, _text: &str) -> Result<Sentiment, ServiceError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_call_reports_not_configured() {
        let stage = DisabledStage::new("ANTHROPIC_API_KEY not set");
        let err = stage.normalize("hola").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotConfigured(ref r) if r.contains("ANTHROPIC")));
        assert!(stage.score("hola").await.is_err());
    }
}
