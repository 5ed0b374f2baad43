//! Language normalization stage: translate a transcript into the target
//! language and clean up disfluencies.

use async_trait::async_trait;
use serde::Deserialize;

use crate::anthropic::{extract_json_object, AnthropicClient};
use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Normalization {
    pub normalized_text: String,
    pub normalized_language: Option<String>,
    pub original_language: Option<String>,
}

#[async_trait]
pub trait NormalizationService: Send + Sync {
    async fn normalize(&self, text: &str) -> Result<Normalization, ServiceError>;
}

pub struct ClaudeNormalizer {
    client: AnthropicClient,
    target_language: String,
}

impl ClaudeNormalizer {
    pub fn new(client: AnthropicClient, target_language: impl Into<String>) -> Self {
        Self {
            client,
            target_language: target_language.into(),
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You normalize transcripts of consumer feedback. Translate the transcript into \
             the language with ISO 639-1 code \"{target}\" (keep it as is if it already is), \
             remove filler words and fix obvious transcription errors without changing the \
             meaning. Reply with only a JSON object: \
             {{\"normalized_text\": string, \"normalized_language\": \"{target}\", \
             \"original_language\": ISO 639-1 code of the input}}.",
            target = self.target_language
        )
    }
}

#[async_trait]
impl NormalizationService for ClaudeNormalizer {
    #[tracing::instrument(skip(self, text), fields(text_length = text.len(), model = %self.client.model()))]
    async fn normalize(&self, text: &str) -> Result<Normalization, ServiceError> {
        let reply = self.client.complete(&self.system_prompt(), text).await?;
        parse_normalization(&reply)
    }
}

fn parse_normalization(reply: &str) -> Result<Normalization, ServiceError> {
    let json = extract_json_object(reply)
        .ok_or_else(|| ServiceError::InvalidResponse("no JSON object in reply".to_string()))?;
    let parsed: Normalization = serde_json::from_str(json)
        .map_err(|e| ServiceError::InvalidResponse(format!("normalization: {}", e)))?;

    if parsed.normalized_text.trim().is_empty() {
        return Err(ServiceError::InvalidResponse(
            "normalized_text is empty".to_string(),
        ));
    }
    Ok(parsed)
}
