use async_trait::async_trait;
use serde::Deserialize;

use echoline_core::models::Sentiment;

use crate::anthropic::{extract_json_object, AnthropicClient};
use crate::error::ServiceError;

#[async_trait]
pub trait SentimentService: Send + Sync {
    async fn score(&self, text: &str) -> Result<Sentiment, ServiceError>;
}

const SYSTEM_PROMPT: &str = "You classify the overall sentiment of consumer feedback. \
    Reply with only a JSON object {\"sentiment\": \"positive\" | \"neutral\" | \"negative\" | \"mixed\"}.";

/// Sentiment scoring with a Claude model.
pub struct ClaudeSentimentScorer {
    client: AnthropicClient,
}

impl ClaudeSentimentScorer {
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SentimentReply {
    sentiment: String,
}

#[async_trait]
impl SentimentService for ClaudeSentimentScorer {
    #[tracing::instrument(skip(self, text), fields(text_length = text.len()))]
    async fn score(&self, text: &str) -> Result<Sentiment, ServiceError> {
        let reply = self.client.complete(SYSTEM_PROMPT, text).await?;
        parse_sentiment(&reply)
    }
}

fn parse_sentiment(reply: &str) -> Result<Sentiment, ServiceError> {
    let label = match extract_json_object(reply) {
        Some(json) => {
            serde_json::from_str::<SentimentReply>(json)
                .map_err(|e| ServiceError::InvalidResponse(format!("sentiment: {}", e)))?
                .sentiment
        }
        // Bare label replies
        None => reply.to_string(),
    };

    label
        .parse::<Sentiment>()
        .map_err(|_| ServiceError::InvalidResponse(format!("unknown sentiment label '{}'", label)))
}
