//! Service and repository wiring

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use echoline_core::{Config, SystemClock};
use echoline_db::{MediaRecordRepository, MediaRecordStore, OwnerRepository, OwnerStore};
use echoline_services::{
    AnthropicClient, AssemblyAiTranscriber, ClaudeNormalizer, ClaudeSentimentScorer,
    DisabledStage, NormalizationService, SentimentService,
};
use echoline_storage::StorageGateway;
use echoline_worker::{PipelineOrchestrator, RetryService, StageServices, StatusService};
use sqlx::PgPool;

use crate::state::AppState;

/// Build the stage clients from configuration.
pub fn build_stage_services(config: &Config) -> Result<StageServices> {
    let pipeline = config.pipeline();

    let api_key = config
        .assemblyai_api_key()
        .context("ASSEMBLYAI_API_KEY must be set")?;
    // Each upload/poll request is bounded by the stage timeout; the whole job by the transcription timeout.
    let transcriber = AssemblyAiTranscriber::new(
        api_key,
        config.assemblyai_base_url(),
        Duration::from_secs(pipeline.stage_timeout_secs),
    )
    .context("Failed to create AssemblyAI client")?;

    let normalizer: Arc<dyn NormalizationService>;
    let sentiment: Arc<dyn SentimentService>;
    match config.anthropic_api_key() {
        Some(key) => {
            let client = AnthropicClient::new(
                key,
                config.anthropic_model(),
                config.anthropic_base_url(),
                Duration::from_secs(pipeline.stage_timeout_secs),
            )
            .context("Failed to create Anthropic client")?;
            tracing::info!(model = %client.model(), "Normalization and sentiment enabled");
            normalizer = Arc::new(ClaudeNormalizer::new(
                client.clone(),
                config.normalization_target_language(),
            ));
            sentiment = Arc::new(ClaudeSentimentScorer::new(client));
        }
        None => {
            tracing::warn!(
                "ANTHROPIC_API_KEY not set: every item will be recorded with degraded normalization and no sentiment"
            );
            let disabled = DisabledStage::new("ANTHROPIC_API_KEY not set");
            normalizer = Arc::new(disabled.clone());
            sentiment = Arc::new(disabled);
        }
    }

    Ok(StageServices {
        transcriber: Arc::new(transcriber),
        normalizer,
        sentiment,
    })
}

/// Assemble the application state from its stores and collaborators.
pub fn build_state(
    config: &Config,
    media: Arc<dyn MediaRecordStore>,
    owners: Arc<dyn OwnerStore>,
    storage: Arc<StorageGateway>,
    services: StageServices,
) -> Arc<AppState> {
    let clock = Arc::new(SystemClock);

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        media.clone(),
        owners.clone(),
        storage.clone(),
        services,
        clock.clone(),
        config.pipeline().clone(),
    ));
    let retry = RetryService::new(media.clone(), owners.clone(), clock);
    let status = StatusService::new(media.clone(), owners);

    Arc::new(AppState {
        config: config.clone(),
        media,
        storage,
        orchestrator,
        retry,
        status,
    })
}

/// Initialize all services and repositories against Postgres.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<StorageGateway>,
) -> Result<Arc<AppState>> {
    let media = Arc::new(MediaRecordRepository::new(pool.clone()));
    let owners = Arc::new(OwnerRepository::new(pool));
    let services = build_stage_services(config)?;

    tracing::info!("Services initialized");
    Ok(build_state(config, media, owners, storage, services))
}
