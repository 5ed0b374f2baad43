//! Pipeline orchestrator: claim, run the three stages, commit.
//!
//! One invocation handles one media type. Per-item faults are recorded on the
//! media record and reported in the [`BatchResult`]; only a failing claim is
//! returned as an error, so the scheduler retries the whole batch next tick.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures::stream::{self, StreamExt};
use tokio::time::{timeout, Instant};
use uuid::Uuid;

use echoline_core::constants::MAX_BATCH_LIMIT;
use echoline_core::models::{
    BatchResult, Degradation, DegradedStage, DerivedFields, ItemFailure, MediaRecord, MediaType,
    OwnerRef, Sentiment,
};
use echoline_core::{Clock, PipelineConfig, PipelineError, PipelineErrorCode};
use echoline_db::{MediaRecordStore, OwnerStore, PersistOutcome};
use echoline_services::{
    NormalizationService, SentimentService, Transcript, TranscriptionError, TranscriptionService,
};
use echoline_storage::StorageGateway;

use crate::stage::StageOutcome;

/// External services behind the three stages.
#[derive(Clone)]
pub struct StageServices {
    pub transcriber: Arc<dyn TranscriptionService>,
    pub normalizer: Arc<dyn NormalizationService>,
    pub sentiment: Arc<dyn SentimentService>,
}

enum ItemOutcome {
    Succeeded {
        id: Uuid,
        degradations: Vec<Degradation>,
    },
    Failed(ItemFailure),
    Partial {
        failure: ItemFailure,
        degradations: Vec<Degradation>,
    },
    /// The record was deleted, or its claim revoked by a retry, while it was
    /// being processed.
    Discarded,
    /// Claimed but the invocation deadline passed before it started.
    NotStarted(Uuid),
}

pub struct PipelineOrchestrator {
    media: Arc<dyn MediaRecordStore>,
    owners: Arc<dyn OwnerStore>,
    storage: Arc<StorageGateway>,
    services: StageServices,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        media: Arc<dyn MediaRecordStore>,
        owners: Arc<dyn OwnerStore>,
        storage: Arc<StorageGateway>,
        services: StageServices,
        clock: Arc<dyn Clock>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            media,
            owners,
            storage,
            services,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.config.stage_timeout_secs)
    }

    /// Run one batch. `limit` defaults to the configured batch limit for the
    /// media type and is clamped to `1..=MAX_BATCH_LIMIT`.
    #[tracing::instrument(skip(self), fields(media_type = %media_type))]
    pub async fn run_batch(&self, media_type: MediaType, limit: Option<i64>) -> Result<BatchResult> {
        let limit = limit
            .unwrap_or_else(|| self.config.batch_limit(media_type))
            .clamp(1, MAX_BATCH_LIMIT);
        let deadline =
            Instant::now() + Duration::from_secs(self.config.invocation_deadline_secs);
        let mut result = BatchResult::empty(media_type);

        result.reconciled = self.reconcile(media_type, limit).await;

        let policy = self.config.retry_policy();
        let claimed = self
            .media
            .claim_eligible(media_type, limit, self.clock.now(), &policy)
            .await
            .context("Failed to claim media records")?;

        if claimed.is_empty() {
            tracing::debug!("No eligible media records");
            return Ok(result);
        }
        let claimed_count = claimed.len();
        let claim_token = claimed.first().and_then(|r| r.claim_token);

        let outcomes: Vec<ItemOutcome> = stream::iter(claimed)
            .map(|record| self.process_item(record, deadline))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Succeeded { id, degradations } => {
                    result.succeeded.push(id);
                    result.degraded.extend(degradations);
                }
                ItemOutcome::Failed(failure) => result.failed.push(failure),
                ItemOutcome::Partial {
                    failure,
                    degradations,
                } => {
                    result.partial.push(failure);
                    result.degraded.extend(degradations);
                }
                ItemOutcome::Discarded => {}
                ItemOutcome::NotStarted(id) => result.released.push(id),
            }
        }

        match claim_token {
            Some(token) if !result.released.is_empty() => {
                if let Err(e) = self.media.release_claims(&result.released, token).await {
                    // Unreleased leases expire on their own.
                    tracing::warn!(
                        error = %e,
                        count = result.released.len(),
                        "Failed to release claims after deadline"
                    );
                }
            }
            _ => {}
        }

        result.processed = claimed_count - result.released.len();

        tracing::info!(
            processed = result.processed,
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            partial = result.partial.len(),
            degraded = result.degraded.len(),
            released = result.released.len(),
            reconciled = result.reconciled.len(),
            "Media pipeline batch finished"
        );

        Ok(result)
    }

    #[tracing::instrument(skip(self, record, deadline), fields(media_id = %record.id))]
    async fn process_item(&self, record: MediaRecord, deadline: Instant) -> ItemOutcome {
        if Instant::now() >= deadline {
            return ItemOutcome::NotStarted(record.id);
        }
        let Some(claim_token) = record.claim_token else {
            // Unreachable through claim_eligible; without a token no write could land.
            tracing::error!(media_id = %record.id, "Claimed media record has no claim token");
            return ItemOutcome::NotStarted(record.id);
        };

        let transcript = match self.transcribe(&record).await {
            Ok(transcript) => transcript,
            Err(err) => return self.record_failure(&record, claim_token, err).await,
        };

        let (fields, degradations) = self.enrich(record.id, transcript).await;
        self.commit(&record, claim_token, fields, degradations).await
    }

    async fn transcribe(&self, record: &MediaRecord) -> Result<Transcript, PipelineError> {
        let media = match timeout(
            self.stage_timeout(),
            self.storage
                .resolve(record.storage_provider, &record.storage_key),
        )
        .await
        {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return Err(PipelineError::storage_unavailable(e)),
            Err(_) => {
                return Err(PipelineError::storage_unavailable(anyhow!(
                    "storage read timed out after {}s",
                    self.config.stage_timeout_secs
                )))
            }
        };

        let transcription = timeout(
            Duration::from_secs(self.config.transcription_timeout_secs),
            self.services
                .transcriber
                .transcribe(media, record.media_type, &record.mime_type),
        )
        .await;

        match transcription {
            Ok(Ok(transcript)) => Ok(transcript),
            Ok(Err(TranscriptionError::UnsupportedFormat(msg))) => {
                Err(PipelineError::unsupported_format(anyhow!(msg)))
            }
            Ok(Err(e @ TranscriptionError::Failed(_))) => {
                Err(PipelineError::transcription_failed(e))
            }
            Err(_) => Err(PipelineError::transcription_failed(anyhow!(
                "transcription timed out after {}s",
                self.config.transcription_timeout_secs
            ))),
        }
    }

    async fn record_failure(
        &self,
        record: &MediaRecord,
        claim_token: Uuid,
        err: PipelineError,
    ) -> ItemOutcome {
        let id = record.id;
        tracing::warn!(
            media_id = %id,
            error_code = %err.code(),
            error = %err,
            retry_count = record.retry_count,
            "Transcription stage failed"
        );

        let persisted = self
            .media
            .persist_failure(id, claim_token, err.code(), &err.detail(), self.clock.now())
            .await;

        match persisted {
            Ok(PersistOutcome::Applied) => ItemOutcome::Failed(ItemFailure::from_error(id, &err)),
            Ok(PersistOutcome::Skipped) => {
                tracing::info!(media_id = %id, "Media record deleted or reclaimed during processing, failure discarded");
                ItemOutcome::Discarded
            }
            Err(e) => {
                tracing::error!(media_id = %id, error = %e, "Failed to persist media failure");
                let err = PipelineError::new(
                    PipelineErrorCode::PersistFailed,
                    e.context(format!("recording {} failed", err.code())),
                );
                ItemOutcome::Failed(ItemFailure::from_error(id, &err))
            }
        }
    }

    /// Normalization and sentiment. Neither can fail the item.
    async fn enrich(&self, id: Uuid, transcript: Transcript) -> (DerivedFields, Vec<Degradation>) {
        let mut degradations = Vec::new();
        let fallback = || echoline_services::Normalization {
            normalized_text: transcript.text.clone(),
            normalized_language: transcript.language.clone(),
            original_language: transcript.language.clone(),
        };

        // Blank transcripts (silence) have nothing to normalize or score.
        let blank = transcript.text.trim().is_empty();

        let normalization = if blank {
            StageOutcome::Completed(fallback())
        } else {
            self.run_optional_stage(
                self.services.normalizer.normalize(&transcript.text),
                fallback,
            )
            .await
        };
        let (normalization, detail) = normalization.into_parts();
        if let Some(detail) = detail {
            tracing::warn!(media_id = %id, error = %detail, "Normalization degraded, using transcript");
            degradations.push(Degradation {
                id,
                stage: DegradedStage::NormalizationDegraded,
                detail,
            });
        }

        let sentiment: StageOutcome<Option<Sentiment>> = if blank {
            StageOutcome::Completed(None)
        } else {
            let scorer = &self.services.sentiment;
            let text = normalization.normalized_text.as_str();
            self.run_optional_stage(async move { scorer.score(text).await.map(Some) }, || None)
                .await
        };
        let (sentiment, detail) = sentiment.into_parts();
        if let Some(detail) = detail {
            tracing::warn!(media_id = %id, error = %detail, "Sentiment unavailable");
            degradations.push(Degradation {
                id,
                stage: DegradedStage::SentimentUnavailable,
                detail,
            });
        }

        let original_language = transcript
            .language
            .clone()
            .or(normalization.original_language);
        let fields = DerivedFields {
            transcript_text: transcript.text,
            transcript_confidence: transcript.confidence,
            normalized_text: normalization.normalized_text,
            normalized_language: normalization
                .normalized_language
                .or_else(|| original_language.clone()),
            original_language,
            language_confidence: transcript.language_confidence,
            sentiment,
        };
        (fields, degradations)
    }

    async fn run_optional_stage<T, E, F>(
        &self,
        stage: F,
        fallback: impl FnOnce() -> T,
    ) -> StageOutcome<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        match timeout(self.stage_timeout(), stage).await {
            Ok(Ok(value)) => StageOutcome::Completed(value),
            Ok(Err(e)) => StageOutcome::Degraded {
                fallback: fallback(),
                detail: e.to_string(),
            },
            Err(_) => StageOutcome::Degraded {
                fallback: fallback(),
                detail: format!("timed out after {}s", self.config.stage_timeout_secs),
            },
        }
    }

    /// Media record first, then the owner.
    async fn commit(
        &self,
        record: &MediaRecord,
        claim_token: Uuid,
        fields: DerivedFields,
        degradations: Vec<Degradation>,
    ) -> ItemOutcome {
        let id = record.id;
        match self
            .media
            .persist_result(id, claim_token, &fields, self.clock.now())
            .await
        {
            Ok(PersistOutcome::Applied) => {}
            Ok(PersistOutcome::Skipped) => {
                tracing::info!(media_id = %id, "Media record deleted or reclaimed during processing, result discarded");
                return ItemOutcome::Discarded;
            }
            Err(e) => {
                tracing::error!(media_id = %id, error = %e, "Failed to persist media result");
                let err = PipelineError::new(PipelineErrorCode::PersistFailed, e);
                return ItemOutcome::Failed(ItemFailure::from_error(id, &err));
            }
        }

        match self.sync_owner(record.owner(), id, &fields).await {
            Ok(()) => {
                tracing::info!(
                    media_id = %id,
                    transcript_length = fields.transcript_text.len(),
                    degraded = !degradations.is_empty(),
                    "Media record ready"
                );
                ItemOutcome::Succeeded { id, degradations }
            }
            Err(err) => {
                tracing::warn!(media_id = %id, owner = %record.owner(), error = %err, "Owner update failed after media commit");
                ItemOutcome::Partial {
                    failure: ItemFailure::from_error(id, &err),
                    degradations,
                }
            }
        }
    }

    /// Mirror committed fields onto the owner and mark the media record synced.
    async fn sync_owner(
        &self,
        owner: OwnerRef,
        media_id: Uuid,
        fields: &DerivedFields,
    ) -> Result<(), PipelineError> {
        let outcome = self
            .owners
            .write_derived(owner, fields)
            .await
            .map_err(|e| PipelineError::new(PipelineErrorCode::OwnerUpdateFailed, e))?;

        // Marked synced even when the owner is missing.
        if let Err(e) = self.media.mark_owner_synced(media_id, self.clock.now()).await {
            tracing::warn!(media_id = %media_id, error = %e, "Failed to mark owner synced");
        }

        match outcome {
            PersistOutcome::Applied => Ok(()),
            PersistOutcome::Skipped => Err(PipelineError::new(
                PipelineErrorCode::OwnerUpdateFailed,
                anyhow!("owner {} not found", owner),
            )),
        }
    }

    /// Re-propagate earlier partial commits of this media type to their owners.
    async fn reconcile(&self, media_type: MediaType, limit: i64) -> Vec<Uuid> {
        let pending = match self.media.list_unsynced_ready(media_type, limit).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list unsynced media records");
                return Vec::new();
            }
        };

        let mut reconciled = Vec::new();
        for record in pending {
            let Some(fields) = record.derived_fields() else {
                continue;
            };
            match self.sync_owner(record.owner(), record.id, &fields).await {
                Ok(()) => reconciled.push(record.id),
                Err(err) => {
                    tracing::debug!(media_id = %record.id, error = %err, "Owner still not reconciled")
                }
            }
        }

        if !reconciled.is_empty() {
            tracing::info!(count = reconciled.len(), "Reconciled owner records");
        }
        reconciled
    }
}
