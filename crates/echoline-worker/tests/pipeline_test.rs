mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use chrono::Duration;

use echoline_core::models::{
    DegradedStage, MediaStatus, MediaType, OwnerRef, ProcessingStatus, Sentiment,
};
use echoline_core::{PipelineConfig, PipelineErrorCode};

use common::{test_config, Harness, TranscriberMode};

#[tokio::test]
async fn test_successful_audio_record_reaches_ready_and_owner_mirrors_it() {
    let h = Harness::new().await;
    let (owner, record) = h.seed(MediaType::Audio, "bonjour").await;

    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(result.processed, 1);
    assert_eq!(result.succeeded, vec![record.id]);
    assert!(result.failed.is_empty());
    assert!(result.degraded.is_empty());

    let stored = h.media.snapshot(record.id).unwrap();
    assert_eq!(stored.status, MediaStatus::Ready);
    assert_eq!(stored.transcript_text.as_deref(), Some("transcript of bonjour"));
    assert_eq!(stored.normalized_text.as_deref(), Some("TRANSCRIPT OF BONJOUR"));
    assert_eq!(stored.normalized_language.as_deref(), Some("en"));
    assert_eq!(stored.original_language.as_deref(), Some("fr"));
    assert_eq!(stored.sentiment, Some(Sentiment::Positive));
    assert!(stored.claim_expires_at.is_none());
    assert!(stored.owner_synced_at.is_some());
    assert!(stored.check_invariants().is_ok());

    let owner_row = h.owners.snapshot(owner.id()).unwrap();
    assert_eq!(owner_row.processing_status, ProcessingStatus::Ready);
    assert_eq!(owner_row.fields, stored.derived_fields());
}

#[tokio::test]
async fn test_storage_unavailable_marks_failed_and_leaves_owner_processing() {
    let h = Harness::new().await;
    let (owner, record) = h.seed_missing_object(MediaType::Audio);

    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    let failure = result.failure_for(record.id).unwrap();
    assert_eq!(failure.error_code, PipelineErrorCode::StorageUnavailable);
    assert!(result.succeeded.is_empty());

    let stored = h.media.snapshot(record.id).unwrap();
    assert_eq!(stored.status, MediaStatus::Failed);
    assert_eq!(stored.retry_count, 1);
    assert_eq!(stored.error_code, Some(PipelineErrorCode::StorageUnavailable));
    assert!(stored.error_detail.is_some());
    assert!(stored.last_error_at.is_some());
    assert!(stored.check_invariants().is_ok());
    assert_eq!(h.transcriber.calls.load(Ordering::SeqCst), 0);

    let owner_row = h.owners.snapshot(owner.id()).unwrap();
    assert_eq!(owner_row.processing_status, ProcessingStatus::Processing);
    assert!(owner_row.fields.is_none());
}

#[tokio::test]
async fn test_normalization_failure_falls_back_to_transcript() {
    let h = Harness::new().await;
    h.normalizer.fail.store(true, Ordering::SeqCst);
    let (_, record) = h.seed(MediaType::Audio, "hola").await;

    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec![record.id]);
    assert_eq!(result.degraded.len(), 1);
    assert_eq!(result.degraded[0].stage, DegradedStage::NormalizationDegraded);

    let stored = h.media.snapshot(record.id).unwrap();
    assert_eq!(stored.status, MediaStatus::Ready);
    assert_eq!(stored.normalized_text, stored.transcript_text);
    assert_eq!(stored.normalized_language, stored.original_language);
    // Sentiment still ran on the fallback text.
    assert_eq!(stored.sentiment, Some(Sentiment::Positive));
}

#[tokio::test]
async fn test_sentiment_failure_leaves_sentiment_null() {
    let h = Harness::new().await;
    h.sentiment.fail.store(true, Ordering::SeqCst);
    let (owner, record) = h.seed(MediaType::Video, "clip").await;

    let result = h
        .orchestrator
        .run_batch(MediaType::Video, None)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec![record.id]);
    assert_eq!(result.degraded[0].stage, DegradedStage::SentimentUnavailable);
    let stored = h.media.snapshot(record.id).unwrap();
    assert_eq!(stored.status, MediaStatus::Ready);
    assert_eq!(stored.sentiment, None);
    assert_eq!(
        h.owners.snapshot(owner.id()).unwrap().processing_status,
        ProcessingStatus::Ready
    );
}

#[tokio::test]
async fn test_transcription_errors_map_to_error_codes() {
    let h = Harness::new().await;
    h.transcriber.set_mode(TranscriberMode::Unsupported);
    let (_, unsupported) = h.seed(MediaType::Audio, "x").await;
    h.orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    h.transcriber.set_mode(TranscriberMode::Fail);
    let (_, failing) = h.seed(MediaType::Audio, "y").await;
    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(
        h.media.snapshot(unsupported.id).unwrap().error_code,
        Some(PipelineErrorCode::UnsupportedFormat)
    );
    // The unsupported record is still backing off, only the new one ran.
    assert_eq!(result.processed, 1);
    assert_eq!(
        result.failure_for(failing.id).unwrap().error_code,
        PipelineErrorCode::TranscriptionFailed
    );
}

#[tokio::test]
async fn test_one_item_failure_does_not_abort_the_batch() {
    let h = Harness::new().await;
    let (_, broken) = h.seed_missing_object(MediaType::Audio);
    let (_, good) = h.seed(MediaType::Audio, "fine").await;

    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(result.processed, 2);
    assert_eq!(result.succeeded, vec![good.id]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].id, broken.id);
}

#[tokio::test]
async fn test_claim_failure_fails_the_invocation() {
    let h = Harness::new().await;
    h.seed(MediaType::Audio, "a").await;
    h.media.set_unavailable(true);

    let err = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("claim"));
}

#[tokio::test]
async fn test_persist_failure_is_reported_per_item() {
    let h = Harness::new().await;
    let (_, good) = h.seed(MediaType::Audio, "a").await;
    let (_, stuck) = h.seed(MediaType::Audio, "b").await;
    h.media.fail_writes_for(stuck.id).unwrap();

    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(result.succeeded, vec![good.id]);
    assert_eq!(
        result.failure_for(stuck.id).unwrap().error_code,
        PipelineErrorCode::PersistFailed
    );
    assert_eq!(h.media.snapshot(good.id).unwrap().status, MediaStatus::Ready);
    assert_eq!(h.media.snapshot(stuck.id).unwrap().status, MediaStatus::Uploaded);
}

#[tokio::test]
async fn test_owner_write_failure_is_partial_and_reconciled_next_run() {
    let h = Harness::new().await;
    let (owner, record) = h.seed(MediaType::Audio, "partial").await;
    h.owners.fail_writes_for(owner.id()).unwrap();

    let first = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    assert!(first.succeeded.is_empty());
    assert_eq!(first.partial.len(), 1);
    assert_eq!(first.partial[0].error_code, PipelineErrorCode::OwnerUpdateFailed);

    let stored = h.media.snapshot(record.id).unwrap();
    assert_eq!(stored.status, MediaStatus::Ready);
    assert!(stored.owner_synced_at.is_none());
    assert_eq!(
        h.owners.snapshot(owner.id()).unwrap().processing_status,
        ProcessingStatus::Processing
    );

    h.owners.clear_failures().unwrap();
    let second = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    assert_eq!(second.reconciled, vec![record.id]);
    assert_eq!(second.processed, 0);

    let owner_row = h.owners.snapshot(owner.id()).unwrap();
    assert_eq!(owner_row.processing_status, ProcessingStatus::Ready);
    assert_eq!(owner_row.fields, stored.derived_fields());
    assert!(h.media.snapshot(record.id).unwrap().owner_synced_at.is_some());
}

#[tokio::test]
async fn test_recommitting_same_outputs_is_idempotent() {
    let h = Harness::new().await;
    let (owner, record) = h.seed(MediaType::Audio, "same").await;
    h.orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    let media_first = h.media.snapshot(record.id).unwrap();
    let owner_first = h.owners.snapshot(owner.id()).unwrap();

    h.retry
        .retry(
            record.id,
            Some(&echoline_core::models::Caller::new(
                uuid::Uuid::new_v4(),
                echoline_core::models::UserRole::Admin,
            )),
        )
        .await
        .unwrap();
    h.orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(h.media.snapshot(record.id).unwrap(), media_first);
    assert_eq!(h.owners.snapshot(owner.id()).unwrap(), owner_first);
}

#[tokio::test]
async fn test_failed_record_waits_for_backoff_and_retry_count_accumulates() {
    let h = Harness::new().await;
    h.transcriber.set_mode(TranscriberMode::Fail);
    let (_, record) = h.seed(MediaType::Audio, "flaky").await;

    h.orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    let first = h.media.snapshot(record.id).unwrap();
    assert_eq!(first.retry_count, 1);

    // backoff(1) = 60s
    h.clock.advance(Duration::seconds(59));
    let early = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    assert_eq!(early.processed, 0);

    h.clock.advance(Duration::seconds(1));
    h.orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    let second = h.media.snapshot(record.id).unwrap();
    assert_eq!(second.retry_count, 2);
    assert!(second.last_error_at.unwrap() > first.last_error_at.unwrap());

    // backoff(2) = 120s
    h.clock.advance(Duration::seconds(119));
    assert_eq!(
        h.orchestrator
            .run_batch(MediaType::Audio, None)
            .await
            .unwrap()
            .processed,
        0
    );
    h.transcriber.set_mode(TranscriberMode::Echo);
    h.clock.advance(Duration::seconds(1));
    let recovered = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    assert_eq!(recovered.succeeded, vec![record.id]);

    let ready = h.media.snapshot(record.id).unwrap();
    assert_eq!(ready.status, MediaStatus::Ready);
    assert_eq!(ready.retry_count, 2);
    assert!(ready.error_code.is_none());
}

#[tokio::test]
async fn test_retry_ceiling_stops_automatic_claims() {
    let h = Harness::with_config(PipelineConfig {
        max_retries: Some(1),
        ..test_config()
    })
    .await;
    h.transcriber.set_mode(TranscriberMode::Fail);
    let (_, record) = h.seed(MediaType::Audio, "doomed").await;

    h.orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();
    h.clock.advance(Duration::hours(24));
    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(result.processed, 0);
    assert_eq!(h.media.snapshot(record.id).unwrap().retry_count, 1);
}

#[tokio::test]
async fn test_deadline_releases_unstarted_claims() {
    let h = Harness::with_config(PipelineConfig {
        invocation_deadline_secs: 0,
        ..test_config()
    })
    .await;
    let (_, a) = h.seed(MediaType::Audio, "a").await;
    let (_, b) = h.seed(MediaType::Audio, "b").await;

    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    assert_eq!(result.processed, 0);
    let released: HashSet<_> = result.released.into_iter().collect();
    assert_eq!(released, HashSet::from([a.id, b.id]));
    for id in [a.id, b.id] {
        let stored = h.media.snapshot(id).unwrap();
        assert_eq!(stored.status, MediaStatus::Uploaded);
        assert!(stored.claim_expires_at.is_none());
    }
    assert_eq!(h.transcriber.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_limit_and_media_type_are_respected() {
    let h = Harness::new().await;
    let owner = OwnerRef::SurveyResponse(uuid::Uuid::new_v4());
    h.seed_for(owner, MediaType::Video, "video").await;
    for i in 0..3 {
        h.seed(MediaType::Audio, &format!("audio-{}", i)).await;
    }

    let result = h
        .orchestrator
        .run_batch(MediaType::Audio, Some(2))
        .await
        .unwrap();
    assert_eq!(result.processed, 2);
    assert_eq!(result.media_type, MediaType::Audio);

    let video_pending = h
        .media
        .all()
        .into_iter()
        .filter(|r| r.media_type == MediaType::Video && r.status == MediaStatus::Uploaded)
        .count();
    assert_eq!(video_pending, 1);
}

#[tokio::test]
async fn test_overlapping_invocations_process_each_record_once() {
    let h = Harness::new().await;
    let mut ids = HashSet::new();
    for i in 0..8 {
        let (_, record) = h.seed(MediaType::Audio, &format!("item-{}", i)).await;
        ids.insert(record.id);
    }

    let (left, right) = tokio::join!(
        h.orchestrator.run_batch(MediaType::Audio, Some(8)),
        h.orchestrator.run_batch(MediaType::Audio, Some(8)),
    );
    let left: HashSet<_> = left.unwrap().succeeded.into_iter().collect();
    let right: HashSet<_> = right.unwrap().succeeded.into_iter().collect();

    assert!(left.is_disjoint(&right));
    assert_eq!(left.union(&right).copied().collect::<HashSet<_>>(), ids);
    assert_eq!(h.transcriber.calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_invariants_hold_after_mixed_batch() {
    let h = Harness::new().await;
    h.seed_missing_object(MediaType::Audio);
    h.seed(MediaType::Audio, "ok").await;
    h.normalizer.fail.store(true, Ordering::SeqCst);
    h.seed(MediaType::Audio, "degraded").await;

    h.orchestrator
        .run_batch(MediaType::Audio, None)
        .await
        .unwrap();

    for record in h.media.all() {
        record.check_invariants().unwrap();
    }
}
