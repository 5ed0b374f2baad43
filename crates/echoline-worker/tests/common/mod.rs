#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use echoline_core::models::{MediaRecord, MediaType, OwnerRef, Sentiment};
use echoline_core::{FixedClock, PipelineConfig, StorageBackend};
use echoline_db::memory::{InMemoryMediaStore, InMemoryOwnerStore};
use echoline_services::{
    Normalization, NormalizationService, SentimentService, ServiceError, Transcript,
    TranscriptionError, TranscriptionService,
};
use echoline_storage::{LocalStorage, Storage, StorageGateway};
use echoline_worker::{PipelineOrchestrator, RetryService, StageServices, StatusService};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TranscriberMode {
    Echo,
    Unsupported,
    Fail,
}

/// Transcribes media as "transcript of <bytes>".
pub struct FakeTranscriber {
    pub mode: Mutex<TranscriberMode>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn set_mode(&self, mode: TranscriberMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl TranscriptionService for FakeTranscriber {
    async fn transcribe(
        &self,
        media: Bytes,
        _media_type: MediaType,
        _mime_type: &str,
    ) -> Result<Transcript, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        match mode {
            TranscriberMode::Echo => Ok(Transcript {
                text: format!("transcript of {}", String::from_utf8_lossy(&media)),
                confidence: Some(0.91),
                language: Some("fr".to_string()),
                language_confidence: Some(0.84),
            }),
            TranscriberMode::Unsupported => Err(TranscriptionError::UnsupportedFormat(
                "codec not supported".to_string(),
            )),
            TranscriberMode::Fail => Err(TranscriptionError::Failed(
                "upstream returned 500".to_string(),
            )),
        }
    }
}

/// Upper-cases the text and reports it as English.
#[derive(Default)]
pub struct FakeNormalizer {
    pub fail: AtomicBool,
}

#[async_trait]
impl NormalizationService for FakeNormalizer {
    async fn normalize(&self, text: &str) -> Result<Normalization, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Api {
                status: 529,
                body: "overloaded".to_string(),
            });
        }
        Ok(Normalization {
            normalized_text: text.to_uppercase(),
            normalized_language: Some("en".to_string()),
            original_language: Some("fr".to_string()),
        })
    }
}

#[derive(Default)]
pub struct FakeSentiment {
    pub fail: AtomicBool,
}

#[async_trait]
impl SentimentService for FakeSentiment {
    async fn score(&self, _text: &str) -> Result<Sentiment, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::InvalidResponse("no label".to_string()));
        }
        Ok(Sentiment::Positive)
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        scheduler_enabled: false,
        max_concurrency: 2,
        stage_timeout_secs: 5,
        transcription_timeout_secs: 5,
        invocation_deadline_secs: 60,
        backoff_base_secs: 60,
        backoff_max_secs: 3_600,
        ..PipelineConfig::default()
    }
}

pub struct Harness {
    pub media: InMemoryMediaStore,
    pub owners: InMemoryOwnerStore,
    pub storage: LocalStorage,
    pub clock: FixedClock,
    pub transcriber: Arc<FakeTranscriber>,
    pub normalizer: Arc<FakeNormalizer>,
    pub sentiment: Arc<FakeSentiment>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub retry: RetryService,
    pub status: StatusService,
    pub config: PipelineConfig,
    _dir: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: PipelineConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let gateway = StorageGateway::new().with_backend(Arc::new(storage.clone()));

        let media = InMemoryMediaStore::new();
        let owners = InMemoryOwnerStore::new();
        let clock = FixedClock::new(start_time());
        let transcriber = Arc::new(FakeTranscriber {
            mode: Mutex::new(TranscriberMode::Echo),
            calls: AtomicUsize::new(0),
        });
        let normalizer = Arc::new(FakeNormalizer::default());
        let sentiment = Arc::new(FakeSentiment::default());

        let services = StageServices {
            transcriber: transcriber.clone(),
            normalizer: normalizer.clone(),
            sentiment: sentiment.clone(),
        };
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            Arc::new(media.clone()),
            Arc::new(owners.clone()),
            Arc::new(gateway),
            services,
            Arc::new(clock.clone()),
            config.clone(),
        ));
        let retry = RetryService::new(
            Arc::new(media.clone()),
            Arc::new(owners.clone()),
            Arc::new(clock.clone()),
        );
        let status = StatusService::new(Arc::new(media.clone()), Arc::new(owners.clone()));

        Self {
            media,
            owners,
            storage,
            clock,
            transcriber,
            normalizer,
            sentiment,
            orchestrator,
            retry,
            status,
            config,
            _dir: dir,
        }
    }

    /// A second orchestrator over the same stores, with its own transcriber.
    pub fn orchestrator_with(&self, transcriber: Arc<dyn TranscriptionService>) -> PipelineOrchestrator {
        let gateway = StorageGateway::new().with_backend(Arc::new(self.storage.clone()));
        PipelineOrchestrator::new(
            Arc::new(self.media.clone()),
            Arc::new(self.owners.clone()),
            Arc::new(gateway),
            StageServices {
                transcriber,
                normalizer: self.normalizer.clone(),
                sentiment: self.sentiment.clone(),
            },
            Arc::new(self.clock.clone()),
            self.config.clone(),
        )
    }

    /// Create an owner and an uploaded media record whose object holds `content`.
    pub async fn seed(&self, media_type: MediaType, content: &str) -> (OwnerRef, MediaRecord) {
        let owner = OwnerRef::Feedback(Uuid::new_v4());
        self.seed_for(owner, media_type, content).await
    }

    pub async fn seed_for(
        &self,
        owner: OwnerRef,
        media_type: MediaType,
        content: &str,
    ) -> (OwnerRef, MediaRecord) {
        if self.owners.snapshot(owner.id()).is_none() {
            self.owners.insert(owner).unwrap();
        }
        let (key, mime) = match media_type {
            MediaType::Audio => (format!("feedback/{}.mp3", Uuid::new_v4()), "audio/mpeg"),
            MediaType::Video => (format!("feedback/{}.mp4", Uuid::new_v4()), "video/mp4"),
        };
        self.storage
            .upload_with_key(&key, Bytes::from(content.to_string()), mime)
            .await
            .unwrap();
        let record = MediaRecord::uploaded(
            owner,
            media_type,
            StorageBackend::Local,
            key,
            mime,
            self.clock_now(),
        );
        self.media.insert(record.clone()).unwrap();
        (owner, record)
    }

    /// A record whose object was never written.
    pub fn seed_missing_object(&self, media_type: MediaType) -> (OwnerRef, MediaRecord) {
        let owner = OwnerRef::SurveyResponse(Uuid::new_v4());
        self.owners.insert(owner).unwrap();
        let record = MediaRecord::uploaded(
            owner,
            media_type,
            StorageBackend::Local,
            "feedback/never-uploaded.mp3",
            "audio/mpeg",
            self.clock_now(),
        );
        self.media.insert(record.clone()).unwrap();
        (owner, record)
    }

    fn clock_now(&self) -> DateTime<Utc> {
        use echoline_core::Clock;
        self.clock.now()
    }
}
