//! Test helpers: build the router over in-memory stores and local storage.
//!
//! Run from workspace root: `cargo test -p echoline-api`. No database needed.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use echoline_api::auth::issue_token;
use echoline_api::setup::{routes, services};
use echoline_core::constants::API_PREFIX;
use echoline_core::models::{MediaRecord, MediaType, OwnerRef, UserRole};
use echoline_core::{
    BaseConfig, Config, PipelineConfig, PipelineServiceConfig, StorageBackend,
};
use echoline_db::memory::{InMemoryMediaStore, InMemoryOwnerStore};
use echoline_services::{
    DisabledStage, Transcript, TranscriptionError, TranscriptionService,
};
use echoline_storage::{LocalStorage, Storage, StorageGateway};
use echoline_worker::StageServices;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";
pub const TEST_MASTER_API_KEY: &str = "test-master-api-key-at-least-32-characters-long";
pub const TEST_SERVICE_API_KEY: &str = "test-service-api-key-at-least-32-characters";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn user_token(role: UserRole) -> String {
    issue_token(Uuid::new_v4(), role, TEST_JWT_SECRET, 1).unwrap()
}

/// Transcribes media as "heard: <bytes>".
struct EchoTranscriber;

#[async_trait]
impl TranscriptionService for EchoTranscriber {
    async fn transcribe(
        &self,
        media: Bytes,
        _media_type: MediaType,
        _mime_type: &str,
    ) -> Result<Transcript, TranscriptionError> {
        Ok(Transcript {
            text: format!("heard: {}", String::from_utf8_lossy(&media)),
            confidence: Some(0.9),
            language: Some("en".to_string()),
            language_confidence: Some(0.99),
        })
    }
}

fn test_config() -> Config {
    Config(Box::new(PipelineServiceConfig {
        base: BaseConfig {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            ..BaseConfig::default()
        },
        database_url: "postgresql://unused/echoline".to_string(),
        master_api_key: Some(TEST_MASTER_API_KEY.to_string()),
        service_api_key: Some(TEST_SERVICE_API_KEY.to_string()),
        storage_backend: Some(StorageBackend::Local),
        pipeline: PipelineConfig {
            scheduler_enabled: false,
            max_concurrency: 2,
            stage_timeout_secs: 5,
            transcription_timeout_secs: 5,
            invocation_deadline_secs: 60,
            ..PipelineConfig::default()
        },
        ..PipelineServiceConfig::default()
    }))
}

/// Test application: server plus handles on the stores behind it.
pub struct TestApp {
    pub server: TestServer,
    pub media: InMemoryMediaStore,
    pub owners: InMemoryOwnerStore,
    pub storage: LocalStorage,
    _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Create an owner and an uploaded media record whose object holds `content`.
    pub async fn seed(&self, media_type: MediaType, content: &str) -> (OwnerRef, MediaRecord) {
        let key = match media_type {
            MediaType::Audio => format!("feedback/{}.m4a", Uuid::new_v4()),
            MediaType::Video => format!("feedback/{}.webm", Uuid::new_v4()),
        };
        self.seed_with_key(media_type, &key, content).await
    }

    /// Same as `seed`, with an explicit storage key.
    pub async fn seed_with_key(
        &self,
        media_type: MediaType,
        key: &str,
        content: &str,
    ) -> (OwnerRef, MediaRecord) {
        let owner = OwnerRef::SurveyResponse(Uuid::new_v4());
        self.owners.insert(owner).unwrap();
        let mime = match media_type {
            MediaType::Audio => "audio/mp4",
            MediaType::Video => "video/webm",
        };
        self.storage
            .upload_with_key(key, Bytes::from(content.to_string()), mime)
            .await
            .unwrap();
        let record = MediaRecord::uploaded(
            owner,
            media_type,
            StorageBackend::Local,
            key,
            mime,
            Utc::now(),
        );
        self.media.insert(record.clone()).unwrap();
        (owner, record)
    }

    /// A record whose object was never written.
    pub fn seed_without_object(&self) -> MediaRecord {
        let owner = OwnerRef::Feedback(Uuid::new_v4());
        self.owners.insert(owner).unwrap();
        let record = MediaRecord::uploaded(
            owner,
            MediaType::Audio,
            StorageBackend::Local,
            "feedback/lost.m4a",
            "audio/mp4",
            Utc::now(),
        );
        self.media.insert(record.clone()).unwrap();
        record
    }
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(temp_dir.path()).await.unwrap();
    let gateway = Arc::new(StorageGateway::new().with_backend(Arc::new(storage.clone())));

    let media = InMemoryMediaStore::new();
    let owners = InMemoryOwnerStore::new();
    let config = test_config();

    let disabled = DisabledStage::new("not configured in tests");
    let stage_services = StageServices {
        transcriber: Arc::new(EchoTranscriber),
        normalizer: Arc::new(disabled.clone()),
        sentiment: Arc::new(disabled),
    };

    let state = services::build_state(
        &config,
        Arc::new(media.clone()),
        Arc::new(owners.clone()),
        gateway,
        stage_services,
    );
    let router = routes::setup_routes(&config, state).unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        media,
        owners,
        storage,
        _temp_dir: temp_dir,
    }
}
