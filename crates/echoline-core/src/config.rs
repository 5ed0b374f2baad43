//! Configuration module
//!
//! Environment-driven configuration for the API process and the pipeline
//! scheduler it hosts: database, storage, authentication, external service
//! credentials and pipeline tuning.

use std::env;
use std::str::FromStr;

use crate::models::RetryPolicy;
use crate::storage_types::StorageBackend;

// Common constants
const DEFAULT_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24;

// Pipeline defaults
const PIPELINE_INTERVAL_SECS: u64 = 60;
const PIPELINE_AUDIO_BATCH_LIMIT: i64 = 20;
const PIPELINE_VIDEO_BATCH_LIMIT: i64 = 5;
const PIPELINE_MAX_CONCURRENCY: usize = 4;
const PIPELINE_STAGE_TIMEOUT_SECS: u64 = 60;
const PIPELINE_TRANSCRIPTION_TIMEOUT_SECS: u64 = 600;
const PIPELINE_INVOCATION_DEADLINE_SECS: u64 = 840;
const PIPELINE_CLAIM_LEASE_SECS: i64 = 1_800;
const PIPELINE_BACKOFF_BASE_SECS: i64 = 60;
const PIPELINE_BACKOFF_MAX_SECS: i64 = 21_600;

const DEFAULT_ASSEMBLYAI_BASE_URL: &str = "https://api.assemblyai.com";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
const DEFAULT_TARGET_LANGUAGE: &str = "en";

/// Base configuration shared by every process
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub environment: String,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            cors_origins: vec!["*".to_string()],
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            jwt_secret: String::new(),
            jwt_expiry_hours: JWT_EXPIRY_HOURS,
            environment: "development".to_string(),
        }
    }
}

/// Scheduling and tuning of the media pipeline
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Run the in-process scheduler loops. Disable when an external cron calls the trigger endpoint.
    pub scheduler_enabled: bool,
    pub interval_secs: u64,
    pub audio_batch_limit: i64,
    pub video_batch_limit: i64,
    pub max_concurrency: usize,
    /// Timeout for the storage read, normalization and sentiment calls of one item.
    pub stage_timeout_secs: u64,
    /// Timeout for the transcription call of one item.
    pub transcription_timeout_secs: u64,
    /// Overall budget of one invocation; unstarted items are released after it.
    pub invocation_deadline_secs: u64,
    pub claim_lease_secs: i64,
    pub backoff_base_secs: i64,
    pub backoff_max_secs: i64,
    pub max_retries: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scheduler_enabled: true,
            interval_secs: PIPELINE_INTERVAL_SECS,
            audio_batch_limit: PIPELINE_AUDIO_BATCH_LIMIT,
            video_batch_limit: PIPELINE_VIDEO_BATCH_LIMIT,
            max_concurrency: PIPELINE_MAX_CONCURRENCY,
            stage_timeout_secs: PIPELINE_STAGE_TIMEOUT_SECS,
            transcription_timeout_secs: PIPELINE_TRANSCRIPTION_TIMEOUT_SECS,
            invocation_deadline_secs: PIPELINE_INVOCATION_DEADLINE_SECS,
            claim_lease_secs: PIPELINE_CLAIM_LEASE_SECS,
            backoff_base_secs: PIPELINE_BACKOFF_BASE_SECS,
            backoff_max_secs: PIPELINE_BACKOFF_MAX_SECS,
            max_retries: None,
        }
    }
}

impl PipelineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay_secs: self.backoff_base_secs,
            max_delay_secs: self.backoff_max_secs,
            max_retries: self.max_retries,
            claim_lease_secs: self.claim_lease_secs,
        }
    }

    /// Shortest lease that outlives every item of an invocation. An item may
    /// start just before the deadline and then run the storage read,
    /// transcription, normalization and sentiment, each to its timeout.
    pub fn min_claim_lease_secs(&self) -> u64 {
        self.invocation_deadline_secs
            + self.transcription_timeout_secs
            + 3 * self.stage_timeout_secs
    }

    pub fn batch_limit(&self, media_type: crate::models::MediaType) -> i64 {
        match media_type {
            crate::models::MediaType::Audio => self.audio_batch_limit,
            crate::models::MediaType::Video => self.video_batch_limit,
        }
    }

    fn from_env() -> Self {
        Self {
            scheduler_enabled: parse_env("PIPELINE_SCHEDULER_ENABLED", true),
            interval_secs: parse_env("PIPELINE_INTERVAL_SECS", PIPELINE_INTERVAL_SECS),
            audio_batch_limit: parse_env("PIPELINE_AUDIO_BATCH_LIMIT", PIPELINE_AUDIO_BATCH_LIMIT),
            video_batch_limit: parse_env("PIPELINE_VIDEO_BATCH_LIMIT", PIPELINE_VIDEO_BATCH_LIMIT),
            max_concurrency: parse_env("PIPELINE_MAX_CONCURRENCY", PIPELINE_MAX_CONCURRENCY),
            stage_timeout_secs: parse_env("PIPELINE_STAGE_TIMEOUT_SECS", PIPELINE_STAGE_TIMEOUT_SECS),
            transcription_timeout_secs: parse_env(
                "PIPELINE_TRANSCRIPTION_TIMEOUT_SECS",
                PIPELINE_TRANSCRIPTION_TIMEOUT_SECS,
            ),
            invocation_deadline_secs: parse_env(
                "PIPELINE_INVOCATION_DEADLINE_SECS",
                PIPELINE_INVOCATION_DEADLINE_SECS,
            ),
            claim_lease_secs: parse_env("PIPELINE_CLAIM_LEASE_SECS", PIPELINE_CLAIM_LEASE_SECS),
            backoff_base_secs: parse_env("PIPELINE_BACKOFF_BASE_SECS", PIPELINE_BACKOFF_BASE_SECS),
            backoff_max_secs: parse_env("PIPELINE_BACKOFF_MAX_SECS", PIPELINE_BACKOFF_MAX_SECS),
            max_retries: env::var("PIPELINE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
        }
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.audio_batch_limit < 1 || self.video_batch_limit < 1 {
            return Err(anyhow::anyhow!(
                "PIPELINE_AUDIO_BATCH_LIMIT and PIPELINE_VIDEO_BATCH_LIMIT must be at least 1"
            ));
        }
        if self.max_concurrency == 0 {
            return Err(anyhow::anyhow!("PIPELINE_MAX_CONCURRENCY must be at least 1"));
        }
        if self.backoff_max_secs < self.backoff_base_secs {
            return Err(anyhow::anyhow!(
                "PIPELINE_BACKOFF_MAX_SECS must not be lower than PIPELINE_BACKOFF_BASE_SECS"
            ));
        }
        // A lease shorter than the work it protects lets a second invocation re-claim live items.
        let min_lease = self.min_claim_lease_secs();
        if self.claim_lease_secs < 0 || (self.claim_lease_secs as u64) < min_lease {
            return Err(anyhow::anyhow!(
                "PIPELINE_CLAIM_LEASE_SECS must be at least {} (invocation deadline + \
                 transcription timeout + 3 x stage timeout)",
                min_lease
            ));
        }
        if matches!(self.max_retries, Some(n) if n < 1) {
            return Err(anyhow::anyhow!("PIPELINE_MAX_RETRIES must be at least 1 when set"));
        }
        Ok(())
    }
}

/// Pipeline service configuration
#[derive(Clone, Debug, Default)]
pub struct PipelineServiceConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Service API key (for the scheduler trigger)
    pub service_api_key: Option<String>,
    // Master API key (acts as an admin caller)
    pub master_api_key: Option<String>,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
    // Transcription (AssemblyAI)
    pub assemblyai_api_key: Option<String>,
    pub assemblyai_base_url: String,
    // Normalization and sentiment (Anthropic Messages API)
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub anthropic_model: String,
    pub normalization_target_language: String,
    pub pipeline: PipelineConfig,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineServiceConfig>);

impl Config {
    fn inner(&self) -> &PipelineServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.inner().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn service_api_key(&self) -> Option<&str> {
        self.inner().service_api_key.as_deref()
    }

    pub fn master_api_key(&self) -> Option<&str> {
        self.inner().master_api_key.as_deref()
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner()
            .s3_region
            .as_deref()
            .or(self.inner().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_access_key_id(&self) -> Option<&str> {
        self.inner().aws_access_key_id.as_deref()
    }

    pub fn aws_secret_access_key(&self) -> Option<&str> {
        self.inner().aws_secret_access_key.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn assemblyai_api_key(&self) -> Option<&str> {
        self.inner().assemblyai_api_key.as_deref()
    }

    pub fn assemblyai_base_url(&self) -> &str {
        &self.inner().assemblyai_base_url
    }

    pub fn anthropic_api_key(&self) -> Option<&str> {
        self.inner().anthropic_api_key.as_deref()
    }

    pub fn anthropic_base_url(&self) -> &str {
        &self.inner().anthropic_base_url
    }

    pub fn anthropic_model(&self) -> &str {
        &self.inner().anthropic_model
    }

    pub fn normalization_target_language(&self) -> &str {
        &self.inner().normalization_target_language
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.inner().pipeline
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

impl PipelineServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_expiry_hours: env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| JWT_EXPIRY_HOURS.to_string())
                .parse()
                .unwrap_or(JWT_EXPIRY_HOURS),
            environment,
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|s| s.parse::<StorageBackend>().ok());

        Ok(PipelineServiceConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            service_api_key: env::var("SERVICE_API_KEY").ok(),
            master_api_key: env::var("MASTER_API_KEY").ok(),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            aws_access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            aws_secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            assemblyai_api_key: env::var("ASSEMBLYAI_API_KEY").ok(),
            assemblyai_base_url: env::var("ASSEMBLYAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ASSEMBLYAI_BASE_URL.to_string()),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_ANTHROPIC_BASE_URL.to_string()),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| DEFAULT_ANTHROPIC_MODEL.to_string()),
            normalization_target_language: env::var("NORMALIZATION_TARGET_LANGUAGE")
                .unwrap_or_else(|_| DEFAULT_TARGET_LANGUAGE.to_string()),
            pipeline: PipelineConfig::from_env(),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if matches!(self.service_api_key.as_deref(), Some(key) if key.len() < 32) {
            return Err(anyhow::anyhow!(
                "SERVICE_API_KEY must be at least 32 characters long"
            ));
        }

        if self.assemblyai_api_key.is_none() {
            return Err(anyhow::anyhow!(
                "ASSEMBLYAI_API_KEY must be set: transcription is required for every media record"
            ));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        self.pipeline.validate()
    }
}
