use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use echoline_core::models::{DerivedFields, MediaRecord, MediaType, RetryPolicy};
use echoline_core::PipelineErrorCode;

use crate::store::{MediaRecordStore, PersistOutcome};

const MEDIA_COLUMNS: &str = r#"
    id, owner_type, owner_id, media_type, storage_provider, storage_key, mime_type,
    size_bytes, duration_ms, status, transcript_text, transcript_confidence,
    original_language, language_confidence, normalized_text, normalized_language,
    sentiment, error_code, error_detail, retry_count, last_attempt_at, last_error_at,
    claim_expires_at, claim_token, owner_synced_at, created_at, updated_at
"#;

#[derive(Clone)]
pub struct MediaRecordRepository {
    pool: PgPool,
}

impl MediaRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a record as the upload flow would. Used for seeding and tests.
    #[tracing::instrument(skip(self, record), fields(media_id = %record.id))]
    pub async fn insert(&self, record: &MediaRecord) -> Result<MediaRecord> {
        let sql = format!(
            r#"
            INSERT INTO media_records (
                id, owner_type, owner_id, media_type, storage_provider, storage_key,
                mime_type, size_bytes, duration_ms, status, retry_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {MEDIA_COLUMNS}
            "#
        );
        sqlx::query_as::<Postgres, MediaRecord>(&sql)
            .bind(record.id)
            .bind(record.owner_type)
            .bind(record.owner_id)
            .bind(record.media_type)
            .bind(record.storage_provider)
            .bind(&record.storage_key)
            .bind(&record.mime_type)
            .bind(record.size_bytes)
            .bind(record.duration_ms)
            .bind(record.status)
            .bind(record.retry_count)
            .bind(record.created_at)
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert media record")
    }
}

#[async_trait]
impl MediaRecordStore for MediaRecordRepository {
    /// Claim eligible records for one media type.
    ///
    /// Rows are locked with FOR UPDATE SKIP LOCKED inside a transaction, so a
    /// concurrent invocation skips them instead of blocking, then leased and
    /// tagged with a fresh claim token before commit. A crashed worker's lease
    /// simply expires.
    #[tracing::instrument(skip(self, policy))]
    async fn claim_eligible(
        &self,
        media_type: MediaType,
        limit: i64,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<Vec<MediaRecord>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        // Backoff mirrors RetryPolicy::backoff_secs: min(base * 2^(n-1), cap), exponent capped at 30.
        let ids: Vec<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            SELECT id
            FROM media_records
            WHERE media_type = $1
                AND (claim_expires_at IS NULL OR claim_expires_at <= $2)
                AND (
                    status = 'uploaded'
                    OR (
                        status = 'failed'
                        AND ($5::INTEGER IS NULL OR retry_count < $5)
                        AND COALESCE(last_error_at, updated_at)
                            + LEAST(
                                $3::DOUBLE PRECISION
                                    * POWER(2::DOUBLE PRECISION, LEAST(GREATEST(retry_count - 1, 0), 30)),
                                $4::DOUBLE PRECISION
                            ) * INTERVAL '1 second'
                            <= $2
                    )
                )
            ORDER BY created_at ASC
            LIMIT $6
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(media_type)
        .bind(now)
        .bind(policy.base_delay_secs.max(0) as f64)
        .bind(policy.max_delay_secs.max(0) as f64)
        .bind(policy.max_retries)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to select claimable media records")?;

        if ids.is_empty() {
            tx.commit().await.context("Failed to commit transaction")?;
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            UPDATE media_records
            SET claim_expires_at = $2,
                claim_token = $4,
                last_attempt_at = $3,
                updated_at = $3
            WHERE id = ANY($1)
            RETURNING {MEDIA_COLUMNS}
            "#
        );
        let mut claimed: Vec<MediaRecord> = sqlx::query_as::<Postgres, MediaRecord>(&sql)
            .bind(&ids)
            .bind(now + policy.lease())
            .bind(now)
            .bind(Uuid::new_v4())
            .fetch_all(&mut *tx)
            .await
            .context("Failed to lease media records")?;

        tx.commit().await.context("Failed to commit claim")?;

        claimed.sort_by_key(|r| r.created_at);
        tracing::debug!(count = claimed.len(), "Claimed media records");
        Ok(claimed)
    }

    #[tracing::instrument(skip(self, fields))]
    async fn persist_result(
        &self,
        id: Uuid,
        claim_token: Uuid,
        fields: &DerivedFields,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE media_records
            SET status = 'ready',
                transcript_text = $2,
                transcript_confidence = $3,
                original_language = $4,
                language_confidence = $5,
                normalized_text = $6,
                normalized_language = $7,
                sentiment = $8,
                error_code = NULL,
                error_detail = NULL,
                claim_expires_at = NULL,
                claim_token = NULL,
                owner_synced_at = NULL,
                updated_at = $9
            WHERE id = $1 AND claim_token = $10 AND status <> 'deleted'
            "#,
        )
        .bind(id)
        .bind(&fields.transcript_text)
        .bind(fields.transcript_confidence)
        .bind(&fields.original_language)
        .bind(fields.language_confidence)
        .bind(&fields.normalized_text)
        .bind(&fields.normalized_language)
        .bind(fields.sentiment.map(|s| s.to_string()))
        .bind(now)
        .bind(claim_token)
        .execute(&self.pool)
        .await
        .context("Failed to persist media result")?;

        Ok(outcome(result.rows_affected()))
    }

    #[tracing::instrument(skip(self, detail))]
    async fn persist_failure(
        &self,
        id: Uuid,
        claim_token: Uuid,
        code: PipelineErrorCode,
        detail: &str,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome> {
        let result = sqlx::query(
            r#"
            UPDATE media_records
            SET status = 'failed',
                error_code = $2,
                error_detail = $3,
                retry_count = retry_count + 1,
                last_error_at = $4,
                claim_expires_at = NULL,
                claim_token = NULL,
                updated_at = $4
            WHERE id = $1 AND claim_token = $5 AND status <> 'deleted'
            "#,
        )
        .bind(id)
        .bind(code.as_str())
        .bind(detail)
        .bind(now)
        .bind(claim_token)
        .execute(&self.pool)
        .await
        .context("Failed to persist media failure")?;

        Ok(outcome(result.rows_affected()))
    }

    #[tracing::instrument(skip(self))]
    async fn mark_owner_synced(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE media_records
            SET owner_synced_at = $2
            WHERE id = $1 AND status = 'ready'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to mark owner synced")?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_unsynced_ready(
        &self,
        media_type: MediaType,
        limit: i64,
    ) -> Result<Vec<MediaRecord>> {
        let sql = format!(
            r#"
            SELECT {MEDIA_COLUMNS}
            FROM media_records
            WHERE media_type = $1
                AND status = 'ready'
                AND owner_synced_at IS NULL
            ORDER BY updated_at ASC
            LIMIT $2
            "#
        );
        sqlx::query_as::<Postgres, MediaRecord>(&sql)
            .bind(media_type)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list unsynced media records")
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn release_claims(&self, ids: &[Uuid], claim_token: Uuid) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE media_records
            SET claim_expires_at = NULL,
                claim_token = NULL
            WHERE id = ANY($1) AND claim_token = $2
            "#,
        )
        .bind(ids)
        .bind(claim_token)
        .execute(&self.pool)
        .await
        .context("Failed to release media claims")?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self))]
    async fn reset_for_retry(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<MediaRecord>> {
        let sql = format!(
            r#"
            UPDATE media_records
            SET status = 'uploaded',
                transcript_text = NULL,
                transcript_confidence = NULL,
                original_language = NULL,
                language_confidence = NULL,
                normalized_text = NULL,
                normalized_language = NULL,
                sentiment = NULL,
                error_code = NULL,
                error_detail = NULL,
                last_error_at = NULL,
                claim_token = NULL,
                owner_synced_at = NULL,
                updated_at = $2
            WHERE id = $1 AND status <> 'deleted'
            RETURNING {MEDIA_COLUMNS}
            "#
        );
        let record = sqlx::query_as::<Postgres, MediaRecord>(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to reset media record for retry")?;

        if record.is_some() {
            tracing::info!(media_id = %id, "Media record manually retried");
        }
        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<Option<MediaRecord>> {
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media_records WHERE id = $1");
        sqlx::query_as::<Postgres, MediaRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get media record")
    }

    #[tracing::instrument(skip(self))]
    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>> {
        let sql = format!(
            r#"
            SELECT {MEDIA_COLUMNS}
            FROM media_records
            WHERE owner_id = $1 AND status <> 'deleted'
            ORDER BY media_type
            "#
        );
        sqlx::query_as::<Postgres, MediaRecord>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list media records for owner")
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }
}

fn outcome(rows_affected: u64) -> PersistOutcome {
    if rows_affected == 0 {
        PersistOutcome::Skipped
    } else {
        PersistOutcome::Applied
    }
}
