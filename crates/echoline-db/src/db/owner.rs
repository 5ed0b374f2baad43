use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use echoline_core::models::{DerivedFields, OwnerRef, OwnerSnapshot, OwnerType, ProcessingStatus};

use crate::store::{OwnerStore, PersistOutcome};

const OWNER_TYPES: [OwnerType; 2] = [OwnerType::SurveyResponse, OwnerType::Feedback];

/// Table holding each owner kind. Adding an owner kind means adding a row here.
fn owner_table(owner_type: OwnerType) -> &'static str {
    match owner_type {
        OwnerType::SurveyResponse => "survey_responses",
        OwnerType::Feedback => "feedback_entries",
    }
}

/// Writes the pipeline-owned columns of survey responses and feedback entries.
#[derive(Clone)]
pub struct OwnerRepository {
    pool: PgPool,
}

impl OwnerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an empty owner row. Used for seeding and tests.
    #[tracing::instrument(skip(self))]
    pub async fn insert(&self, owner: OwnerRef) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, processing_status) VALUES ($1, 'processing')",
            owner_table(owner.owner_type())
        );
        sqlx::query(&sql)
            .bind(owner.id())
            .execute(&self.pool)
            .await
            .context("Failed to insert owner record")?;
        Ok(())
    }
}

#[async_trait]
impl OwnerStore for OwnerRepository {
    #[tracing::instrument(skip(self))]
    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<OwnerSnapshot>> {
        for owner_type in OWNER_TYPES {
            let sql = format!(
                "SELECT processing_status FROM {} WHERE id = $1",
                owner_table(owner_type)
            );
            let status = sqlx::query_scalar::<Postgres, ProcessingStatus>(&sql)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("Failed to look up {}", owner_type))?;

            if let Some(processing_status) = status {
                return Ok(Some(OwnerSnapshot {
                    owner: OwnerRef::new(owner_type, owner_id),
                    processing_status,
                }));
            }
        }
        Ok(None)
    }

    #[tracing::instrument(skip(self, fields), fields(owner = %owner))]
    async fn write_derived(
        &self,
        owner: OwnerRef,
        fields: &DerivedFields,
    ) -> Result<PersistOutcome> {
        let sql = format!(
            r#"
            UPDATE {}
            SET processing_status = 'ready',
                transcript_text = $2,
                transcript_confidence = $3,
                original_language = $4,
                language_confidence = $5,
                normalized_text = $6,
                normalized_language = $7,
                sentiment = $8,
                updated_at = NOW()
            WHERE id = $1
            "#,
            owner_table(owner.owner_type())
        );
        let result = sqlx::query(&sql)
            .bind(owner.id())
            .bind(&fields.transcript_text)
            .bind(fields.transcript_confidence)
            .bind(&fields.original_language)
            .bind(fields.language_confidence)
            .bind(&fields.normalized_text)
            .bind(&fields.normalized_language)
            .bind(fields.sentiment.map(|s| s.to_string()))
            .execute(&self.pool)
            .await
            .context("Failed to write derived fields to owner")?;

        if result.rows_affected() == 0 {
            tracing::warn!(owner = %owner, "Owner record not found while committing media result");
            return Ok(PersistOutcome::Skipped);
        }
        Ok(PersistOutcome::Applied)
    }

    #[tracing::instrument(skip(self), fields(owner = %owner))]
    async fn reset_derived(&self, owner: OwnerRef) -> Result<PersistOutcome> {
        let sql = format!(
            r#"
            UPDATE {}
            SET processing_status = 'processing',
                transcript_text = NULL,
                transcript_confidence = NULL,
                original_language = NULL,
                language_confidence = NULL,
                normalized_text = NULL,
                normalized_language = NULL,
                sentiment = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
            owner_table(owner.owner_type())
        );
        let result = sqlx::query(&sql)
            .bind(owner.id())
            .execute(&self.pool)
            .await
            .context("Failed to reset owner derived fields")?;

        if result.rows_affected() == 0 {
            return Ok(PersistOutcome::Skipped);
        }
        Ok(PersistOutcome::Applied)
    }
}
