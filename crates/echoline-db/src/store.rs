//! Store abstractions used by the pipeline and the API
//!
//! The orchestrator and the retry/status operations only see these traits, so
//! they run unchanged against Postgres or the in-memory stores.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use echoline_core::models::{
    DerivedFields, MediaRecord, MediaType, OwnerRef, OwnerSnapshot, RetryPolicy,
};
use echoline_core::PipelineErrorCode;

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Applied,
    /// Target row is missing, deleted, or no longer held by the caller's claim;
    /// nothing was written.
    Skipped,
}

#[async_trait]
pub trait MediaRecordStore: Send + Sync {
    /// Atomically select and lease up to `limit` eligible records of `media_type`,
    /// oldest first. Concurrent callers never receive the same record.
    ///
    /// All records of one claim carry the same fresh `claim_token`; commit
    /// writes only land while the record still holds that token.
    async fn claim_eligible(
        &self,
        media_type: MediaType,
        limit: i64,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<Vec<MediaRecord>>;

    /// Commit stage outputs and mark the record `ready`.
    async fn persist_result(
        &self,
        id: Uuid,
        claim_token: Uuid,
        fields: &DerivedFields,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome>;

    /// Mark the record `failed`, increment `retry_count` and stamp `last_error_at`.
    async fn persist_failure(
        &self,
        id: Uuid,
        claim_token: Uuid,
        code: PipelineErrorCode,
        detail: &str,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome>;

    async fn mark_owner_synced(&self, id: Uuid, now: DateTime<Utc>) -> Result<()>;

    /// Ready records whose owner write has not succeeded yet.
    async fn list_unsynced_ready(&self, media_type: MediaType, limit: i64)
        -> Result<Vec<MediaRecord>>;

    /// Drop the lease of claimed records that were not processed. Records
    /// since taken over by another claim are left alone.
    async fn release_claims(&self, ids: &[Uuid], claim_token: Uuid) -> Result<u64>;

    /// Put a non-deleted record back to `uploaded`, clearing derived and error
    /// fields but keeping `retry_count`. `None` when missing or deleted.
    ///
    /// Revokes the current claim token so an in-flight worker cannot commit,
    /// but keeps an unexpired lease: the record becomes claimable again once
    /// that worker's lease runs out.
    async fn reset_for_retry(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<MediaRecord>>;

    async fn get(&self, id: Uuid) -> Result<Option<MediaRecord>>;

    /// All non-deleted records of one owner.
    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>>;

    /// Round trip to the backing store, for readiness checks.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait OwnerStore: Send + Sync {
    /// Look an owner up by id across all owner kinds.
    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<OwnerSnapshot>>;

    /// Mirror derived fields onto the owner and mark it `ready`.
    async fn write_derived(&self, owner: OwnerRef, fields: &DerivedFields)
        -> Result<PersistOutcome>;

    /// Clear the mirrored fields and put the owner back to `processing`.
    async fn reset_derived(&self, owner: OwnerRef) -> Result<PersistOutcome>;
}
