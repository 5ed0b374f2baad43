//! In-memory store implementations
//!
//! Behave like the Postgres repositories (same eligibility rule, same
//! claim-token and deleted-safety guards) without a database. Failure switches
//! let tests simulate an unreachable store or a failing owner write.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use echoline_core::models::{
    DerivedFields, MediaRecord, MediaStatus, MediaType, OwnerRef, OwnerSnapshot,
    ProcessingStatus, RetryPolicy,
};
use echoline_core::PipelineErrorCode;

use crate::store::{MediaRecordStore, OwnerStore, PersistOutcome};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))
}

#[derive(Clone, Default)]
pub struct InMemoryMediaStore {
    records: Arc<Mutex<HashMap<Uuid, MediaRecord>>>,
    unavailable: Arc<AtomicBool>,
    failing_writes: Arc<Mutex<HashSet<Uuid>>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: MediaRecord) -> Result<()> {
        lock(&self.records)?.insert(record.id, record);
        Ok(())
    }

    pub fn snapshot(&self, id: Uuid) -> Option<MediaRecord> {
        lock(&self.records).ok()?.get(&id).cloned()
    }

    pub fn all(&self) -> Vec<MediaRecord> {
        lock(&self.records)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Mark a record deleted, as the external administrative action does.
    pub fn delete(&self, id: Uuid) -> Result<()> {
        if let Some(record) = lock(&self.records)?.get_mut(&id) {
            record.status = MediaStatus::Deleted;
        }
        Ok(())
    }

    /// Make every operation fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make result/failure writes for one record fail.
    pub fn fail_writes_for(&self, id: Uuid) -> Result<()> {
        lock(&self.failing_writes)?.insert(id);
        Ok(())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("media record store unavailable"));
        }
        Ok(())
    }

    fn check_writable(&self, id: Uuid) -> Result<()> {
        self.check_available()?;
        if lock(&self.failing_writes)?.contains(&id) {
            return Err(anyhow::anyhow!("write to media record {} failed", id));
        }
        Ok(())
    }
}

/// The record, if it is live and still held by `claim_token`.
fn held_by(
    records: &mut HashMap<Uuid, MediaRecord>,
    id: Uuid,
    claim_token: Uuid,
) -> Option<&mut MediaRecord> {
    records
        .get_mut(&id)
        .filter(|r| !r.is_deleted() && r.claim_token == Some(claim_token))
}

#[async_trait]
impl MediaRecordStore for InMemoryMediaStore {
    async fn claim_eligible(
        &self,
        media_type: MediaType,
        limit: i64,
        now: DateTime<Utc>,
        policy: &RetryPolicy,
    ) -> Result<Vec<MediaRecord>> {
        self.check_available()?;
        let mut records = lock(&self.records)?;

        let mut candidates: Vec<(DateTime<Utc>, Uuid)> = records
            .values()
            .filter(|r| r.media_type == media_type && policy.is_eligible(r, now))
            .map(|r| (r.created_at, r.id))
            .collect();
        candidates.sort();
        candidates.truncate(limit.max(0) as usize);

        let claim_token = Uuid::new_v4();
        let mut claimed = Vec::with_capacity(candidates.len());
        for (_, id) in candidates {
            if let Some(record) = records.get_mut(&id) {
                record.claim_expires_at = Some(now + policy.lease());
                record.claim_token = Some(claim_token);
                record.last_attempt_at = Some(now);
                record.updated_at = now;
                claimed.push(record.clone());
            }
        }
        Ok(claimed)
    }

    async fn persist_result(
        &self,
        id: Uuid,
        claim_token: Uuid,
        fields: &DerivedFields,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome> {
        self.check_writable(id)?;
        let mut records = lock(&self.records)?;
        let Some(record) = held_by(&mut records, id, claim_token) else {
            return Ok(PersistOutcome::Skipped);
        };
        record.status = MediaStatus::Ready;
        record.transcript_text = Some(fields.transcript_text.clone());
        record.transcript_confidence = fields.transcript_confidence;
        record.original_language = fields.original_language.clone();
        record.language_confidence = fields.language_confidence;
        record.normalized_text = Some(fields.normalized_text.clone());
        record.normalized_language = fields.normalized_language.clone();
        record.sentiment = fields.sentiment;
        record.error_code = None;
        record.error_detail = None;
        record.claim_expires_at = None;
        record.claim_token = None;
        record.owner_synced_at = None;
        record.updated_at = now;
        Ok(PersistOutcome::Applied)
    }

    async fn persist_failure(
        &self,
        id: Uuid,
        claim_token: Uuid,
        code: PipelineErrorCode,
        detail: &str,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome> {
        self.check_writable(id)?;
        let mut records = lock(&self.records)?;
        let Some(record) = held_by(&mut records, id, claim_token) else {
            return Ok(PersistOutcome::Skipped);
        };
        record.status = MediaStatus::Failed;
        record.error_code = Some(code);
        record.error_detail = Some(detail.to_string());
        record.retry_count += 1;
        record.last_error_at = Some(now);
        record.claim_expires_at = None;
        record.claim_token = None;
        record.updated_at = now;
        Ok(PersistOutcome::Applied)
    }

    async fn mark_owner_synced(&self, id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.check_available()?;
        if let Some(record) = lock(&self.records)?
            .get_mut(&id)
            .filter(|r| r.status == MediaStatus::Ready)
        {
            record.owner_synced_at = Some(now);
        }
        Ok(())
    }

    async fn list_unsynced_ready(
        &self,
        media_type: MediaType,
        limit: i64,
    ) -> Result<Vec<MediaRecord>> {
        self.check_available()?;
        let records = lock(&self.records)?;
        let mut unsynced: Vec<MediaRecord> = records
            .values()
            .filter(|r| {
                r.media_type == media_type
                    && r.status == MediaStatus::Ready
                    && r.owner_synced_at.is_none()
            })
            .cloned()
            .collect();
        unsynced.sort_by_key(|r| r.updated_at);
        unsynced.truncate(limit.max(0) as usize);
        Ok(unsynced)
    }

    async fn release_claims(&self, ids: &[Uuid], claim_token: Uuid) -> Result<u64> {
        self.check_available()?;
        let mut records = lock(&self.records)?;
        let mut released = 0;
        for id in ids {
            if let Some(record) = records
                .get_mut(id)
                .filter(|r| r.claim_token == Some(claim_token))
            {
                record.claim_expires_at = None;
                record.claim_token = None;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn reset_for_retry(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<MediaRecord>> {
        self.check_available()?;
        let mut records = lock(&self.records)?;
        let Some(record) = records.get_mut(&id).filter(|r| !r.is_deleted()) else {
            return Ok(None);
        };
        record.status = MediaStatus::Uploaded;
        record.transcript_text = None;
        record.transcript_confidence = None;
        record.original_language = None;
        record.language_confidence = None;
        record.normalized_text = None;
        record.normalized_language = None;
        record.sentiment = None;
        record.error_code = None;
        record.error_detail = None;
        record.last_error_at = None;
        record.claim_token = None;
        record.owner_synced_at = None;
        record.updated_at = now;
        Ok(Some(record.clone()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaRecord>> {
        self.check_available()?;
        Ok(lock(&self.records)?.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>> {
        self.check_available()?;
        let mut found: Vec<MediaRecord> = lock(&self.records)?
            .values()
            .filter(|r| r.owner_id == owner_id && !r.is_deleted())
            .cloned()
            .collect();
        found.sort_by_key(|r| r.media_type == MediaType::Video);
        Ok(found)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

/// Owner row as the pipeline sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerRow {
    pub owner: OwnerRef,
    pub processing_status: ProcessingStatus,
    pub fields: Option<DerivedFields>,
}

#[derive(Clone, Default)]
pub struct InMemoryOwnerStore {
    owners: Arc<Mutex<HashMap<Uuid, OwnerRow>>>,
    failing_writes: Arc<Mutex<HashSet<Uuid>>>,
}

impl InMemoryOwnerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner: OwnerRef) -> Result<()> {
        lock(&self.owners)?.insert(
            owner.id(),
            OwnerRow {
                owner,
                processing_status: ProcessingStatus::Processing,
                fields: None,
            },
        );
        Ok(())
    }

    pub fn snapshot(&self, owner_id: Uuid) -> Option<OwnerRow> {
        lock(&self.owners).ok()?.get(&owner_id).cloned()
    }

    /// Make derived-field writes to one owner fail.
    pub fn fail_writes_for(&self, owner_id: Uuid) -> Result<()> {
        lock(&self.failing_writes)?.insert(owner_id);
        Ok(())
    }

    pub fn clear_failures(&self) -> Result<()> {
        lock(&self.failing_writes)?.clear();
        Ok(())
    }

    fn check_writable(&self, owner_id: Uuid) -> Result<()> {
        if lock(&self.failing_writes)?.contains(&owner_id) {
            return Err(anyhow::anyhow!("write to owner {} failed", owner_id));
        }
        Ok(())
    }
}

#[async_trait]
impl OwnerStore for InMemoryOwnerStore {
    async fn find_owner(&self, owner_id: Uuid) -> Result<Option<OwnerSnapshot>> {
        Ok(lock(&self.owners)?.get(&owner_id).map(|row| OwnerSnapshot {
            owner: row.owner,
            processing_status: row.processing_status,
        }))
    }

    async fn write_derived(
        &self,
        owner: OwnerRef,
        fields: &DerivedFields,
    ) -> Result<PersistOutcome> {
        self.check_writable(owner.id())?;
        let mut owners = lock(&self.owners)?;
        let Some(row) = owners.get_mut(&owner.id()).filter(|r| r.owner == owner) else {
            return Ok(PersistOutcome::Skipped);
        };
        row.processing_status = ProcessingStatus::Ready;
        row.fields = Some(fields.clone());
        Ok(PersistOutcome::Applied)
    }

    async fn reset_derived(&self, owner: OwnerRef) -> Result<PersistOutcome> {
        self.check_writable(owner.id())?;
        let mut owners = lock(&self.owners)?;
        let Some(row) = owners.get_mut(&owner.id()).filter(|r| r.owner == owner) else {
            return Ok(PersistOutcome::Skipped);
        };
        row.processing_status = ProcessingStatus::Processing;
        row.fields = None;
        Ok(PersistOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use echoline_core::StorageBackend;

    fn uploaded(media_type: MediaType, created_at: DateTime<Utc>) -> MediaRecord {
        MediaRecord::uploaded(
            OwnerRef::Feedback(Uuid::new_v4()),
            media_type,
            StorageBackend::Local,
            "k",
            "audio/mpeg",
            created_at,
        )
    }

    #[tokio::test]
    async fn claim_orders_by_creation_and_respects_limit() {
        let store = InMemoryMediaStore::new();
        let now = Utc::now();
        let oldest = uploaded(MediaType::Audio, now - Duration::minutes(3));
        let middle = uploaded(MediaType::Audio, now - Duration::minutes(2));
        let newest = uploaded(MediaType::Audio, now - Duration::minutes(1));
        for r in [&newest, &oldest, &middle] {
            store.insert(r.clone()).unwrap();
        }

        let claimed = store
            .claim_eligible(MediaType::Audio, 2, now, &RetryPolicy::default())
            .await
            .unwrap();
        let ids: Vec<_> = claimed.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![oldest.id, middle.id]);
    }

    #[tokio::test]
    async fn claimed_records_are_not_claimed_twice() {
        let store = InMemoryMediaStore::new();
        let now = Utc::now();
        store.insert(uploaded(MediaType::Video, now)).unwrap();
        let policy = RetryPolicy::default();

        let first = store
            .claim_eligible(MediaType::Video, 10, now, &policy)
            .await
            .unwrap();
        let second = store
            .claim_eligible(MediaType::Video, 10, now, &policy)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn writes_to_deleted_records_are_skipped() {
        let store = InMemoryMediaStore::new();
        let now = Utc::now();
        let record = uploaded(MediaType::Audio, now);
        let id = record.id;
        store.insert(record).unwrap();
        let claimed = store
            .claim_eligible(MediaType::Audio, 1, now, &RetryPolicy::default())
            .await
            .unwrap();
        let token = claimed[0].claim_token.unwrap();
        store.delete(id).unwrap();

        let outcome = store
            .persist_failure(id, token, PipelineErrorCode::TranscriptionFailed, "x", now)
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Skipped);
        let stored = store.snapshot(id).unwrap();
        assert_eq!(stored.status, MediaStatus::Deleted);
        assert_eq!(stored.retry_count, 0);
    }

    #[tokio::test]
    async fn unavailable_store_fails_claims() {
        let store = InMemoryMediaStore::new();
        store.set_unavailable(true);
        let result = store
            .claim_eligible(MediaType::Audio, 1, Utc::now(), &RetryPolicy::default())
            .await;
        assert!(result.is_err());
    }

    fn fields(text: &str) -> DerivedFields {
        DerivedFields {
            transcript_text: text.to_string(),
            transcript_confidence: None,
            original_language: None,
            language_confidence: None,
            normalized_text: text.to_string(),
            normalized_language: None,
            sentiment: None,
        }
    }

    #[tokio::test]
    async fn retry_revokes_claim_but_keeps_live_lease() {
        let store = InMemoryMediaStore::new();
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let record = uploaded(MediaType::Audio, now);
        let id = record.id;
        store.insert(record).unwrap();

        let first = store
            .claim_eligible(MediaType::Audio, 10, now, &policy)
            .await
            .unwrap();
        let stale_token = first[0].claim_token.unwrap();

        let reset = store.reset_for_retry(id, now).await.unwrap().unwrap();
        assert_eq!(reset.status, MediaStatus::Uploaded);
        assert!(reset.claim_token.is_none());
        assert_eq!(reset.claim_expires_at, first[0].claim_expires_at);

        // Still leased to the first worker.
        let while_leased = store
            .claim_eligible(MediaType::Audio, 10, now, &policy)
            .await
            .unwrap();
        assert!(while_leased.is_empty());

        let outcome = store
            .persist_result(id, stale_token, &fields("stale"), now)
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Skipped);
        let stored = store.snapshot(id).unwrap();
        assert_eq!(stored.status, MediaStatus::Uploaded);
        assert!(stored.transcript_text.is_none());
    }

    #[tokio::test]
    async fn superseded_claim_cannot_commit_or_release() {
        let store = InMemoryMediaStore::new();
        let policy = RetryPolicy::default();
        let now = Utc::now();
        let record = uploaded(MediaType::Video, now);
        let id = record.id;
        store.insert(record).unwrap();

        let first = store
            .claim_eligible(MediaType::Video, 10, now, &policy)
            .await
            .unwrap();
        let stale_token = first[0].claim_token.unwrap();

        let after_expiry = now + policy.lease() + Duration::seconds(1);
        let second = store
            .claim_eligible(MediaType::Video, 10, after_expiry, &policy)
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        let live_token = second[0].claim_token.unwrap();
        assert_ne!(stale_token, live_token);

        let stale_failure = store
            .persist_failure(
                id,
                stale_token,
                PipelineErrorCode::StorageUnavailable,
                "x",
                after_expiry,
            )
            .await
            .unwrap();
        assert_eq!(stale_failure, PersistOutcome::Skipped);
        assert_eq!(store.release_claims(&[id], stale_token).await.unwrap(), 0);

        let stored = store.snapshot(id).unwrap();
        assert_eq!(stored.claim_token, Some(live_token));
        assert_eq!(stored.retry_count, 0);

        let outcome = store
            .persist_result(id, live_token, &fields("heard"), after_expiry)
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Applied);
        let stored = store.snapshot(id).unwrap();
        assert_eq!(stored.status, MediaStatus::Ready);
        assert!(stored.claim_token.is_none());
        assert!(stored.claim_expires_at.is_none());
    }
}
