//! Manual retry of a single media record.

use std::sync::Arc;

use uuid::Uuid;

use echoline_core::models::{Caller, MediaRecord};
use echoline_core::{AppError, Clock};
use echoline_db::{MediaRecordStore, OwnerStore, PersistOutcome};

#[derive(Clone)]
pub struct RetryService {
    media: Arc<dyn MediaRecordStore>,
    owners: Arc<dyn OwnerStore>,
    clock: Arc<dyn Clock>,
}

impl RetryService {
    pub fn new(
        media: Arc<dyn MediaRecordStore>,
        owners: Arc<dyn OwnerStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            media,
            owners,
            clock,
        }
    }

    /// Put a non-deleted record back in the pending queue, bypassing backoff.
    ///
    /// Clears every derived and error field of the record and of its owner;
    /// `retry_count` keeps accumulating. Calling it twice leaves the same state.
    /// A record being processed right now keeps its lease, and the running
    /// worker's result is dropped; it is picked up again once the lease expires.
    #[tracing::instrument(skip(self, caller), fields(media_id = %id))]
    pub async fn retry(&self, id: Uuid, caller: Option<&Caller>) -> Result<MediaRecord, AppError> {
        let caller = caller
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
        if !caller.role.can_retry_media() {
            return Err(AppError::Forbidden(format!(
                "Role '{}' cannot retry media processing",
                caller.role
            )));
        }

        let existing = self
            .media
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media record {} not found", id)))?;
        if existing.is_deleted() {
            return Err(deleted(id));
        }

        // Deleted between the lookup and the reset.
        let record = self
            .media
            .reset_for_retry(id, self.clock.now())
            .await?
            .ok_or_else(|| deleted(id))?;

        // The media reset already landed; the next commit rewrites the owner.
        match self.owners.reset_derived(record.owner()).await {
            Ok(PersistOutcome::Applied) => {}
            Ok(PersistOutcome::Skipped) => {
                tracing::warn!(owner = %record.owner(), "Owner record not found while resetting for retry");
            }
            Err(e) => {
                tracing::error!(owner = %record.owner(), error = %e, "Failed to reset owner for retry");
            }
        }

        tracing::info!(
            user_id = %caller.user_id,
            role = %caller.role,
            retry_count = record.retry_count,
            "Media record queued for reprocessing"
        );
        Ok(record)
    }
}

fn deleted(id: Uuid) -> AppError {
    AppError::Gone(format!("Media record {} has been deleted", id))
}
