use std::sync::Arc;

use uuid::Uuid;

use echoline_core::models::{MediaStatusView, MediaType, OwnerMediaStatus};
use echoline_core::AppError;
use echoline_db::{MediaRecordStore, OwnerStore};

/// Read-only processing status of an owner's media. Never exposes content.
#[derive(Clone)]
pub struct StatusService {
    media: Arc<dyn MediaRecordStore>,
    owners: Arc<dyn OwnerStore>,
}

impl StatusService {
    pub fn new(media: Arc<dyn MediaRecordStore>, owners: Arc<dyn OwnerStore>) -> Self {
        Self { media, owners }
    }

    #[tracing::instrument(skip(self))]
    pub async fn status(&self, owner_id: Uuid) -> Result<OwnerMediaStatus, AppError> {
        let owner = self
            .owners
            .find_owner(owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Owner {} not found", owner_id)))?;

        let records = self.media.find_by_owner(owner_id).await?;
        let view_for = |media_type: MediaType| {
            records
                .iter()
                .find(|r| r.media_type == media_type && !r.is_deleted())
                .map(MediaStatusView::from)
        };

        Ok(OwnerMediaStatus {
            owner_id,
            owner_type: owner.owner.owner_type(),
            processing_status: owner.processing_status,
            audio: view_for(MediaType::Audio),
            video: view_for(MediaType::Video),
        })
    }
}
