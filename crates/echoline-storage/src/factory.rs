#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageGateway, StorageResult};
use echoline_core::Config;
use std::sync::Arc;

/// Create the configured storage backend
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend().unwrap_or(StorageBackend::S3);

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let storage = S3Storage::new(bucket, region, endpoint).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

/// Build the gateway: the configured backend, plus local storage when a
/// `LOCAL_STORAGE_PATH` is set alongside S3 (records migrated from disk).
pub async fn create_gateway(config: &Config) -> StorageResult<StorageGateway> {
    let primary = create_storage(config).await?;
    let primary_type = primary.backend_type();
    let mut gateway = StorageGateway::new().with_backend(primary);

    if primary_type != StorageBackend::Local {
        if let Some(local) = secondary_local(config).await? {
            gateway = gateway.with_backend(local);
        }
    }

    tracing::debug!(providers = ?gateway.providers(), "Storage gateway ready");
    Ok(gateway)
}

#[cfg(feature = "storage-local")]
async fn secondary_local(config: &Config) -> StorageResult<Option<Arc<dyn Storage>>> {
    match config.local_storage_path() {
        Some(path) => {
            let local: Arc<dyn Storage> = Arc::new(LocalStorage::new(path).await?);
            Ok(Some(local))
        }
        None => Ok(None),
    }
}

#[cfg(not(feature = "storage-local"))]
async fn secondary_local(_config: &Config) -> StorageResult<Option<Arc<dyn Storage>>> {
    Ok(None)
}
