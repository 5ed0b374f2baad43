//! Provider-aware storage lookup
//!
//! Media records name the provider their object lives in. The gateway holds one
//! backend per configured provider and resolves `(provider, key)` pairs.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;

#[derive(Clone, Default)]
pub struct StorageGateway {
    backends: HashMap<StorageBackend, Arc<dyn Storage>>,
}

impl StorageGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under the provider it reports.
    pub fn with_backend(mut self, storage: Arc<dyn Storage>) -> Self {
        self.backends.insert(storage.backend_type(), storage);
        self
    }

    pub fn backend_for(&self, provider: StorageBackend) -> StorageResult<&Arc<dyn Storage>> {
        self.backends.get(&provider).ok_or_else(|| {
            StorageError::ConfigError(format!("No storage backend configured for {}", provider))
        })
    }

    pub fn providers(&self) -> Vec<StorageBackend> {
        let mut providers: Vec<_> = self.backends.keys().copied().collect();
        providers.sort_by_key(|p| p.to_string());
        providers
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, provider: StorageBackend, storage_key: &str) -> StorageResult<Bytes> {
        self.backend_for(provider)?.download(storage_key).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve_stream(
        &self,
        provider: StorageBackend,
        storage_key: &str,
    ) -> StorageResult<ByteStream> {
        self.backend_for(provider)?.download_stream(storage_key).await
    }
}
