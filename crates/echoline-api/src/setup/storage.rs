//! Storage setup

use std::sync::Arc;

use anyhow::{Context, Result};
use echoline_core::Config;
use echoline_storage::{create_gateway, StorageGateway};

pub async fn setup_storage(config: &Config) -> Result<Arc<StorageGateway>> {
    let gateway = create_gateway(config)
        .await
        .context("Failed to initialize object storage")?;

    tracing::info!(
        providers = ?gateway.providers(),
        "Object storage gateway ready"
    );

    Ok(Arc::new(gateway))
}
