//! Configuration validation
//!
//! Startup checks on top of `Config::validate` that only matter to the HTTP process.

use anyhow::Result;
use echoline_core::Config;

const MIN_KEY_LENGTH: usize = 32;

/// Validate critical configuration values, failing fast on security problems.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.is_production() && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Set explicit origins via CORS_ORIGINS."
        ));
    }

    if matches!(config.master_api_key(), Some(key) if key.len() < MIN_KEY_LENGTH) {
        return Err(anyhow::anyhow!(
            "MASTER_API_KEY must be at least {} characters long",
            MIN_KEY_LENGTH
        ));
    }

    if config.service_api_key().is_none() {
        if config.pipeline().scheduler_enabled {
            tracing::info!("SERVICE_API_KEY not set: external pipeline trigger disabled");
        } else {
            tracing::warn!(
                "SERVICE_API_KEY not set and in-process scheduler disabled: no media will be processed"
            );
        }
    }

    if config.db_max_connections() == 0 {
        return Err(anyhow::anyhow!("Database max connections cannot be 0"));
    }

    // Each batch item holds a connection during commit.
    let concurrency = config.pipeline().max_concurrency as u32;
    if concurrency * 2 > config.db_max_connections() {
        tracing::warn!(
            max_concurrency = concurrency,
            db_max_connections = config.db_max_connections(),
            "Two concurrent batches may exhaust the database pool"
        );
    }

    Ok(())
}
