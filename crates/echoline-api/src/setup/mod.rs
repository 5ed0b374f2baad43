//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use echoline_core::Config;
use echoline_worker::PipelineScheduler;

use crate::state::AppState;

/// Everything the server needs to run.
pub struct App {
    pub state: Arc<AppState>,
    pub router: Router,
    /// Present when the in-process scheduler is enabled.
    pub scheduler: Option<PipelineScheduler>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    crate::telemetry::init_telemetry();

    // Fail fast on misconfiguration
    validation::validate_config(&config).context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let gateway = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, pool, gateway)?;
    let router = routes::setup_routes(&config, state.clone())?;

    let scheduler = if config.pipeline().scheduler_enabled {
        Some(PipelineScheduler::start(state.orchestrator.clone()))
    } else {
        tracing::info!("In-process pipeline scheduler disabled; waiting for external triggers");
        None
    };

    Ok(App {
        state,
        router,
        scheduler,
    })
}
