//! Route configuration and setup.
//!
//! Three groups: public (status, health, docs), user-authenticated (retry,
//! download) and internal (scheduler trigger, service key only).

mod health;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use echoline_core::constants::API_PREFIX;
use echoline_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::api_doc::ApiDoc;
use crate::auth::middleware::{auth_middleware, service_auth_middleware, AuthState};
use crate::handlers;
use crate::state::AppState;

/// No route accepts a body; keep the limit small.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config);
    let auth_state = Arc::new(AuthState::from_config(config));

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness_check))
        .route("/health/ready", get(health::readiness_check))
        .route(
            &format!("{}/owners/{{owner_id}}/media-status", API_PREFIX),
            get(handlers::status::get_media_status),
        )
        .route(
            "/api/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );

    let protected_routes = Router::new()
        .route(
            &format!("{}/media/{{id}}/retry", API_PREFIX),
            post(handlers::retry::retry_media),
        )
        .route(
            &format!("{}/media/{{id}}/file", API_PREFIX),
            get(handlers::download::download_media),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ));

    let internal_routes = Router::new()
        .route(
            &format!("{}/internal/media-pipeline/run", API_PREFIX),
            post(handlers::pipeline::run_pipeline),
        )
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            service_auth_middleware,
        ));

    // Server-level concurrency limit against resource exhaustion under load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_000)
        .max(1);
    tracing::info!(http_concurrency_limit, "HTTP concurrency limit layer enabled");

    let app = public_routes
        .merge(protected_routes)
        .merge(internal_routes)
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}
