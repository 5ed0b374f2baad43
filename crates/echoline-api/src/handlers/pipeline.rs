//! Scheduler trigger: one orchestrator invocation per call.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use echoline_core::models::{BatchResult, MediaType};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{ErrorResponse, ValidatedQuery};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct RunPipelineQuery {
    pub media_type: MediaType,
    /// Defaults to the configured batch limit for the media type.
    #[validate(range(min = 1))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RunPipelineResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<BatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v0/internal/media-pipeline/run",
    tag = "pipeline",
    params(RunPipelineQuery),
    responses(
        (status = 200, description = "Batch processed", body = RunPipelineResponse),
        (status = 400, description = "Invalid parameters", body = ErrorResponse),
        (status = 401, description = "Missing or invalid service key", body = ErrorResponse),
        (status = 503, description = "Media record store unreachable", body = RunPipelineResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, query), fields(media_type = %query.media_type, limit = ?query.limit))]
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<RunPipelineQuery>,
) -> impl IntoResponse {
    match state
        .orchestrator
        .run_batch(query.media_type, query.limit)
        .await
    {
        Ok(result) => (
            StatusCode::OK,
            Json(RunPipelineResponse {
                success: true,
                result: Some(result),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Media pipeline run failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(RunPipelineResponse {
                    success: false,
                    result: None,
                    error: Some(format!("{:#}", e)),
                }),
            )
        }
    }
}
