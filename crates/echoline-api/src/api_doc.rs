//! OpenAPI documentation, served at `/api/openapi.json` and rendered at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use echoline_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Echoline API",
        version = "0.1.0",
        description = "Feedback-media pipeline: transcription, normalization and sentiment of audio and video attachments. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::pipeline::run_pipeline,
        handlers::retry::retry_media,
        handlers::status::get_media_status,
        handlers::download::download_media,
    ),
    components(schemas(
        error::ErrorResponse,
        handlers::pipeline::RunPipelineResponse,
        models::BatchResult,
        models::ItemFailure,
        models::Degradation,
        models::DegradedStage,
        models::MediaType,
        models::MediaStatus,
        models::MediaStatusView,
        models::OwnerMediaStatus,
        models::OwnerType,
        models::ProcessingStatus,
        echoline_core::PipelineErrorCode,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "pipeline", description = "Scheduler trigger"),
        (name = "media", description = "Retry, status and download of feedback media")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
