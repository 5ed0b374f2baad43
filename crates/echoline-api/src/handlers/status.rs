use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use echoline_core::models::OwnerMediaStatus;
use uuid::Uuid;

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Processing status of an owner's media. Unauthenticated; carries no content fields.
#[utoipa::path(
    get,
    path = "/api/v0/owners/{owner_id}/media-status",
    tag = "media",
    params(
        ("owner_id" = Uuid, Path, description = "Survey response or feedback ID")
    ),
    responses(
        (status = 200, description = "Media status", body = OwnerMediaStatus),
        (status = 404, description = "Owner not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(owner_id = %owner_id))]
pub async fn get_media_status(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let status = state.status.status(owner_id).await?;
    Ok(Json(status))
}
