use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use echoline_core::models::MediaStatusView;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Re-queue one media record for processing.
///
/// Returns the operational view of the reset record.
#[utoipa::path(
    post,
    path = "/api/v0/media/{id}/retry",
    tag = "media",
    params(
        ("id" = Uuid, Path, description = "Media record ID")
    ),
    responses(
        (status = 200, description = "Record re-queued", body = MediaStatusView),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 403, description = "Role may not retry", body = ErrorResponse),
        (status = 404, description = "Media record not found", body = ErrorResponse),
        (status = 410, description = "Media record deleted", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, auth),
    fields(user_id = %auth.0.user_id, media_id = %id, operation = "retry_media")
)]
pub async fn retry_media(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state.retry.retry(id, Some(&auth.0)).await?;
    Ok(Json(MediaStatusView::from(&record)))
}
