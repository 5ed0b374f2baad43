use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, Response, StatusCode},
    response::IntoResponse,
};
use echoline_core::AppError;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// RFC 5987 attr-char: everything else in `filename*` is percent-encoded.
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// Last path segment of a storage key, used as the download file name.
fn file_name(storage_key: &str) -> &str {
    storage_key
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("media")
}

/// `Content-Disposition` value for a storage key. Always a valid header:
/// `filename` carries an ASCII-only fallback, `filename*` the exact name.
fn content_disposition(storage_key: &str) -> String {
    let name = file_name(storage_key);
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(name, FILENAME_ENCODE_SET)
    )
}

/// Stream a media file through the API. The storage location is never exposed.
#[utoipa::path(
    get,
    path = "/api/v0/media/{id}/file",
    tag = "media",
    params(
        ("id" = Uuid, Path, description = "Media record ID")
    ),
    responses(
        (status = 200, description = "Media file", content_type = "application/octet-stream"),
        (status = 401, description = "Missing or invalid credentials", body = ErrorResponse),
        (status = 404, description = "Media record not found", body = ErrorResponse),
        (status = 410, description = "Media record deleted", body = ErrorResponse),
        (status = 502, description = "Storage gateway failed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(state, auth),
    fields(user_id = %auth.0.user_id, media_id = %id, operation = "download_media")
)]
pub async fn download_media(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .media
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Media record {} not found", id)))?;

    if record.is_deleted() {
        return Err(AppError::Gone(format!("Media record {} was deleted", id)).into());
    }

    tracing::debug!(
        provider = %record.storage_provider,
        "Proxying media from storage"
    );

    let stream = state
        .storage
        .resolve_stream(record.storage_provider, &record.storage_key)
        .await?;

    let body_stream = stream.map(|result| {
        result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
    });

    let content_disposition = content_disposition(&record.storage_key);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.mime_type.as_str())
        .header(header::CONTENT_DISPOSITION, content_disposition.as_str())
        .header(header::CACHE_CONTROL, "private, no-store")
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::{content_disposition, file_name};
    use axum::http::HeaderValue;

    #[test]
    fn file_name_is_last_key_segment() {
        assert_eq!(file_name("feedback/2026/clip.mp4"), "clip.mp4");
        assert_eq!(file_name("clip.mp4"), "clip.mp4");
        assert_eq!(file_name("feedback/"), "media");
    }

    #[test]
    fn content_disposition_keeps_plain_names() {
        assert_eq!(
            content_disposition("feedback/clip.mp4"),
            "attachment; filename=\"clip.mp4\"; filename*=UTF-8''clip.mp4"
        );
    }

    #[test]
    fn content_disposition_escapes_quotes_and_control_chars() {
        let value = content_disposition("feedback/say \"hi\"\r\n.m4a");
        assert!(HeaderValue::from_str(&value).is_ok());
        assert!(value.starts_with("attachment; filename=\"say__hi___.m4a\";"));
        assert!(value.ends_with("filename*=UTF-8''say%20%22hi%22%0D%0A.m4a"));
    }

    #[test]
    fn content_disposition_encodes_non_ascii_names() {
        let value = content_disposition("responses/réponse.webm");
        assert!(HeaderValue::from_str(&value).is_ok());
        assert!(value.contains("filename=\"r_ponse.webm\""));
        assert!(value.ends_with("filename*=UTF-8''r%C3%A9ponse.webm"));
    }
}
