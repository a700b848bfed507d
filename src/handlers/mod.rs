//! HTTP handlers, one module per resource.
//!
//! Handlers resolve identity through the `AuthUser` / `Viewer` extractors, ask
//! `access` whether the caller may proceed, and then talk to the repository and
//! blob store held in `AppState`. They return `Result<_, AppError>` so every
//! failure renders as `{ "message": ... }`.

use axum::{
    Json,
    body::Bytes,
    http::{HeaderMap, HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    AppState,
    access,
    auth::AuthUser,
    error::AppError,
    models::Article,
};

pub mod articles;
pub mod auth;
pub mod comments;
pub mod files;
pub mod health;
pub mod labels;
pub mod users;

/// Upper bound for uploaded file bodies (8 MiB).
pub const MAX_UPLOAD_BYTES: usize = 8 * 1024 * 1024;

/// A `201 Created` response with a `Location` header.
pub type Created<T> = (StatusCode, [(HeaderName, String); 1], Json<T>);

pub(crate) fn created<T>(state: &AppState, path: String, body: T) -> Created<T> {
    let location = format!("{}{}", state.config.public_url, path);
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body))
}

/// Loads an article the viewer may see. Missing and hidden articles are both
/// reported as 404.
pub(crate) async fn viewable_article(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> Result<Article, AppError> {
    state
        .repo
        .get_article(id)
        .await?
        .filter(|article| access::can_view_article(viewer, article))
        .ok_or_else(|| AppError::not_found("Article", id))
}

/// image_upload
///
/// Validates a raw upload: the `Content-Type` must be `image/*` (parameters are
/// dropped) and the body must not be empty. Returns the media type and the bytes.
pub(crate) fn image_upload(
    headers: &HeaderMap,
    body: Bytes,
) -> Result<(String, Vec<u8>), AppError> {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if !mime.starts_with("image/") {
        let shown = if mime.is_empty() { "none".to_string() } else { mime };
        return Err(AppError::UnsupportedMediaType(shown));
    }
    if body.is_empty() {
        return Err(AppError::BadRequest("File body is empty.".to_string()));
    }

    Ok((mime, body.to_vec()))
}

pub(crate) fn binary(mime: String, data: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, mime)], data).into_response()
}
