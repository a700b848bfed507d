use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use uuid::Uuid;

use crate::{
    AppState,
    access,
    auth::AuthUser,
    error::AppError,
    handlers::{Created, binary, created, image_upload},
    models::{
        CreateFileQuery, CreateFileResponse, FileInfo, ListFilesQuery, ListFilesResponse, NewFile,
        Page,
    },
};

/// Served for `GET /api/file/default` and for users without an avatar.
pub const DEFAULT_AVATAR: &[u8] = include_bytes!("../../assets/default-avatar.svg");
pub const DEFAULT_AVATAR_MIME: &str = "image/svg+xml";

/// store_file
///
/// Records the metadata, then writes the bytes. If the blob store fails the
/// record is rolled back so no file points at missing bytes.
pub(crate) async fn store_file(
    state: &AppState,
    owner: &str,
    name: &str,
    mime_type: String,
    data: Vec<u8>,
) -> Result<FileInfo, AppError> {
    let info = state
        .repo
        .create_file(NewFile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            mime_type,
            owner: owner.to_string(),
            size: data.len() as i64,
        })
        .await?;

    if let Err(e) = state.blobs.put(info.id, &info.mime_type, data).await {
        if let Err(cleanup) = state.repo.delete_file(info.id).await {
            tracing::warn!(file = %info.id, error = %cleanup, "could not roll back file record");
        }
        return Err(e);
    }

    tracing::info!(file = %info.id, owner, size = info.size, "stored file");
    Ok(info)
}

/// Deletes the record (clearing avatar / main image references) and the bytes.
pub(crate) async fn remove_file(state: &AppState, id: Uuid) -> Result<bool, AppError> {
    let removed = state.repo.delete_file(id).await?;
    if removed {
        state.blobs.delete(id).await?;
    }
    Ok(removed)
}

async fn managed_file(state: &AppState, user: &AuthUser, id: Uuid) -> Result<FileInfo, AppError> {
    let info = state
        .repo
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("File", id))?;
    if !access::can_manage_file(user, &info) {
        return Err(AppError::Forbidden);
    }
    Ok(info)
}

/// upload_file
///
/// [Writer Route] Stores the raw request body. Only `image/*` content is accepted.
#[utoipa::path(
    post,
    path = "/api/file",
    tag = "files",
    params(CreateFileQuery),
    request_body(content = Vec<u8>, content_type = "image/*"),
    responses(
        (status = 201, description = "File stored", body = CreateFileResponse),
        (status = 413, description = "Body larger than 8 MiB"),
        (status = 415, description = "Not an image")
    ),
    security(("bearer" = []))
)]
pub async fn upload_file(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CreateFileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Created<CreateFileResponse>, AppError> {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is a required field".to_string()));
    }
    let (mime_type, data) = image_upload(&headers, body)?;

    let info = store_file(&state, &user.id, name, mime_type, data).await?;
    Ok(created(
        &state,
        format!("/api/file/{}", info.id),
        CreateFileResponse {
            id: info.id,
            size: info.size,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/api/file/default",
    tag = "files",
    responses((status = 200, description = "The default avatar", content_type = "image/svg+xml"))
)]
pub async fn default_file() -> Response {
    binary(DEFAULT_AVATAR_MIME.to_string(), DEFAULT_AVATAR.to_vec())
}

/// get_file
///
/// [Public Route] Streams the bytes with their stored content type.
#[utoipa::path(
    get,
    path = "/api/file/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "File bytes"),
        (status = 404, description = "File not found")
    )
)]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let info = state
        .repo
        .get_file(id)
        .await?
        .ok_or_else(|| AppError::not_found("File", id))?;

    let data = state.blobs.get(id).await?.ok_or_else(|| {
        tracing::error!(file = %id, "file record has no stored bytes");
        AppError::not_found("File", id)
    })?;

    Ok(binary(info.mime_type, data))
}

#[utoipa::path(
    get,
    path = "/api/file/{id}/info",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 200, description = "File metadata", body = FileInfo),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn get_file_info(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FileInfo>, AppError> {
    state
        .repo
        .get_file(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("File", id))
}

/// list_files
///
/// [Writer Route] The caller's own files, newest first.
#[utoipa::path(
    get,
    path = "/api/file",
    tag = "files",
    params(ListFilesQuery),
    responses(
        (status = 200, description = "A page of the caller's files", body = ListFilesResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_files(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ListFilesResponse>, AppError> {
    let page = Page::new(query.page, query.size)?;
    let (files, count) = state.repo.list_files(&user.id, page).await?;
    Ok(Json(ListFilesResponse { files, count }))
}

/// replace_file
///
/// [Writer Route] Overwrites the bytes of an existing file; the id stays stable,
/// so articles and avatars pointing at it pick up the new content.
#[utoipa::path(
    patch,
    path = "/api/file/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    request_body(content = Vec<u8>, content_type = "image/*"),
    responses(
        (status = 200, description = "File replaced", body = FileInfo),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found"),
        (status = 415, description = "Not an image")
    ),
    security(("bearer" = []))
)]
pub async fn replace_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FileInfo>, AppError> {
    managed_file(&state, &user, id).await?;
    let (mime_type, data) = image_upload(&headers, body)?;
    let size = data.len() as i64;

    state.blobs.put(id, &mime_type, data).await?;
    state
        .repo
        .update_file(id, &mime_type, size)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("File", id))
}

#[utoipa::path(
    delete,
    path = "/api/file/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File id")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "File not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_file(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    managed_file(&state, &user, id).await?;
    remove_file(&state, id).await?;
    tracing::info!(file = %id, by = %user.id, "deleted file");
    Ok(StatusCode::NO_CONTENT)
}
