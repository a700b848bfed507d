use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
};

use crate::{
    AppState,
    access,
    auth::AuthUser,
    error::AppError,
    handlers::{
        Created, binary, created,
        files::{DEFAULT_AVATAR, DEFAULT_AVATAR_MIME, remove_file, store_file},
        image_upload,
    },
    models::{
        CreateFileResponse, ListUsersQuery, ListUsersResponse, Page, PermissionLevel,
        UpdatePermissionLevelRequest, UpdateUserRequest, User, UserInfo,
    },
};

async fn load_user(state: &AppState, id: &str) -> Result<User, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))
}

/// Loads the target account and checks the caller may manage it.
async fn managed_user(state: &AppState, actor: &AuthUser, id: &str) -> Result<User, AppError> {
    let target = load_user(state, id).await?;
    if !access::can_manage_user(actor, &target) {
        return Err(AppError::Forbidden);
    }
    Ok(target)
}

/// list_users
///
/// [Admin Route] Paged account listing, optionally restricted to a minimum level.
#[utoipa::path(
    get,
    path = "/api/user",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "A page of accounts", body = ListUsersResponse),
        (status = 403, description = "Admin only")
    ),
    security(("bearer" = []))
)]
pub async fn list_users(
    _admin: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListUsersResponse>, AppError> {
    let min_level = query
        .min_permission_level
        .map(PermissionLevel::try_from)
        .transpose()
        .map_err(AppError::BadRequest)?;
    let page = Page::new(query.page, query.size)?;

    let (users, count) = state.repo.list_users(min_level, page).await?;
    Ok(Json(ListUsersResponse {
        users: users.iter().map(User::info).collect(),
        count,
    }))
}

#[utoipa::path(
    get,
    path = "/api/user/{id}",
    tag = "users",
    params(("id" = String, Path, description = "E-mail address")),
    responses(
        (status = 200, description = "Public profile", body = UserInfo),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserInfo>, AppError> {
    Ok(Json(load_user(&state, &id).await?.info()))
}

/// update_user
///
/// [Authenticated Route] Renames an account: oneself, or anyone ranked below the caller.
#[utoipa::path(
    patch,
    path = "/api/user/{id}",
    tag = "users",
    params(("id" = String, Path, description = "E-mail address")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserInfo),
        (status = 403, description = "Not allowed to manage this account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserInfo>, AppError> {
    payload.validate()?;
    managed_user(&state, &actor, &id).await?;

    let user = state
        .repo
        .update_user_name(&id, payload.name.trim())
        .await?
        .ok_or_else(|| AppError::not_found("User", &id))?;
    Ok(Json(user.info()))
}

/// update_permission_level
///
/// [Admin Route] See `access::can_assign_level` for who may grant what.
#[utoipa::path(
    patch,
    path = "/api/user/{id}/permission",
    tag = "users",
    params(("id" = String, Path, description = "E-mail address")),
    request_body = UpdatePermissionLevelRequest,
    responses(
        (status = 200, description = "Level changed", body = UserInfo),
        (status = 400, description = "Unknown level"),
        (status = 403, description = "Not allowed to assign this level"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_permission_level(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePermissionLevelRequest>,
) -> Result<Json<UserInfo>, AppError> {
    let level = PermissionLevel::try_from(payload.permission_level).map_err(AppError::BadRequest)?;
    let target = load_user(&state, &id).await?;

    if !access::can_assign_level(&actor, &target, level) {
        return Err(AppError::Forbidden);
    }

    let user = state
        .repo
        .set_permission_level(&id, level)
        .await?
        .ok_or_else(|| AppError::not_found("User", &id))?;

    tracing::info!(account = %id, ?level, by = %actor.id, "changed permission level");
    Ok(Json(user.info()))
}

/// delete_user
///
/// [Authenticated Route] Removes the account with its articles, comments and
/// files. The stored bytes of its files are purged afterwards.
#[utoipa::path(
    delete,
    path = "/api/user/{id}",
    tag = "users",
    params(("id" = String, Path, description = "E-mail address")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Not allowed to delete this account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_user(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = load_user(&state, &id).await?;
    if !access::can_delete_user(&actor, &target) {
        return Err(AppError::Forbidden);
    }

    let file_ids = state.repo.file_ids_owned_by(&id).await?;
    if !state.repo.delete_user(&id).await? {
        return Err(AppError::not_found("User", &id));
    }

    for file_id in file_ids {
        if let Err(e) = state.blobs.delete(file_id).await {
            tracing::warn!(file = %file_id, error = %e, "orphaned blob after account deletion");
        }
    }

    tracing::info!(user = %id, by = %actor.id, "deleted account");
    Ok(StatusCode::NO_CONTENT)
}

/// get_avatar
///
/// [Public Route] The account's avatar, or the bundled default when none is set.
#[utoipa::path(
    get,
    path = "/api/user/{id}/avatar",
    tag = "users",
    params(("id" = String, Path, description = "E-mail address")),
    responses(
        (status = 200, description = "Avatar image"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let user = load_user(&state, &id).await?;

    if let Some(file_id) = user.avatar {
        if let Some(info) = state.repo.get_file(file_id).await? {
            if let Some(data) = state.blobs.get(file_id).await? {
                return Ok(binary(info.mime_type, data));
            }
        }
        tracing::warn!(user = %id, file = %file_id, "avatar missing, serving default");
    }

    Ok(binary(DEFAULT_AVATAR_MIME.to_string(), DEFAULT_AVATAR.to_vec()))
}

/// upload_avatar
///
/// [Authenticated Route] Stores a new avatar owned by the target account and
/// deletes the one it replaces.
#[utoipa::path(
    post,
    path = "/api/user/{id}/avatar",
    tag = "users",
    params(("id" = String, Path, description = "E-mail address")),
    request_body(content = Vec<u8>, content_type = "image/*"),
    responses(
        (status = 201, description = "Avatar stored", body = CreateFileResponse),
        (status = 403, description = "Not allowed to manage this account"),
        (status = 415, description = "Not an image")
    ),
    security(("bearer" = []))
)]
pub async fn upload_avatar(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Created<CreateFileResponse>, AppError> {
    let target = managed_user(&state, &actor, &id).await?;
    let (mime_type, data) = image_upload(&headers, body)?;

    let info = store_file(&state, &target.id, "avatar", mime_type, data).await?;
    state.repo.set_avatar(&target.id, Some(info.id)).await?;

    if let Some(previous) = target.avatar {
        remove_file(&state, previous).await?;
    }

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
    delete,
    path = "/api/user/{id}/avatar",
    tag = "users",
    params(("id" = String, Path, description = "E-mail address")),
    responses(
        (status = 204, description = "Avatar removed"),
        (status = 403, description = "Not allowed to manage this account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_avatar(
    actor: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = managed_user(&state, &actor, &id).await?;

    if let Some(previous) = target.avatar {
        state.repo.set_avatar(&target.id, None).await?;
        remove_file(&state, previous).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
