use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    handlers::{Created, created},
    models::{Label, LabelRequest, ListLabelsResponse},
};

#[utoipa::path(
    get,
    path = "/api/label",
    tag = "labels",
    responses((status = 200, description = "All labels, sorted by name", body = ListLabelsResponse))
)]
pub async fn list_labels(
    State(state): State<AppState>,
) -> Result<Json<ListLabelsResponse>, AppError> {
    let labels = state.repo.list_labels().await?;
    Ok(Json(ListLabelsResponse { labels }))
}

/// create_label
///
/// [Admin Route] Label names are unique.
#[utoipa::path(
    post,
    path = "/api/label",
    tag = "labels",
    request_body = LabelRequest,
    responses(
        (status = 201, description = "Label created", body = Label),
        (status = 409, description = "Name already taken")
    ),
    security(("bearer" = []))
)]
pub async fn create_label(
    _admin: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<LabelRequest>,
) -> Result<Created<Label>, AppError> {
    let payload = payload.trimmed();
    payload.validate()?;
    let label = state.repo.create_label(payload).await?;
    tracing::info!(label = %label.name, "created label");
    Ok(created(&state, format!("/api/label/{}", label.id), label))
}

#[utoipa::path(
    patch,
    path = "/api/label/{id}",
    tag = "labels",
    params(("id" = Uuid, Path, description = "Label id")),
    request_body = LabelRequest,
    responses(
        (status = 200, description = "Label updated", body = Label),
        (status = 404, description = "Label not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_label(
    _admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LabelRequest>,
) -> Result<Json<Label>, AppError> {
    let payload = payload.trimmed();
    payload.validate()?;
    state
        .repo
        .update_label(id, payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Label", id))
}

/// delete_label
///
/// [Admin Route] Also detaches the label from every article.
#[utoipa::path(
    delete,
    path = "/api/label/{id}",
    tag = "labels",
    params(("id" = Uuid, Path, description = "Label id")),
    responses(
        (status = 204, description = "Label deleted"),
        (status = 404, description = "Label not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_label(
    _admin: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_label(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Label", id))
    }
}
