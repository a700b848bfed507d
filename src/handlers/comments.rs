use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    access,
    auth::{AuthUser, Viewer},
    error::AppError,
    handlers::viewable_article,
    models::{Comment, CreateCommentRequest, ListCommentsResponse},
};

/// list_comments
///
/// [Public Route] Oldest first. The article must be visible to the caller.
#[utoipa::path(
    get,
    path = "/api/article/{id}/comments",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "Comments of the article", body = ListCommentsResponse),
        (status = 404, description = "Article not found")
    )
)]
pub async fn list_comments(
    Viewer(viewer): Viewer,
    State(state): State<AppState>,
    Path(article_id): Path<Uuid>,
) -> Result<Json<ListCommentsResponse>, AppError> {
    viewable_article(&state, viewer.as_ref(), article_id).await?;
    let comments = state.repo.list_comments(article_id).await?;
    Ok(Json(ListCommentsResponse { comments }))
}

#[utoipa::path(
    post,
    path = "/api/article/{id}/comments",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Article id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty or oversized text"),
        (status = 404, description = "Article not found")
    ),
    security(("bearer" = []))
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(article_id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    payload.validate()?;
    let article = viewable_article(&state, Some(&user), article_id).await?;
    if !access::can_comment(Some(&user), &article) {
        return Err(AppError::Forbidden);
    }

    let comment = state
        .repo
        .add_comment(article_id, &user.id, payload.text.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Authenticated Route] Allowed for the comment's author, the article's author
/// and admins.
#[utoipa::path(
    delete,
    path = "/api/article/{id}/comments/{comment_id}",
    tag = "comments",
    params(
        ("id" = Uuid, Path, description = "Article id"),
        ("comment_id" = Uuid, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Not allowed to delete this comment"),
        (status = 404, description = "Article or comment not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((article_id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let article = viewable_article(&state, Some(&user), article_id).await?;
    let comment = state
        .repo
        .get_comment(article_id, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment", comment_id))?;

    if !access::can_delete_comment(&user, &comment, &article) {
        return Err(AppError::Forbidden);
    }

    state.repo.delete_comment(comment_id).await?;
    tracing::info!(comment = %comment_id, by = %user.id, "deleted comment");
    Ok(StatusCode::NO_CONTENT)
}
