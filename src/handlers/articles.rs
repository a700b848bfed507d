use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::collections::HashSet;
use uuid::Uuid;

use crate::{
    AppState,
    access,
    auth::{AuthUser, Viewer},
    error::AppError,
    handlers::{Created, created, viewable_article},
    models::{
        Article, ArticleBody, ArticleInfo, ChangeAuthorRequest, ContentQuery, CreateArticleQuery,
        CreateArticleResponse, ListArticlesQuery, ListArticlesResponse, Page, UpdateArticleRequest,
    },
    ranking::RankingWeights,
    repository::ArticleQuery,
};

/// Loads an article the caller may edit. Articles the caller cannot even see
/// are reported as missing.
async fn editable_article(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> Result<Article, AppError> {
    let article = viewable_article(state, Some(user), id).await?;
    if !access::can_edit_article(user, &article) {
        return Err(AppError::Forbidden);
    }
    Ok(article)
}

async fn reload_info(state: &AppState, id: Uuid) -> Result<Json<ArticleInfo>, AppError> {
    state
        .repo
        .get_article(id)
        .await?
        .map(|article| Json(article.info))
        .ok_or_else(|| AppError::not_found("Article", id))
}

/// create_article
///
/// [Writer Route] Creates an empty, hidden article authored by the caller.
/// `?closed` selects the gated kind.
#[utoipa::path(
    post,
    path = "/api/article",
    tag = "articles",
    params(CreateArticleQuery),
    responses(
        (status = 201, description = "Article created", body = CreateArticleResponse),
        (status = 403, description = "Writer only")
    ),
    security(("bearer" = []))
)]
pub async fn create_article(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CreateArticleQuery>,
) -> Result<Created<CreateArticleResponse>, AppError> {
    let kind = query.kind();
    let id = state.repo.create_article(&user.id, kind).await?;

    tracing::info!(article = %id, %kind, author = %user.id, "created article");
    Ok(created(
        &state,
        format!("/api/article/{id}"),
        CreateArticleResponse { id },
    ))
}

/// list_articles
///
/// [Public Route] The ranked feed. Hidden articles are included only for their
/// author and for Writer+ viewers.
#[utoipa::path(
    get,
    path = "/api/article",
    tag = "articles",
    params(ListArticlesQuery),
    responses(
        (status = 200, description = "Articles ordered by score", body = ListArticlesResponse),
        (status = 400, description = "Invalid paging, label id or modifier")
    )
)]
pub async fn list_articles(
    Viewer(viewer): Viewer,
    State(state): State<AppState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<ListArticlesResponse>, AppError> {
    let article_query = ArticleQuery {
        scope: access::listing_scope(viewer.as_ref()),
        author: query.author.clone().filter(|author| !author.is_empty()),
        labels: query.label_ids()?,
        page: Page::new(query.page, query.length)?,
        weights: RankingWeights::from_query(&query)?,
    };

    let articles = state.repo.list_articles(&article_query).await?;
    Ok(Json(ListArticlesResponse { articles }))
}

#[utoipa::path(
    get,
    path = "/api/article/{id}",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 200, description = "Article metadata", body = ArticleInfo),
        (status = 404, description = "Missing or not visible to the caller")
    )
)]
pub async fn get_article(
    Viewer(viewer): Viewer,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArticleInfo>, AppError> {
    let article = viewable_article(&state, viewer.as_ref(), id).await?;
    Ok(Json(article.info))
}

/// get_article_content
///
/// [Public Route] The markdown body. Anonymous readers of a closed article get
/// only the teaser. Every successful read counts as a view.
#[utoipa::path(
    get,
    path = "/api/article/{id}/content",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (
            status = 200,
            description = "Markdown body",
            body = String,
            content_type = "text/markdown"
        ),
        (status = 404, description = "Missing or not visible to the caller")
    )
)]
pub async fn get_article_content(
    Viewer(viewer): Viewer,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let article = viewable_article(&state, viewer.as_ref(), id).await?;
    state.repo.record_view(id).await?;

    let text = article
        .body
        .render(access::can_read_gated_content(viewer.as_ref()));
    Ok(([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], text))
}

/// update_article
///
/// [Writer Route] Partial update of the metadata. A `labels` list replaces the
/// current set and every id in it must exist.
#[utoipa::path(
    patch,
    path = "/api/article/{id}",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article id")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Article updated", body = ArticleInfo),
        (status = 400, description = "Invalid title, unknown label or image"),
        (status = 403, description = "Neither author nor admin"),
        (status = 404, description = "Article not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_article(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateArticleRequest>,
) -> Result<Json<ArticleInfo>, AppError> {
    payload.validate()?;
    editable_article(&state, &user, id).await?;

    if let Some(labels) = payload.labels.as_mut() {
        let known: HashSet<Uuid> = state
            .repo
            .list_labels()
            .await?
            .into_iter()
            .map(|label| label.id)
            .collect();
        if let Some(unknown) = labels.iter().find(|label| !known.contains(label)) {
            return Err(AppError::BadRequest(format!("Label '{unknown}' does not exist.")));
        }
        let mut seen = HashSet::new();
        labels.retain(|label| seen.insert(*label));
    }

    if let Some(Some(image)) = payload.main_image {
        if state.repo.get_file(image).await?.is_none() {
            return Err(AppError::BadRequest(format!("File '{image}' does not exist.")));
        }
    }

    if let Some(title) = payload.title.as_mut() {
        *title = title.trim().to_string();
    }

    if !state.repo.update_article(id, &payload).await? {
        return Err(AppError::not_found("Article", id));
    }
    reload_info(&state, id).await
}

/// update_article_content
///
/// [Writer Route] Replaces one body section with the raw request body. For a
/// closed article `?closed` targets the gated part, otherwise the teaser.
#[utoipa::path(
    patch,
    path = "/api/article/{id}/content",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article id"), ContentQuery),
    request_body(content = String, content_type = "text/markdown"),
    responses(
        (status = 204, description = "Content replaced"),
        (status = 403, description = "Neither author nor admin"),
        (status = 404, description = "Article not found")
    ),
    security(("bearer" = []))
)]
pub async fn update_article_content(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ContentQuery>,
    body: String,
) -> Result<StatusCode, AppError> {
    let article = editable_article(&state, &user, id).await?;
    let section = ArticleBody::section_for(article.body.kind(), query.gated());

    if !state.repo.set_article_content(id, section, &body).await? {
        return Err(AppError::not_found("Article", id));
    }

    tracing::debug!(article = %id, ?section, bytes = body.len(), "replaced article content");
    Ok(StatusCode::NO_CONTENT)
}

/// change_author
///
/// [Admin Route] Hands an article to another account that may publish.
#[utoipa::path(
    patch,
    path = "/api/article/{id}/author",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article id")),
    request_body = ChangeAuthorRequest,
    responses(
        (status = 200, description = "Author changed", body = ArticleInfo),
        (status = 400, description = "New author cannot own articles"),
        (status = 404, description = "Article or user not found")
    ),
    security(("bearer" = []))
)]
pub async fn change_author(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeAuthorRequest>,
) -> Result<Json<ArticleInfo>, AppError> {
    if !access::can_change_author(&user) {
        return Err(AppError::Forbidden);
    }
    viewable_article(&state, Some(&user), id).await?;

    let new_author = state
        .repo
        .get_user(&payload.author)
        .await?
        .ok_or_else(|| AppError::not_found("User", &payload.author))?;
    if !access::can_own_articles(&new_author) {
        return Err(AppError::BadRequest(format!(
            "User '{}' cannot own articles.",
            new_author.id
        )));
    }

    if !state.repo.set_article_author(id, &new_author.id).await? {
        return Err(AppError::not_found("Article", id));
    }

    tracing::info!(article = %id, author = %new_author.id, by = %user.id, "changed article author");
    reload_info(&state, id).await
}

#[utoipa::path(
    delete,
    path = "/api/article/{id}",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article id")),
    responses(
        (status = 204, description = "Article deleted"),
        (status = 403, description = "Neither author nor admin"),
        (status = 404, description = "Article not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_article(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    editable_article(&state, &user, id).await?;

    if !state.repo.delete_article(id).await? {
        return Err(AppError::not_found("Article", id));
    }

    tracing::info!(article = %id, by = %user.id, "deleted article");
    Ok(StatusCode::NO_CONTENT)
}
