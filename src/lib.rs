use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod ranking;
pub mod repository;
pub mod storage;

// Routers segregated by access tier (public, authenticated, writer, admin).
pub mod routes;
use routes::{admin, authenticated, public, writer};

use auth::AuthUser;
use error::AppError;
use models::PermissionLevel;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{BlobState, MemoryBlobStore, PostgresBlobStore, S3BlobStore};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` payload into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::register, handlers::auth::login, handlers::auth::check_login,
        handlers::users::list_users, handlers::users::get_user, handlers::users::update_user,
        handlers::users::update_permission_level, handlers::users::delete_user,
        handlers::users::get_avatar, handlers::users::upload_avatar, handlers::users::delete_avatar,
        handlers::articles::create_article, handlers::articles::list_articles,
        handlers::articles::get_article, handlers::articles::get_article_content,
        handlers::articles::update_article, handlers::articles::update_article_content,
        handlers::articles::change_author, handlers::articles::delete_article,
        handlers::comments::list_comments, handlers::comments::add_comment,
        handlers::comments::delete_comment,
        handlers::labels::list_labels, handlers::labels::create_label,
        handlers::labels::update_label, handlers::labels::delete_label,
        handlers::files::upload_file, handlers::files::default_file, handlers::files::get_file,
        handlers::files::get_file_info, handlers::files::list_files,
        handlers::files::replace_file, handlers::files::delete_file,
    ),
    components(
        schemas(
            models::UserInfo, models::AuthRegisterRequest, models::AuthRegisterResponse,
            models::AuthLoginRequest, models::AuthLoginResponse, models::UpdateUserRequest,
            models::UpdatePermissionLevelRequest, models::ListUsersResponse,
            models::Label, models::LabelRequest, models::ListLabelsResponse,
            models::FileInfo, models::CreateFileResponse, models::ListFilesResponse,
            models::ArticleKind, models::ArticleInfo, models::CreateArticleResponse,
            models::UpdateArticleRequest, models::ChangeAuthorRequest, models::ListArticlesResponse,
            models::Comment, models::CreateCommentRequest, models::ListCommentsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "gazette", description = "Gazette publishing API")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
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

/// AppState
///
/// The single, cloneable container of the services every request needs.
#[derive(Clone)]
pub struct AppState {
    /// Metadata persistence (Postgres in production, memory in tests).
    pub repo: RepositoryState,
    /// Where file bytes live.
    pub blobs: BlobState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthUser` pull single components out of `AppState`.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for BlobState {
    fn from_ref(app_state: &AppState) -> BlobState {
        app_state.blobs.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for the authenticated tier. Extracting `AuthUser` rejects the request
/// with 401 before the handler runs when no valid identity is present.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// Gate for the writer tier: 401 without identity, 403 below `Writer`.
async fn require_writer(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.require(PermissionLevel::Writer)?;
    Ok(next.run(request).await)
}

/// Gate for the admin tier: 401 without identity, 403 below `Admin`.
async fn require_admin(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth_user.require(PermissionLevel::Admin)?;
    Ok(next.run(request).await)
}

/// api_router
///
/// Every tier merged into one router, to be nested under `/api`. Tier gates are
/// `route_layer`s, so they only run for requests that match a route of their tier.
fn api_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            writer::writer_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), require_writer)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), require_admin)),
        )
        .layer(DefaultBodyLimit::max(handlers::MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(error::json_rejections))
}

/// create_router
///
/// Assembles the API under `/api`, the Swagger UI, the JSON 404 fallback and
/// the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_router(&state))
        .fallback(error::unknown_endpoint)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer`: method, uri and the `x-request-id` set above, so all
/// log lines of one request correlate.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
