use crate::{
    AppState,
    handlers::{articles, auth, comments, files, health, labels, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router
///
/// Endpoints open to everyone. Article reads still go through the `Viewer`
/// extractor: a valid token widens what is visible, an invalid one is a 401.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // --- Auth ---
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // --- Articles ---
        // Ranked feed; hidden drafts only for their author and Writer+.
        .route("/article", get(articles::list_articles))
        .route("/article/{id}", get(articles::get_article))
        // Counts a view. Closed articles are cut to the teaser for anonymous readers.
        .route("/article/{id}/content", get(articles::get_article_content))
        .route("/article/{id}/comments", get(comments::list_comments))
        // --- Labels ---
        .route("/label", get(labels::list_labels))
        // --- Files ---
        .route("/file/default", get(files::default_file))
        .route("/file/{id}", get(files::get_file))
        // --- Users ---
        .route("/user/{id}", get(users::get_user))
        .route("/user/{id}/avatar", get(users::get_avatar))
}
