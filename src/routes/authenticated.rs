use crate::{
    AppState,
    handlers::{auth, comments, users},
};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Authenticated Router
///
/// Any signed-in account. Handlers further check that the caller is acting on
/// itself (or on an account ranked below it) and on comments it may remove.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/checklogin", get(auth::check_login))
        // --- Comments ---
        .route("/article/{id}/comments", post(comments::add_comment))
        .route(
            "/article/{id}/comments/{comment_id}",
            delete(comments::delete_comment),
        )
        // --- Own account ---
        .route(
            "/user/{id}",
            patch(users::update_user).delete(users::delete_user),
        )
        .route(
            "/user/{id}/avatar",
            post(users::upload_avatar).delete(users::delete_avatar),
        )
}
