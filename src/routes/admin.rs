use crate::{
    AppState,
    handlers::{articles, labels, users},
};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Admin Router
///
/// Account administration, authorship transfer and the label catalogue.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(users::list_users))
        // Rules in `access::can_assign_level`: never upward, never Superadmin.
        .route("/user/{id}/permission", patch(users::update_permission_level))
        .route("/article/{id}/author", patch(articles::change_author))
        // --- Labels ---
        .route("/label", post(labels::create_label))
        .route(
            "/label/{id}",
            patch(labels::update_label).delete(labels::delete_label),
        )
}
