use crate::{
    AppState,
    handlers::{articles, files},
};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Writer Router
///
/// Publishing: article authoring and the image library. Editing or deleting
/// someone else's article or file additionally needs `Admin`.
pub fn writer_routes() -> Router<AppState> {
    Router::new()
        // --- Articles ---
        .route("/article", post(articles::create_article))
        .route(
            "/article/{id}",
            patch(articles::update_article).delete(articles::delete_article),
        )
        .route(
            "/article/{id}/content",
            patch(articles::update_article_content),
        )
        // --- Files ---
        .route("/file", post(files::upload_file).get(files::list_files))
        .route("/file/{id}", patch(files::replace_file).delete(files::delete_file))
        .route("/file/{id}/info", get(files::get_file_info))
}
