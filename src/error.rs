use axum::{
    Json,
    body::to_bytes,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

// Postgres SQLSTATE codes that carry client-facing meaning.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

// Extractor rejection texts are one line; anything longer is not one of them.
const REJECTION_TEXT_LIMIT: usize = 16 * 1024;

/// AppError
///
/// The single error type returned by handlers, extractors and the persistence
/// layers. Every variant maps to exactly one HTTP status and renders as
/// `{ "message": ... }`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid credentials.")]
    InvalidCredentials,

    #[error("Unauthenticated request.")]
    Unauthenticated,

    #[error("User does not have permission for this resource.")]
    Forbidden,

    #[error("{kind} '{id}' cannot be found.")]
    NotFound { kind: &'static str, id: String },

    #[error("Unknown endpoint.")]
    UnknownEndpoint,

    #[error("{0}")]
    Conflict(String),

    #[error("Unsupported media type '{0}'.")]
    UnsupportedMediaType(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } | AppError::UnknownEndpoint => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Database(e) => match db_code(e).as_deref() {
                Some(UNIQUE_VIOLATION) => StatusCode::CONFLICT,
                Some(FOREIGN_KEY_VIOLATION) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The text sent to the client. Server-side failures never leak details.
    fn public_message(&self) -> String {
        match self {
            AppError::Database(e) => match db_code(e).as_deref() {
                Some(UNIQUE_VIOLATION) => "Resource already exists.".to_string(),
                Some(FOREIGN_KEY_VIOLATION) => "Referenced resource does not exist.".to_string(),
                _ => "Server error".to_string(),
            },
            AppError::Storage(_) | AppError::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        }
    }
}

fn db_code(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }

        let body = ErrorBody {
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Fallback for every path no router claims.
pub async fn unknown_endpoint() -> AppError {
    AppError::UnknownEndpoint
}

/// json_rejections
///
/// axum's `Json`, `Query` and `Path` extractors reject with a `text/plain` body
/// (400, 415 or 422). This rewrites those into the `{ "message" }` shape every
/// other error uses. 422 (well-formed JSON of the wrong shape) becomes 400.
pub async fn json_rejections(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let status = response.status();
    let is_plain_text = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/plain"));
    if !status.is_client_error() || !is_plain_text {
        return response;
    }

    let status = match status {
        StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
        other => other,
    };
    let message = match to_bytes(response.into_body(), REJECTION_TEXT_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(_) => "Invalid request.".to_string(),
    };
    tracing::debug!(%status, %message, "extractor rejected request");

    (status, Json(ErrorBody { message })).into_response()
}
