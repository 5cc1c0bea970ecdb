use crate::services::posts::{FieldError, PostError};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub enum AppError {
    Post(PostError),
    InvalidQuery(Vec<FieldError>),
    BadRequest(String),
    RateLimited,
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::Post(PostError::Validation(details)) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Validation failed", "details": details })),
            )
                .into_response(),
            Self::Post(PostError::NotFound) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": "Post not found" }))).into_response()
            }
            Self::Post(PostError::DuplicateSlug) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": "A post with this title already exists" })),
            )
                .into_response(),
            Self::Post(PostError::Database(err)) | Self::Internal(err) => {
                tracing::error!("Application error: {:?}", err);
                internal_error()
            }
            Self::InvalidQuery(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid query parameters", "details": details })),
            )
                .into_response(),
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limit exceeded. Please try again later." })),
            )
                .into_response(),
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

impl From<PostError> for AppError {
    fn from(err: PostError) -> Self {
        Self::Post(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_errors_map_to_status_codes() {
        let status = |err: PostError| AppError::from(err).into_response().status();

        assert_eq!(status(PostError::DuplicateSlug), StatusCode::CONFLICT);
        assert_eq!(status(PostError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(PostError::Validation(Vec::new())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(PostError::Database(anyhow::anyhow!("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unique_violation_becomes_duplicate_slug() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (slug TEXT); CREATE UNIQUE INDEX t_slug ON t(slug);")
            .unwrap();
        conn.execute("INSERT INTO t VALUES ('same')", []).unwrap();
        let err = conn.execute("INSERT INTO t VALUES ('same')", []).unwrap_err();

        assert!(matches!(PostError::from(err), PostError::DuplicateSlug));
    }
}
