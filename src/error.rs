use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing::error;

use crate::repository::RepositoryError;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(_) => ApiError::NotFound(value.to_string()),
            RepositoryError::InvalidArgument(_) => ApiError::BadRequest(value.to_string()),
            RepositoryError::CapacityExceeded | RepositoryError::Conflict(_) => {
                ApiError::Conflict(value.to_string())
            }
            RepositoryError::Store(err) => {
                error!("Storage error: {err}");
                ApiError::Internal("Failed to save changes on this device".into())
            }
        }
    }
}
