//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::collaborators::CollaboratorError;
use crate::workflow::{ErrorKind, WorkflowError};

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found
    NotFound(String),
    /// Transition not allowed from the current state
    Conflict(String),
    /// Caller's role may not perform the operation
    Forbidden(String),
    /// Bad request
    BadRequest(String),
    /// Internal server error
    InternalError(String),
}

/// Error response body
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "invalid_transition", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "unauthorized", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::InvalidTransition => ApiError::Conflict(message),
            ErrorKind::Unauthorized => ApiError::Forbidden(message),
            ErrorKind::DependencyUnavailable | ErrorKind::Internal => {
                ApiError::InternalError(message)
            }
        }
    }
}

impl From<CollaboratorError> for ApiError {
    fn from(err: CollaboratorError) -> Self {
        match err {
            CollaboratorError::UnknownKind(_) | CollaboratorError::Malformed { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            CollaboratorError::Unavailable(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}
