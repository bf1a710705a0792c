//! Application error type mapping to HTTP status codes.
//!
//! Every error body has the shape `{"detail": "<message>"}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use pmassist_core::chat::service::ChatError;
use pmassist_types::error::ValidationError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Malformed payload, invalid ids, empty query or user id.
    BadRequest(String),
    /// Thread owned by another user.
    Forbidden(String),
    /// Thread without checkpoints.
    NotFound(String),
    /// Anything else.
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg) => msg,
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Validation(v) => AppError::BadRequest(v.to_string()),
            ChatError::Forbidden(msg) => AppError::Forbidden(msg),
            ChatError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(detail = %self.detail(), "Request failed");
        }
        (status, axum::Json(json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmassist_core::agent::runner::AgentError;

    #[test]
    fn test_chat_error_status_mapping() {
        let cases = [
            (
                AppError::from(ChatError::Validation(ValidationError::Empty { field: "query" })),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ChatError::Forbidden("nope".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::from(ChatError::NotFound("gone".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(ChatError::Agent(AgentError::MaxIterations(8))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn test_detail_keeps_message() {
        let err = AppError::from(ValidationError::Empty { field: "user_id" });
        assert_eq!(err.detail(), "user_id must not be empty");
    }
}
