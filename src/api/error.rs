//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::AuthError;
use crate::import::ImportError;
use crate::store::StoreError;
use crate::validation::ValidationError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// HTTP status and machine-readable code
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Store(e) => match e {
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                StoreError::InvalidPath { .. }
                | StoreError::NotADocument(_)
                | StoreError::NotACollection(_)
                | StoreError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
                StoreError::Io(_) | StoreError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR")
                }
            },
            ApiError::Auth(e) => match e {
                AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::SessionExpired => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED")
                }
                AuthError::Disabled => (StatusCode::FORBIDDEN, "ACCOUNT_DISABLED"),
                AuthError::UserNotFound(_) => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
                AuthError::EmailTaken(_) => (StatusCode::CONFLICT, "EMAIL_TAKEN"),
                AuthError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                AuthError::PasswordHash | AuthError::Io(_) | AuthError::Serialization(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_ERROR")
                }
            },
            ApiError::Import(ImportError::Io(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ApiError::Import(_) => (StatusCode::BAD_REQUEST, "IMPORT_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "API error occurred"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                error_code = %code,
                error_message = %self,
                "Request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Validation("name: is required".into()), StatusCode::BAD_REQUEST),
            (ApiError::Auth(AuthError::InvalidToken), StatusCode::UNAUTHORIZED),
            (ApiError::Auth(AuthError::SessionExpired), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("calls".into()), StatusCode::FORBIDDEN),
            (ApiError::Store(StoreError::NotFound("orders/o1".into())), StatusCode::NOT_FOUND),
            (ApiError::Store(StoreError::InvalidQuery("limit".into())), StatusCode::BAD_REQUEST),
            (ApiError::Auth(AuthError::EmailTaken("a@b.c".into())), StatusCode::CONFLICT),
            (ApiError::Import(ImportError::MissingColumn("price".into())), StatusCode::BAD_REQUEST),
            (ApiError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_and_code().0, status, "{}", error);
        }
    }

    #[test]
    fn test_validation_error_conversion() {
        let err: ApiError = ValidationError::new("phone", "is not a valid phone number").into();
        assert_eq!(err.to_string(), "Validation error: phone: is not a valid phone number");
    }

    #[test]
    fn test_response_status() {
        let response = ApiError::Unauthorized("Missing bearer token".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
