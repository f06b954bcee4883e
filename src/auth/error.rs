//! Authentication error types

use thiserror::Error;

use crate::validation::ValidationError;

/// Errors that can occur during authentication operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, unknown email or a user without a password
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("invalid or unknown token")]
    InvalidToken,

    #[error("session expired")]
    SessionExpired,

    #[error("account disabled")]
    Disabled,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("password hashing error")]
    PasswordHash,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;
