use crate::db::StoreError;
use crate::security::PasswordError;
use crypto_core::JwtError;
use thiserror::Error;
use tonic::{Code, Status};
use tracing::error;

pub type Result<T> = std::result::Result<T, UsersError>;

/// Business handler failures
#[derive(Debug, Error)]
pub enum UsersError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Password error: {0}")]
    Password(String),

    #[error("JWT error: {0}")]
    Jwt(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl UsersError {
    /// Convert to gRPC Status for wire protocol
    pub fn to_status(&self) -> Status {
        match self {
            UsersError::InvalidCredentials => {
                Status::new(Code::Unauthenticated, "invalid credentials")
            }
            UsersError::UserNotFound => Status::new(Code::NotFound, "user not found"),
            UsersError::UsernameAlreadyExists => {
                Status::new(Code::AlreadyExists, "username already exists")
            }
            UsersError::Storage(_)
            | UsersError::Password(_)
            | UsersError::Jwt(_)
            | UsersError::Internal(_) => {
                // Don't leak internal details
                error!(error = %self, "Request failed with internal error");
                Status::new(Code::Internal, "internal error")
            }
        }
    }
}

impl From<UsersError> for Status {
    fn from(err: UsersError) -> Self {
        err.to_status()
    }
}

impl From<StoreError> for UsersError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(_) => UsersError::UsernameAlreadyExists,
            other => UsersError::Storage(other.to_string()),
        }
    }
}

impl From<PasswordError> for UsersError {
    fn from(err: PasswordError) -> Self {
        UsersError::Password(err.to_string())
    }
}

impl From<JwtError> for UsersError {
    fn from(err: JwtError) -> Self {
        UsersError::Jwt(err.to_string())
    }
}

impl From<tokio::task::JoinError> for UsersError {
    fn from(err: tokio::task::JoinError) -> Self {
        UsersError::Internal(format!("blocking task failed: {err}"))
    }
}
