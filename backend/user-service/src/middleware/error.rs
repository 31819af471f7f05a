use crate::validators::render_runtime_error;
use grpc_jwt_propagation::AuthError;
use thiserror::Error;
use tonic::Status;

/// Why the chain stopped a call before or around the handler
///
/// Each stage terminates with exactly one of these; the caller only sees the
/// status it converts to.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Rendered rule violations
    #[error("validation failed: {0}")]
    Validation(String),

    /// The validation engine itself failed
    #[error("validation engine failure: {0}")]
    ValidationRuntime(String),

    #[error("request cancelled by caller")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// Handler panicked; payload kept for the server log
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl From<ChainError> for Status {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::RateLimited => Status::resource_exhausted("rate limit exceeded"),
            ChainError::Auth(auth) => auth.into(),
            ChainError::Validation(message) => Status::invalid_argument(message),
            ChainError::ValidationRuntime(_) => Status::invalid_argument(render_runtime_error(
                "request could not be validated",
            )),
            ChainError::Cancelled => Status::cancelled("request cancelled"),
            ChainError::DeadlineExceeded => Status::deadline_exceeded("deadline exceeded"),
            ChainError::Panic(_) => Status::internal("internal error"),
        }
    }
}
