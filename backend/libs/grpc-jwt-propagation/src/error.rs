//! Authentication and authorization failures
//!
//! The variants are distinguishable internally for logging; the conversion to
//! [`Status`] collapses them to what a caller is allowed to learn.

use thiserror::Error;
use tonic::Status;

/// Caller-facing message for every authentication failure
pub(crate) const UNAUTHENTICATED_MESSAGE: &str = "missing or invalid credentials";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingCredential,

    #[error("malformed authorization header (expected 'Bearer <token>')")]
    MalformedCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Route missing from the policy table or its policy cannot be applied.
    /// A programming error, never a client error.
    #[error("no applicable authorization policy for route {0}")]
    UnknownPolicy(String),
}

impl AuthError {
    /// True for the failures that surface as `Unauthenticated`
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredential
                | AuthError::MalformedCredential
                | AuthError::InvalidCredential(_)
        )
    }
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::InvalidCredential(_) => Status::unauthenticated(UNAUTHENTICATED_MESSAGE),
            AuthError::PermissionDenied(_) => Status::permission_denied("permission denied"),
            // Don't leak policy table details
            AuthError::UnknownPolicy(_) => Status::internal("internal error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn test_credential_failures_share_one_status() {
        let statuses: Vec<Status> = vec![
            AuthError::MissingCredential.into(),
            AuthError::MalformedCredential.into(),
            AuthError::InvalidCredential("ExpiredSignature".into()).into(),
        ];

        for status in statuses {
            assert_eq!(status.code(), Code::Unauthenticated);
            assert_eq!(status.message(), UNAUTHENTICATED_MESSAGE);
        }
    }

    #[test]
    fn test_permission_denied_hides_reason() {
        let status: Status = AuthError::PermissionDenied("role default".into()).into();
        assert_eq!(status.code(), Code::PermissionDenied);
        assert!(!status.message().contains("role"));
    }

    #[test]
    fn test_unknown_policy_is_internal() {
        let status: Status = AuthError::UnknownPolicy("/x.Y/Z".into()).into();
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("/x.Y/Z"));
    }
}
