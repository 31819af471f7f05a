//! Server-side bearer authentication
//!
//! Extracts and validates the bearer token of an incoming gRPC request and
//! turns it into a [`Principal`].

use crate::error::AuthError;
use crate::principal::Principal;
use crypto_core::jwt::TokenAuthenticator;
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tracing::{debug, warn};

/// Metadata key carrying the credential
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Exact, case-sensitive scheme prefix (note the trailing space)
pub const BEARER_PREFIX: &str = "Bearer ";

/// Validates bearer tokens against the process-wide [`TokenAuthenticator`]
///
/// ## Design
///
/// - **Fail-fast**: any failure stops at the first broken step
/// - **Zero tolerance**: missing/invalid/expired tokens are all `Unauthenticated`
///   once converted to a status
/// - **Structured logging**: failure reasons logged at WARN level, server-side only
#[derive(Debug, Clone)]
pub struct BearerAuthenticator {
    authenticator: Arc<TokenAuthenticator>,
}

impl BearerAuthenticator {
    pub fn new(authenticator: Arc<TokenAuthenticator>) -> Self {
        Self { authenticator }
    }

    /// Read the token out of `authorization: Bearer <token>`
    ///
    /// ## Errors
    ///
    /// - `MissingCredential` if the entry is absent
    /// - `MalformedCredential` if it is not ASCII, lacks the exact `"Bearer "`
    ///   prefix, or carries an empty token
    pub fn extract_bearer(metadata: &MetadataMap) -> Result<&str, AuthError> {
        let header = metadata
            .get(AUTHORIZATION_KEY)
            .ok_or(AuthError::MissingCredential)?;

        let value = header.to_str().map_err(|_| AuthError::MalformedCredential)?;

        match value.strip_prefix(BEARER_PREFIX) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::MalformedCredential),
        }
    }

    /// Verify a raw token and build the principal it names
    pub fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self
            .authenticator
            .parse_and_validate(token)
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        Principal::from_claims(&claims)
    }

    /// Extract and validate in one step
    pub fn authenticate(&self, metadata: &MetadataMap) -> Result<Principal, AuthError> {
        let token = Self::extract_bearer(metadata).map_err(|err| {
            warn!(error = %err, "Rejected request credentials");
            err
        })?;

        let principal = self.validate(token).map_err(|err| {
            warn!(error = %err, "JWT validation failed");
            err
        })?;

        debug!(
            user_id = principal.user_id,
            username = %principal.username,
            "JWT validated successfully"
        );

        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_core::jwt::Role;
    use tonic::metadata::MetadataValue;

    fn authenticator() -> BearerAuthenticator {
        let auth = TokenAuthenticator::new(b"server-test-secret", 1).unwrap();
        BearerAuthenticator::new(Arc::new(auth))
    }

    fn metadata_with(value: &'static str) -> MetadataMap {
        let mut metadata = MetadataMap::new();
        metadata.insert(AUTHORIZATION_KEY, MetadataValue::from_static(value));
        metadata
    }

    #[test]
    fn test_extract_missing_header() {
        let metadata = MetadataMap::new();
        let result = BearerAuthenticator::extract_bearer(&metadata);
        assert_eq!(result, Err(AuthError::MissingCredential));
    }

    #[test]
    fn test_extract_wrong_scheme() {
        let metadata = metadata_with("Basic abc");
        let result = BearerAuthenticator::extract_bearer(&metadata);
        assert_eq!(result, Err(AuthError::MalformedCredential));
    }

    #[test]
    fn test_extract_prefix_is_case_sensitive() {
        let metadata = metadata_with("bearer abc.def.ghi");
        let result = BearerAuthenticator::extract_bearer(&metadata);
        assert_eq!(result, Err(AuthError::MalformedCredential));
    }

    #[test]
    fn test_extract_requires_trailing_space() {
        let metadata = metadata_with("Bearerabc.def.ghi");
        let result = BearerAuthenticator::extract_bearer(&metadata);
        assert_eq!(result, Err(AuthError::MalformedCredential));
    }

    #[test]
    fn test_extract_empty_token() {
        let metadata = metadata_with("Bearer ");
        let result = BearerAuthenticator::extract_bearer(&metadata);
        assert_eq!(result, Err(AuthError::MalformedCredential));
    }

    #[test]
    fn test_extract_valid_shape() {
        let metadata = metadata_with("Bearer abc.def.ghi");
        assert_eq!(BearerAuthenticator::extract_bearer(&metadata), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_authenticate_valid_token() {
        let bearer = authenticator();
        let token = bearer
            .authenticator
            .generate(9, "testuser", Role::Default)
            .expect("Failed to generate token");

        let mut metadata = MetadataMap::new();
        metadata.insert(AUTHORIZATION_KEY, format!("Bearer {token}").parse().unwrap());

        let principal = bearer.authenticate(&metadata).unwrap();
        assert_eq!(principal.user_id, 9);
        assert_eq!(principal.username, "testuser");
        assert_eq!(principal.role, Role::Default);
    }

    #[test]
    fn test_authenticate_garbage_token() {
        let result = authenticator().authenticate(&metadata_with("Bearer abc.def.ghi"));
        assert!(matches!(result, Err(AuthError::InvalidCredential(_))));
    }
}
