//! Client-side JWT Interceptor
//!
//! Injects the session token into outgoing gRPC requests via metadata.

use crate::error::AuthError;
use crate::server::{AUTHORIZATION_KEY, BEARER_PREFIX};
use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Client-side interceptor that adds `authorization: Bearer <token>` to every
/// outgoing request
///
/// ## Usage
///
/// ```rust,no_run
/// use grpc_jwt_propagation::JwtClientInterceptor;
/// use tonic::transport::Channel;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let interceptor = JwtClientInterceptor::new("eyJhbGc...")?;
///
/// let channel = Channel::from_static("http://[::1]:50051")
///     .connect()
///     .await?;
///
/// // let mut client = UsersServiceClient::with_interceptor(channel, interceptor);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct JwtClientInterceptor {
    /// Pre-formatted "Bearer {token}", parsed once at construction
    auth_header: AsciiMetadataValue,
}

impl JwtClientInterceptor {
    /// Create an interceptor from a raw token (without the "Bearer " prefix)
    ///
    /// ## Errors
    ///
    /// Returns `MalformedCredential` if the token is empty or cannot be carried
    /// in an ASCII metadata value.
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        if token.is_empty() {
            return Err(AuthError::MalformedCredential);
        }

        let auth_header = AsciiMetadataValue::try_from(format!("{BEARER_PREFIX}{token}"))
            .map_err(|_| AuthError::MalformedCredential)?;

        Ok(Self { auth_header })
    }
}

impl Interceptor for JwtClientInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(AUTHORIZATION_KEY, self.auth_header.clone());

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interceptor_injects_header() {
        let mut interceptor = JwtClientInterceptor::new("test-token-123").unwrap();

        let request = interceptor.call(Request::new(())).unwrap();

        let auth = request.metadata().get(AUTHORIZATION_KEY).unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer test-token-123");
    }

    #[test]
    fn test_interceptor_overwrites_existing_header() {
        let mut interceptor = JwtClientInterceptor::new("fresh").unwrap();
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert(AUTHORIZATION_KEY, "Bearer stale".parse().unwrap());

        let request = interceptor.call(request).unwrap();

        let auth = request.metadata().get(AUTHORIZATION_KEY).unwrap();
        assert_eq!(auth.to_str().unwrap(), "Bearer fresh");
    }

    #[test]
    fn test_empty_token_rejected() {
        assert_eq!(
            JwtClientInterceptor::new("").unwrap_err(),
            AuthError::MalformedCredential
        );
    }

    #[test]
    fn test_non_ascii_token_rejected() {
        assert_eq!(
            JwtClientInterceptor::new("tök\u{e9}n").unwrap_err(),
            AuthError::MalformedCredential
        );
    }
}
