//! Authentication/authorization stage
use grpc_jwt_propagation::{authorize_for_route, AuthError, BearerAuthenticator, Principal, RoutePolicy};
use std::sync::Arc;
use tonic::metadata::MetadataMap;

/// Route policy lookup followed by bearer validation and the level check
#[derive(Debug, Clone)]
pub struct AuthStage {
    authenticator: BearerAuthenticator,
    policy: Arc<RoutePolicy>,
}

impl AuthStage {
    pub fn new(authenticator: BearerAuthenticator, policy: Arc<RoutePolicy>) -> Self {
        Self {
            authenticator,
            policy,
        }
    }

    /// Authorize one call
    ///
    /// Public routes return `Ok(None)` without looking at the metadata.
    /// `subject_id` is only consulted for routes that need it.
    pub fn authorize(
        &self,
        route: &str,
        metadata: &MetadataMap,
        subject_id: impl FnOnce() -> Option<i64>,
    ) -> Result<Option<Principal>, AuthError> {
        let level = self.policy.level_for(route)?;
        if !level.requires_credentials() {
            return Ok(None);
        }

        let principal = self.authenticator.authenticate(metadata)?;
        authorize_for_route(route, level, &principal, subject_id()).map_err(|err| {
            tracing::warn!(
                route = %route,
                user_id = principal.user_id,
                error = %err,
                "Authorization denied"
            );
            err
        })?;

        Ok(Some(principal))
    }
}
