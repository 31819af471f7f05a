//! The interceptor chain every inbound call passes through
//!
//! ```text
//! rate limit ─▶ log start ─▶ authn/authz ─▶ validate ─▶ cancellation ─▶ handler (panic-safe) ─▶ log finish
//! ```
//!
//! Any stage may end the call; later stages never run. Requests rejected by
//! the rate limiter are not logged as calls.

use super::auth::AuthStage;
use super::cancellation::Cancellation;
use super::logging::{RequestLog, RequestRecord};
use super::rate_limit::RateLimiter;
use super::recovery::recover;
use super::validation::validate_message;
use super::ChainError;
use crypto_core::correlation;
use grpc_jwt_propagation::{BearerAuthenticator, Principal, RoutePolicy};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::{Code, Extensions, Request, Response, Status};
use validator::Validate;

/// A decoded request message the chain can validate and authorize
pub trait RouteMessage: Validate + Send + 'static {
    /// Identifier of the user the request refers to, for self-only routes
    fn subject_id(&self) -> Option<i64> {
        None
    }
}

/// Per-call context handed to the business handler
#[derive(Debug, Clone)]
pub struct CallContext {
    route: &'static str,
    correlation_id: String,
    principal: Option<Principal>,
    cancellation: Cancellation,
}

impl CallContext {
    pub fn route(&self) -> &'static str {
        self.route
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Authenticated caller; `None` on public routes
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Caller of a route that requires credentials
    ///
    /// Absence means the route is mis-declared as public.
    pub fn require_principal(&self) -> Result<&Principal, Status> {
        self.principal.as_ref().ok_or_else(|| {
            tracing::error!(route = %self.route, "Handler requires a principal on a public route");
            Status::internal("internal error")
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Fixed-order composition of the cross-cutting stages
pub struct InterceptorChain {
    limiter: Arc<RateLimiter>,
    auth: AuthStage,
    log: Arc<dyn RequestLog>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("limiter", &self.limiter)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

impl InterceptorChain {
    pub fn new(
        limiter: Arc<RateLimiter>,
        authenticator: BearerAuthenticator,
        policy: Arc<RoutePolicy>,
        log: Arc<dyn RequestLog>,
    ) -> Self {
        Self {
            limiter,
            auth: AuthStage::new(authenticator, policy),
            log,
        }
    }

    /// Run one call through every stage and, if all pass, the handler
    pub async fn run<M, R, F, Fut>(
        &self,
        route: &'static str,
        request: Request<M>,
        handler: F,
    ) -> Result<Response<R>, Status>
    where
        M: RouteMessage,
        R: Send,
        F: FnOnce(CallContext, M) -> Fut + Send,
        Fut: Future<Output = Result<R, Status>> + Send,
    {
        if !self.limiter.allow() {
            tracing::warn!(route = %route, "Rate limit exceeded");
            return Err(ChainError::RateLimited.into());
        }

        let received_at = Instant::now();
        let (metadata, extensions, message) = request.into_parts();
        let correlation_id = correlation::extract_or_generate(&metadata);
        self.log.request_started(route, &correlation_id);

        let mut user_id = None;
        let result = self
            .guarded(
                route,
                &metadata,
                &extensions,
                received_at,
                &correlation_id,
                message,
                handler,
                &mut user_id,
            )
            .await;

        self.log.request_finished(&RequestRecord {
            route,
            correlation_id: &correlation_id,
            code: result.as_ref().map_or_else(Status::code, |_| Code::Ok),
            latency: received_at.elapsed(),
            user_id,
        });

        result.map(Response::new)
    }

    #[allow(clippy::too_many_arguments)]
    async fn guarded<M, R, F, Fut>(
        &self,
        route: &'static str,
        metadata: &MetadataMap,
        extensions: &Extensions,
        received_at: Instant,
        correlation_id: &str,
        message: M,
        handler: F,
        user_id: &mut Option<i64>,
    ) -> Result<R, Status>
    where
        M: RouteMessage,
        F: FnOnce(CallContext, M) -> Fut,
        Fut: Future<Output = Result<R, Status>>,
    {
        let principal = self
            .auth
            .authorize(route, metadata, || message.subject_id())
            .map_err(ChainError::from)?;
        *user_id = principal.as_ref().map(|p| p.user_id);

        validate_message(route, &message)?;

        let cancellation = Cancellation::from_request(metadata, extensions, received_at);
        cancellation.check()?;

        let context = CallContext {
            route,
            correlation_id: correlation_id.to_string(),
            principal,
            cancellation,
        };

        // Calling the handler builds its future; a panic there must be caught too
        recover(route, async move { handler(context, message).await }).await
    }
}

/// Attach `token` to a request so the cancellation stage can observe it
pub fn attach_cancellation<T>(request: &mut Request<T>, token: CancellationToken) {
    request.extensions_mut().insert(token);
}
