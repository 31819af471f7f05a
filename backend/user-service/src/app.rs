/// Service wiring shared by the binary and the integration tests
use crate::db::UserStore;
use crate::grpc::users::users_service_server::UsersServiceServer;
use crate::grpc::{default_policy, UsersServiceImpl};
use crate::middleware::{attach_cancellation, InterceptorChain, RateLimiter, RequestLog};
use crypto_core::jwt::TokenAuthenticator;
use grpc_jwt_propagation::{BearerAuthenticator, PolicyError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::codegen::InterceptedService;
use tonic::service::Interceptor;
use tonic::{Request, Status};

/// Assemble chain and handlers around the shared collaborators
pub fn build_service(
    tokens: Arc<TokenAuthenticator>,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn UserStore>,
    log: Arc<dyn RequestLog>,
) -> Result<Arc<UsersServiceImpl>, PolicyError> {
    let policy = Arc::new(default_policy()?);
    let chain = InterceptorChain::new(
        limiter,
        BearerAuthenticator::new(Arc::clone(&tokens)),
        policy,
        log,
    );

    Ok(Arc::new(UsersServiceImpl::new(Arc::new(chain), store, tokens)))
}

/// Gives every inbound gRPC call a child of the shutdown token
#[derive(Debug, Clone)]
pub struct CancellationInterceptor {
    shutdown: CancellationToken,
}

impl CancellationInterceptor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }
}

impl Interceptor for CancellationInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        attach_cancellation(&mut request, self.shutdown.child_token());
        Ok(request)
    }
}

/// The tonic service to mount on a `Server`
pub fn grpc_service(
    service: &UsersServiceImpl,
    shutdown: CancellationToken,
) -> InterceptedService<UsersServiceServer<UsersServiceImpl>, CancellationInterceptor> {
    UsersServiceServer::with_interceptor(service.clone(), CancellationInterceptor::new(shutdown))
}
