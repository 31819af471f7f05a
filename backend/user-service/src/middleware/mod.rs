/// Request pipeline shared by the gRPC server and the HTTP gateway
pub mod auth;
pub mod cancellation;
pub mod chain;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod recovery;
pub mod validation;

pub use chain::{attach_cancellation, CallContext, InterceptorChain, RouteMessage};
pub use error::ChainError;
pub use logging::{RequestLog, RequestRecord, TracingRequestLog};
pub use rate_limit::{RateLimitConfigError, RateLimiter};
