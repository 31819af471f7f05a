/// User Service Library
///
/// User management over gRPC and an HTTP/JSON gateway. Every call passes the
/// same interceptor chain: rate limiting, logging, JWT authentication and
/// route authorization, request validation, cancellation and panic recovery.
///
/// ## Modules
///
/// - `app`: Wiring of chain, handlers and transports
/// - `config`: Service configuration
/// - `db`: User storage (PostgreSQL, in-memory)
/// - `error`: Error types
/// - `grpc`: gRPC server implementation and route policy
/// - `http`: HTTP/JSON gateway
/// - `middleware`: The interceptor chain
/// - `models`: Data models
/// - `security`: Password hashing
/// - `validators`: Input validation
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod grpc;
pub mod http;
pub mod middleware;
pub mod models;
pub mod security;
pub mod validators;

// Re-export commonly used types
pub use error::{Result, UsersError};
pub use grpc::UsersServiceImpl;
