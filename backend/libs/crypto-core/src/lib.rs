//! Shared cryptographic primitives for Nova services
//!
//! - `jwt`: HS256 session token issuance and validation
//! - `correlation`: request correlation ids carried across gRPC/HTTP boundaries

pub mod correlation;
pub mod jwt;

pub use jwt::{Claims, JwtError, ParseRoleError, Role, TokenAuthenticator};
