//! JWT credential handling for gRPC services
//!
//! This library turns the `authorization` metadata of an inbound call into an
//! authenticated [`Principal`] and decides whether that principal may invoke a
//! given route.
//!
//! ## Core Components
//!
//! - **BearerAuthenticator**: extracts `Bearer <token>` and validates the token
//! - **Principal**: the authenticated identity handed to handlers
//! - **RoutePolicy**: immutable route → [`AccessLevel`] table, fail-closed
//! - **JwtClientInterceptor**: injects a bearer token into outgoing calls
//!
//! ## Authentication State Machine
//!
//! ```text
//! Start ─▶ level_for(route) ─┬─ Public ─────────────────────────▶ Authorized
//!                            └─ other ─▶ extract_bearer ─▶ validate ─▶ authorize ─▶ Authorized
//!                                           │                │            │
//!                                           ▼                ▼            ▼
//!                                     Unauthenticated  Unauthenticated  PermissionDenied
//! ```
//!
//! ## Security Guarantees
//!
//! - Missing, malformed and invalid credentials all map to one
//!   `Status::unauthenticated` with the same message
//! - Unmapped routes are denied, never allowed
//! - Internal failure reasons are logged, never returned to the caller

mod client;
mod error;
mod policy;
mod principal;
mod server;

pub use client::JwtClientInterceptor;
pub use error::AuthError;
pub use policy::{
    authorize_for_route, AccessLevel, ParseAccessLevelError, PolicyError, RoutePolicy,
    RoutePolicyBuilder,
};
pub use principal::Principal;
pub use server::{BearerAuthenticator, AUTHORIZATION_KEY, BEARER_PREFIX};

// Re-export for convenience
pub use crypto_core::jwt::Role;
pub use tonic::Status;
