//! Authenticated identity extracted from validated tokens
//!
//! A `Principal` is built once per request from verified claims and handed to
//! the handler as part of its call context.

use crate::error::AuthError;
use crypto_core::jwt::{Claims, Role};

/// The authenticated caller
///
/// ## Design Notes
///
/// - Fields are public for direct access (no getter boilerplate)
/// - Never mutated after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User id (parsed from the `sub` claim)
    pub user_id: i64,

    /// Username
    pub username: String,

    /// Authorization role
    pub role: Role,
}

impl Principal {
    /// Bridge between the token layer and the authorization layer
    ///
    /// ## Errors
    ///
    /// Returns `InvalidCredential` if `sub` is not a numeric id
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let user_id = claims
            .subject_id()
            .map_err(|e| AuthError::InvalidCredential(e.to_string()))?;

        Ok(Self {
            user_id,
            username: claims.username.clone(),
            role: claims.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Check whether the principal is the subject a request refers to
    pub fn is_subject(&self, subject_id: i64) -> bool {
        self.user_id == subject_id
    }
}
