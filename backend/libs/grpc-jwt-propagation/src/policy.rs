//! Per-route authorization policy
//!
//! A [`RoutePolicy`] maps every fully-qualified route (`/package.Service/Method`)
//! to the [`AccessLevel`] it requires. The table is built once at startup and
//! never mutated; a route missing from it fails closed.

use crate::error::AuthError;
use crate::principal::Principal;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::error;

/// Authorization level a route requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    /// No credentials needed
    Public,
    /// Any valid session token
    User,
    /// Valid token whose subject equals the subject the request refers to
    SelfOnly,
    /// Valid token carrying the admin role
    Admin,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::User => "user",
            AccessLevel::SelfOnly => "self",
            AccessLevel::Admin => "admin",
        }
    }

    pub fn requires_credentials(&self) -> bool {
        !matches!(self, AccessLevel::Public)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown access level: {0}")]
pub struct ParseAccessLevelError(pub String);

impl FromStr for AccessLevel {
    type Err = ParseAccessLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AccessLevel::Public),
            "user" => Ok(AccessLevel::User),
            "self" => Ok(AccessLevel::SelfOnly),
            "admin" => Ok(AccessLevel::Admin),
            other => Err(ParseAccessLevelError(other.to_string())),
        }
    }
}

/// Policy table construction failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("route {route} declares unknown access level '{level}'")]
    UnknownLevel { route: String, level: String },

    #[error("route {0} declared more than once")]
    DuplicateRoute(String),
}

/// Immutable route → access level table
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    routes: HashMap<String, AccessLevel>,
}

impl RoutePolicy {
    pub fn builder() -> RoutePolicyBuilder {
        RoutePolicyBuilder::default()
    }

    /// Build from textual `(route, level)` pairs, e.g. loaded from configuration
    ///
    /// Unknown level strings are rejected here rather than at request time.
    pub fn from_entries<I, R, L>(entries: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = (R, L)>,
        R: Into<String>,
        L: AsRef<str>,
    {
        let mut builder = Self::builder();
        for (route, level) in entries {
            let route = route.into();
            let parsed = level.as_ref().parse::<AccessLevel>().map_err(|e| {
                PolicyError::UnknownLevel {
                    route: route.clone(),
                    level: e.0,
                }
            })?;
            builder = builder.route(route, parsed);
        }
        builder.build()
    }

    /// Required level for a route
    ///
    /// ## Errors
    ///
    /// `UnknownPolicy` if the route has no entry
    pub fn level_for(&self, route: &str) -> Result<AccessLevel, AuthError> {
        self.routes.get(route).copied().ok_or_else(|| {
            error!(route = %route, "Route has no authorization policy entry");
            AuthError::UnknownPolicy(route.to_string())
        })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RoutePolicyBuilder {
    entries: Vec<(String, AccessLevel)>,
}

impl RoutePolicyBuilder {
    pub fn route(mut self, route: impl Into<String>, level: AccessLevel) -> Self {
        self.entries.push((route.into(), level));
        self
    }

    /// Finish the table; a route declared twice is rejected
    pub fn build(self) -> Result<RoutePolicy, PolicyError> {
        let mut routes = HashMap::with_capacity(self.entries.len());
        for (route, level) in self.entries {
            if routes.contains_key(&route) {
                return Err(PolicyError::DuplicateRoute(route));
            }
            routes.insert(route, level);
        }
        Ok(RoutePolicy { routes })
    }
}

/// Decide whether an authenticated principal may call a route
///
/// `subject_id` is the identifier the request refers to, if the message
/// exposes one. A `SelfOnly` route whose message exposes none cannot be
/// enforced and fails closed as `UnknownPolicy`.
pub fn authorize_for_route(
    route: &str,
    level: AccessLevel,
    principal: &Principal,
    subject_id: Option<i64>,
) -> Result<(), AuthError> {
    match level {
        AccessLevel::Public | AccessLevel::User => Ok(()),
        AccessLevel::SelfOnly => match subject_id {
            Some(id) if principal.is_subject(id) => Ok(()),
            Some(id) => Err(AuthError::PermissionDenied(format!(
                "user {} may not access subject {id}",
                principal.user_id
            ))),
            None => {
                error!(route = %route, "Self policy on a request without a subject id");
                Err(AuthError::UnknownPolicy(route.to_string()))
            }
        },
        AccessLevel::Admin if principal.is_admin() => Ok(()),
        AccessLevel::Admin => Err(AuthError::PermissionDenied(format!(
            "role {} is not admin",
            principal.role
        ))),
    }
}
