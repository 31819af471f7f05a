/// gRPC surface of user-service
///
/// Generated `users` package, route identifiers, the route policy table and
/// conversions between storage records and wire messages.
pub mod server;

pub use server::UsersServiceImpl;

// Import generated protobuf types
pub mod users {
    tonic::include_proto!("users");
}

use crate::middleware::RouteMessage;
use crate::models::User;
use crypto_core::jwt::Role;
use grpc_jwt_propagation::{AccessLevel, PolicyError, RoutePolicy};

/// Fully-qualified route identifiers
pub mod routes {
    pub const CREATE_USER: &str = "/users.UsersService/CreateUser";
    pub const LOGIN: &str = "/users.UsersService/Login";
    pub const GET_USER: &str = "/users.UsersService/GetUser";
    pub const GET_ME: &str = "/users.UsersService/GetMe";
    pub const LIST_USERS: &str = "/users.UsersService/ListUsers";
}

/// Authorization level of every externally reachable route
pub fn default_policy() -> Result<RoutePolicy, PolicyError> {
    RoutePolicy::builder()
        .route(routes::CREATE_USER, AccessLevel::Public)
        .route(routes::LOGIN, AccessLevel::Public)
        .route(routes::GET_USER, AccessLevel::SelfOnly)
        .route(routes::GET_ME, AccessLevel::User)
        .route(routes::LIST_USERS, AccessLevel::Admin)
        .build()
}

impl RouteMessage for users::CreateUserRequest {}
impl RouteMessage for users::LoginRequest {}
impl RouteMessage for users::GetMeRequest {}
impl RouteMessage for users::ListUsersRequest {}

impl RouteMessage for users::GetUserRequest {
    fn subject_id(&self) -> Option<i64> {
        Some(self.id)
    }
}

impl From<Role> for users::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::Default => users::Role::Default,
            Role::Admin => users::Role::Admin,
        }
    }
}

impl From<&User> for users::User {
    fn from(user: &User) -> Self {
        users::User {
            id: user.id,
            username: user.username.clone(),
            role: users::Role::from(user.role) as i32,
            created_at: user.created_at.timestamp(),
        }
    }
}

/// JSON form of `User.role`: `"default"` / `"admin"` instead of the enum number
pub mod role_json {
    use super::users::Role;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i32, serializer: S) -> Result<S::Ok, S::Error> {
        let name = match Role::try_from(*value) {
            Ok(Role::Default) => "default",
            Ok(Role::Admin) => "admin",
            Err(_) => "unknown",
        };
        serializer.serialize_str(name)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        match String::deserialize(deserializer)?.as_str() {
            "default" => Ok(Role::Default as i32),
            "admin" => Ok(Role::Admin as i32),
            other => Err(de::Error::custom(format!("unknown role: {other}"))),
        }
    }
}
