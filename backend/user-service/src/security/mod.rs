/// Credential handling for user-service
pub mod password;

pub use password::{hash_password, verify_password, PasswordError};
