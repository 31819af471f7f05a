/// Data models for user management
pub mod user;

pub use user::{NewUser, User};
