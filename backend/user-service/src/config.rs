//! Configuration management for User Service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! # Example
//!
//! ```no_run
//! use user_service::config::Settings;
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     println!("gRPC port: {}", settings.server.grpc_port);
//!     Ok(())
//! }
//! ```

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Application settings, loaded once and immutable afterward
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub rate_limit: RateLimitSettings,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Settings {
    /// Load settings from the process environment
    pub fn load() -> Result<Self> {
        // Load .env file in development
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("Loaded .env file for development");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Settings {
            server: ServerSettings::from_lookup(&lookup)?,
            database: DatabaseSettings::from_lookup(&lookup)?,
            jwt: JwtSettings::from_lookup(&lookup)?,
            rate_limit: RateLimitSettings::from_lookup(&lookup)?,
            bootstrap_admin: BootstrapAdmin::from_lookup(&lookup)?,
        })
    }
}

/// Parse `key` with a default when unset
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key}")),
        None => Ok(default),
    }
}

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub grpc_port: u16,
    pub http_port: u16,
}

impl ServerSettings {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        Ok(Self {
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            grpc_port: parse_or(lookup, "GRPC_PORT", 50051)?,
            http_port: parse_or(lookup, "HTTP_PORT", 8080)?,
        })
    }

    pub fn grpc_addr(&self) -> String {
        format!("{}:{}", self.host, self.grpc_port)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

/// Database connection settings
#[derive(Clone)]
pub struct DatabaseSettings {
    /// Unset means in-memory storage
    pub url: Option<String>,
    pub max_connections: u32,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URL may carry credentials
        f.debug_struct("DatabaseSettings")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DatabaseSettings {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        Ok(Self {
            url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections: parse_or(lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
        })
    }
}

/// Longest accepted session lifetime
pub const MAX_SESSION_DAYS: i64 = 365;

/// Session token settings
#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub session_days: i64,
}

impl fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("session_days", &self.session_days)
            .finish()
    }
}

impl JwtSettings {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        let secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let session_days = parse_or(lookup, "JWT_SESSION_DAYS", 7)?;
        if !(1..=MAX_SESSION_DAYS).contains(&session_days) {
            bail!("JWT_SESSION_DAYS must be between 1 and {MAX_SESSION_DAYS}");
        }

        Ok(Self {
            secret,
            session_days,
        })
    }
}

/// Token bucket settings
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub capacity: u32,
    pub refill_per_second: f64,
}

impl RateLimitSettings {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Self> {
        Ok(Self {
            capacity: parse_or(lookup, "RATE_LIMIT_CAPACITY", 100)?,
            refill_per_second: parse_or(lookup, "RATE_LIMIT_REFILL_PER_SECOND", 50.0)?,
        })
    }
}

/// Admin account created at startup when absent
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl BootstrapAdmin {
    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Result<Option<Self>> {
        match (
            lookup("BOOTSTRAP_ADMIN_USERNAME"),
            lookup("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Ok(Some(Self { username, password })),
            (None, None) => Ok(None),
            _ => bail!("BOOTSTRAP_ADMIN_USERNAME and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        }
    }
}
