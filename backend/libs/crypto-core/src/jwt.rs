/// Session token issuance and validation for Nova services
///
/// Tokens are HS256-signed JWTs carrying the user's id (`sub`), username and
/// role. The signing secret and session lifetime are held by a
/// [`TokenAuthenticator`] built once at startup and shared read-only.
///
/// ## Security Design
///
/// - **HS256 ONLY**: the validator pins the algorithm, so a token whose header
///   names any other algorithm is rejected
/// - **Zero leeway**: a token is invalid from the second its `exp` passes
/// - **Opaque failures**: expired, tampered and malformed tokens all surface as
///   [`JwtError::InvalidToken`]
///
/// ## Usage
///
/// ```rust
/// use crypto_core::jwt::{Role, TokenAuthenticator};
///
/// let authenticator = TokenAuthenticator::new(b"dev-secret", 7).unwrap();
/// let token = authenticator.generate(42, "alice", Role::Default).unwrap();
/// let claims = authenticator.parse_and_validate(&token).unwrap();
/// assert_eq!(claims.subject_id().unwrap(), 42);
/// ```
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

/// JWT algorithm - symmetric MAC over the configured secret
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Registered claims that must be present for a token to be accepted
const REQUIRED_CLAIMS: [&str; 3] = ["sub", "iat", "exp"];

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum JwtError {
    /// Secret or lifetime misconfiguration detected at construction time
    #[error("invalid token configuration: {0}")]
    Configuration(&'static str),

    /// Signing failed; always a server-side fault
    #[error("failed to sign session token: {0}")]
    Signing(String),

    /// Signature mismatch, malformed structure, missing claim or expiry
    #[error("token validation failed: {0}")]
    InvalidToken(String),
}

/// A role name that is neither `default` nor `admin`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

// ============================================================================
// Data Structures
// ============================================================================

/// Authorization role embedded in every session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Default,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Default => "default",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Role::Default),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// JWT Claims structure - registered claims plus session fields
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user id rendered as a decimal string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Username, echoed for logging and authorization
    pub username: String,
    /// Authorization role
    pub role: Role,
}

impl Claims {
    /// Parse the numeric subject id out of `sub`
    pub fn subject_id(&self) -> Result<i64, JwtError> {
        self.sub
            .parse::<i64>()
            .map_err(|e| JwtError::InvalidToken(format!("invalid subject: {e}")))
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// Issues and validates signed session tokens
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    session_ttl: Duration,
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("algorithm", &JWT_ALGORITHM)
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenAuthenticator {
    /// Build an authenticator from the shared secret and session length
    ///
    /// ## Errors
    ///
    /// Returns [`JwtError::Configuration`] if the secret is empty or
    /// `session_days` is not positive or puts `exp` beyond the representable
    /// time range.
    pub fn new(secret: &[u8], session_days: i64) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::Configuration("signing secret must not be empty"));
        }
        if session_days < 1 {
            return Err(JwtError::Configuration("session days must be at least 1"));
        }
        let session_ttl = Duration::try_days(session_days)
            .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
            .ok_or(JwtError::Configuration("session days out of range"))?;

        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            session_ttl,
        })
    }

    /// Lifetime of every token issued by this authenticator
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Issue a session token for a freshly authenticated user
    pub fn generate(&self, subject_id: i64, username: &str, role: Role) -> Result<String, JwtError> {
        self.generate_at(subject_id, username, role, Utc::now())
    }

    /// Issue a session token as if it had been created at `issued_at`
    ///
    /// `expires_at` is always `issued_at + session_days`.
    pub fn generate_at(
        &self,
        subject_id: i64,
        username: &str,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let expires_at = issued_at
            .checked_add_signed(self.session_ttl)
            .ok_or_else(|| JwtError::Signing("expiry out of range".to_string()))?;

        let claims = Claims {
            sub: subject_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            username: username.to_string(),
            role,
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify signature, structure and expiry of a token
    ///
    /// ## Errors
    ///
    /// Every failure is reported as [`JwtError::InvalidToken`]; callers must
    /// not tell an expired token apart from a forged one.
    pub fn parse_and_validate(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

        // `sub` must be a numeric user id, not just any string
        token_data.claims.subject_id()?;

        Ok(token_data.claims)
    }
}

// ============================================================================
// Tests
// ============================================================================
