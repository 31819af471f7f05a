//! Process-wide token bucket admission control
//!
//! Tokens refill lazily on every check (`elapsed * refill_per_second`, capped
//! at `capacity`); a request is admitted if a whole token can be taken.
//! Denial is immediate, there is no queue.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateLimitConfigError {
    #[error("rate limit capacity must be at least 1")]
    ZeroCapacity,

    #[error("rate limit refill rate must be a positive finite number, got {0}")]
    InvalidRefillRate(f64),
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last: Instant,
}

/// Shared, thread-safe token bucket
///
/// All state lives behind one lock, so concurrent callers can never spend the
/// same token twice.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_second: f64,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Start with a full bucket
    pub fn new(capacity: u32, refill_per_second: f64) -> Result<Self, RateLimitConfigError> {
        if capacity == 0 {
            return Err(RateLimitConfigError::ZeroCapacity);
        }
        if !refill_per_second.is_finite() || refill_per_second <= 0.0 {
            return Err(RateLimitConfigError::InvalidRefillRate(refill_per_second));
        }

        Ok(Self {
            capacity: f64::from(capacity),
            refill_per_second,
            bucket: Mutex::new(TokenBucket {
                tokens: f64::from(capacity),
                last: Instant::now(),
            }),
        })
    }

    /// Take one token if available
    pub fn allow(&self) -> bool {
        let mut bucket = self.bucket.lock();

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_second).min(self.capacity);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available, after refill
    pub fn available(&self) -> f64 {
        let bucket = self.bucket.lock();
        let elapsed = Instant::now()
            .saturating_duration_since(bucket.last)
            .as_secs_f64();
        (bucket.tokens + elapsed * self.refill_per_second).min(self.capacity)
    }
}
