//! Caller cancellation and deadlines
//!
//! Servers attach a child of the shutdown [`CancellationToken`] to each call's
//! extensions; the deadline comes from the standard `grpc-timeout` entry.

use super::ChainError;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::Extensions;
use tracing::warn;

pub const GRPC_TIMEOUT_KEY: &str = "grpc-timeout";

/// Parse a `grpc-timeout` value: up to 8 digits and a unit (`H M S m u n`)
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || !value.is_ascii() {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}

/// Cancellation state of one call
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Read token and deadline; the deadline is measured from `received_at`
    pub fn from_request(
        metadata: &MetadataMap,
        extensions: &Extensions,
        received_at: Instant,
    ) -> Self {
        let deadline = metadata
            .get(GRPC_TIMEOUT_KEY)
            .and_then(|value| match value.to_str().ok().and_then(parse_grpc_timeout) {
                Some(timeout) => Some(timeout),
                None => {
                    warn!(value = ?value, "Ignoring malformed grpc-timeout");
                    None
                }
            })
            .map(|timeout| received_at + timeout);

        Self {
            token: extensions.get::<CancellationToken>().cloned(),
            deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail if the caller went away or the deadline passed
    pub fn check(&self) -> Result<(), ChainError> {
        if self.is_cancelled() {
            return Err(ChainError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(ChainError::DeadlineExceeded);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grpc_timeout() {
        assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("100m"), Some(Duration::from_millis(100)));
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("7n"), Some(Duration::from_nanos(7)));
        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
        assert_eq!(parse_grpc_timeout("-1S"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passes() {
        let mut metadata = MetadataMap::new();
        metadata.insert(GRPC_TIMEOUT_KEY, "50m".parse().unwrap());

        let cancellation = Cancellation::from_request(&metadata, &Extensions::new(), Instant::now());
        assert!(cancellation.check().is_ok());

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(matches!(cancellation.check(), Err(ChainError::DeadlineExceeded)));
    }

    #[test]
    fn test_cancelled_token() {
        let token = CancellationToken::new();
        let mut extensions = Extensions::new();
        extensions.insert(token.child_token());

        let cancellation =
            Cancellation::from_request(&MetadataMap::new(), &extensions, Instant::now());
        assert!(cancellation.check().is_ok());

        token.cancel();
        assert!(matches!(cancellation.check(), Err(ChainError::Cancelled)));
    }

    #[test]
    fn test_malformed_timeout_is_ignored() {
        let mut metadata = MetadataMap::new();
        metadata.insert(GRPC_TIMEOUT_KEY, "soon".parse().unwrap());

        let cancellation = Cancellation::from_request(&metadata, &Extensions::new(), Instant::now());
        assert!(cancellation.deadline().is_none());
    }
}
