//! Correlation ID utilities for distributed tracing
//!
//! Every inbound call carries a correlation id so that log lines emitted by
//! the gRPC server, the HTTP gateway and the handlers can be joined.
//!
//! ## Implementation Pattern
//! 1. HTTP: `x-correlation-id` header, copied verbatim into gRPC metadata by
//!    the gateway
//! 2. gRPC: read from metadata under the same key
//! 3. Absent or unreadable: a fresh UUID v4 is generated

use tonic::metadata::MetadataMap;
use uuid::Uuid;

/// Metadata / header key for the correlation id
pub const CORRELATION_ID_KEY: &str = "x-correlation-id";

/// Longest caller-supplied id we are willing to echo into logs
const MAX_CORRELATION_ID_LEN: usize = 128;

/// Read the caller's correlation id, or mint a new one
pub fn extract_or_generate(metadata: &MetadataMap) -> String {
    metadata
        .get(CORRELATION_ID_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_CORRELATION_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
