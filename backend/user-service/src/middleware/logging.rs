//! Request logging capability
//!
//! The chain reports the start and the outcome of every admitted call to a
//! [`RequestLog`] handed to it at construction.

use std::time::Duration;
use tonic::Code;

/// Outcome of one call as seen by the logging stage
#[derive(Debug, Clone)]
pub struct RequestRecord<'a> {
    pub route: &'a str,
    pub correlation_id: &'a str,
    pub code: Code,
    pub latency: Duration,
    /// Authenticated caller, if any
    pub user_id: Option<i64>,
}

/// Sink for per-request log events
pub trait RequestLog: Send + Sync {
    fn request_started(&self, route: &str, correlation_id: &str);

    fn request_finished(&self, record: &RequestRecord<'_>);
}

/// Default sink: structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRequestLog;

impl RequestLog for TracingRequestLog {
    fn request_started(&self, route: &str, correlation_id: &str) {
        tracing::info!(
            route = %route,
            correlation_id = %correlation_id,
            "gRPC request started"
        );
    }

    fn request_finished(&self, record: &RequestRecord<'_>) {
        let latency_ms = record.latency.as_millis() as u64;
        match record.code {
            Code::Ok => tracing::info!(
                route = %record.route,
                correlation_id = %record.correlation_id,
                code = ?record.code,
                user_id = record.user_id,
                latency_ms,
                "gRPC request completed"
            ),
            Code::Internal | Code::Unknown | Code::DataLoss | Code::Unavailable => {
                tracing::error!(
                    route = %record.route,
                    correlation_id = %record.correlation_id,
                    code = ?record.code,
                    user_id = record.user_id,
                    latency_ms,
                    "gRPC request failed"
                )
            }
            _ => tracing::warn!(
                route = %record.route,
                correlation_id = %record.correlation_id,
                code = ?record.code,
                user_id = record.user_id,
                latency_ms,
                "gRPC request rejected"
            ),
        }
    }
}
