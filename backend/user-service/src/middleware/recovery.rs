//! Panic recovery around business handlers
use super::ChainError;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tonic::Status;
use tracing::error;

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Await a handler, turning a panic into a generic `Internal` status
pub async fn recover<T, F>(route: &str, handler: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            error!(route = %route, panic = %detail, "Handler panicked");
            Err(ChainError::Panic(detail).into())
        }
    }
}
