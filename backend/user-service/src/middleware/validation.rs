//! Schema validation stage
use super::recovery::panic_message;
use super::ChainError;
use crate::validators::{collect_violations, render_violations};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;
use validator::Validate;

/// Run every declared rule on the decoded message
///
/// Violations and engine failures both end the call; only the rendered
/// message differs.
pub fn validate_message<M: Validate>(route: &str, message: &M) -> Result<(), ChainError> {
    match catch_unwind(AssertUnwindSafe(|| message.validate())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(errors)) => Err(ChainError::Validation(render_violations(
            &collect_violations(&errors),
        ))),
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            error!(route = %route, error = %detail, "Validation engine failed");
            Err(ChainError::ValidationRuntime(detail))
        }
    }
}
