//! Request parameter validation
//!
//! Checks applied to sign/verify form parameters before any parsing or
//! cryptographic work is done on them.

use crate::error::ApiError;

/// Largest accepted `json` parameter on the sign endpoint (1 MiB).
pub const MAX_JSON_LENGTH: usize = 1024 * 1024;

/// Return the named form parameter, rejecting a missing or empty value.
pub fn require_param<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("missing \"{name}\" parameter"))),
    }
}

/// Reject a parameter longer than `max` bytes.
pub fn validate_param_length(value: &str, name: &str, max: usize) -> Result<(), ApiError> {
    if value.len() > max {
        Err(ApiError::bad_request(format!(
            "parameter \"{name}\" too large"
        )))
    } else {
        Ok(())
    }
}
