//! API error handling module
//!
//! Provides a unified error type for request-level failures. Per-blob
//! ingestion problems never become an `ApiError`; they are collected into the
//! upload response body instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use camli_core::CamliError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - wrong method/path, malformed body, oversized input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server misconfiguration - a required collaborator or capability is missing
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Core library error
    #[error("Camli error: {0}")]
    Camli(#[from] CamliError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a misconfiguration error
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::Misconfigured(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Misconfigured(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Camli(ref e) => match e {
                // Client-provided payload problems
                CamliError::InvalidBlobRef(_)
                | CamliError::Schema(_)
                | CamliError::MissingField(_)
                | CamliError::InvalidTimestamp { .. }
                | CamliError::SerializationError(_)
                | CamliError::SignatureError(_)
                | CamliError::VerificationFailed(_) => StatusCode::BAD_REQUEST,

                // Key material and storage live on the server
                CamliError::KeyRing(_) | CamliError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Get the error code for programmatic error handling
    fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Misconfigured(_) => "MISCONFIGURED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Camli(ref e) => match e {
                CamliError::InvalidBlobRef(_) => "INVALID_BLOBREF",
                CamliError::Schema(_) => "INVALID_SCHEMA",
                CamliError::MissingField(_) => "MISSING_FIELD",
                CamliError::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
                CamliError::SerializationError(_) => "SERIALIZATION_ERROR",
                CamliError::SignatureError(_) => "SIGNATURE_ERROR",
                CamliError::VerificationFailed(_) => "VERIFICATION_FAILED",
                CamliError::KeyRing(_) => "KEYRING_ERROR",
                CamliError::Storage(_) => "STORAGE_ERROR",
            },
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Misconfigured(_) => "configuration",
            Self::Internal(_) => "internal",
            Self::Camli(CamliError::KeyRing(_)) => "configuration",
            Self::Camli(_) => "camli",
        }
    }

    /// Message returned to the client. Keyring problems are not spelled out.
    fn client_message(&self) -> String {
        match self {
            Self::Camli(CamliError::KeyRing(_)) => "Signing key unavailable".to_string(),
            Self::Camli(e) => e.to_string(),
            Self::BadRequest(msg)
            | Self::Misconfigured(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_client_error() {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        } else {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::misconfigured("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(CamliError::MissingField("camliSigner")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CamliError::KeyRing("gone".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_configuration_category() {
        assert_eq!(ApiError::misconfigured("x").error_category(), "configuration");
        assert_eq!(
            ApiError::from(CamliError::KeyRing("gone".into())).error_category(),
            "configuration"
        );
        assert_eq!(ApiError::bad_request("x").error_category(), "bad_request");
    }

    #[test]
    fn test_client_message_hides_keyring_details() {
        let err = ApiError::from(CamliError::KeyRing("/root/secret/path".into()));
        assert!(!err.client_message().contains("/root"));
        assert_eq!(ApiError::bad_request("nope").client_message(), "nope");
    }
}
