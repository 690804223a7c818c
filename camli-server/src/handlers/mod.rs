//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod sig;
pub mod upload;

use axum::http::HeaderMap;
use camli_core::storage::RequestContext;
use uuid::Uuid;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use sig::{sig_handler, VerifyResponse};
pub use upload::{upload_handler, ReceivedBlob, UploadResponse};

/// Header carrying the per-request id set by the request-id layer.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Storage context for one request, reusing the inbound request id when it
/// is a UUID.
pub(crate) fn request_context(headers: &HeaderMap) -> RequestContext {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .map(|request_id| RequestContext { request_id })
        .unwrap_or_default()
}
