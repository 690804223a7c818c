//! Blob upload handler
//!
//! Handles `<blob prefix>camli/upload`: a multipart/form-data body whose
//! sections are named by blob ref and carry the blob bytes.
//!
//! Section problems fall into two classes. A section whose name is not a
//! blob ref is skipped and ingestion continues. A malformed disposition, a
//! read failure or a storage failure ends ingestion for the whole request.
//! Either way the blobs received so far are reported with an HTTP 200.

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header::HOST, HeaderMap, HeaderValue, Method},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use camli_core::storage::RequestContext;
use camli_core::{BlobRef, SizedBlob};

use crate::config::Config;
use crate::error::ApiError;
use crate::handlers::request_context;
use crate::multipart::{read_part, ContentDisposition};
use crate::state::AppState;

/// Request header asking for every received blob to be vivified.
pub const VIVIFY_HEADER: &str = "x-camlistore-vivify";
/// Response header naming a blob that was vivified; repeated per blob.
pub const VIVIFIED_HEADER: &str = "x-camlistore-vivified";

/// One blob stored by this request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedBlob {
    #[schema(example = "sha3-5d41402abc4b2a76b9719d911017c592ae2fbb8e22f7a0e4e8c06a5a8e1a5c1d")]
    pub blob_ref: String,
    pub size: u64,
}

impl From<&SizedBlob> for ReceivedBlob {
    fn from(blob: &SizedBlob) -> Self {
        Self {
            blob_ref: blob.blob_ref.to_string(),
            size: blob.size,
        }
    }
}

/// Upload result
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Largest blob the server accepts, in bytes
    pub max_upload_size: usize,
    /// Advisory lifetime of `uploadUrl`
    pub upload_url_expiration_seconds: u64,
    /// Where to send the next upload
    pub upload_url: String,
    /// Blobs stored by this request, in stream order
    pub received: Vec<ReceivedBlob>,
    /// Newline-separated problems, in the order they happened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

/// Problems collected while handling one upload.
#[derive(Debug, Default)]
struct UploadErrors(Vec<String>);

impl UploadErrors {
    fn add(&mut self, ctx: &RequestContext, message: String) {
        tracing::warn!(request_id = %ctx.request_id, "Client error: {}", message);
        self.0.push(message);
    }

    fn into_text(self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join("\n"))
        }
    }
}

/// Upload blobs
///
/// Each multipart section must be `form-data` named by the blob ref of its
/// body. With `X-Camlistore-Vivify: 1`, every received blob is also
/// vivified and reported in an `X-Camlistore-Vivified` response header.
#[utoipa::path(
    post,
    path = "/bs/camli/upload",
    tag = "Blobs",
    request_body(
        content_type = "multipart/form-data",
        description = "Sections named by blob ref, each carrying that blob's bytes"
    ),
    responses(
        (status = 200, description = "Upload processed; per-blob problems are in errorText", body = UploadResponse),
        (status = 400, description = "Not a POST, or not a multipart/form-data body")
    )
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    if method != Method::POST {
        tracing::warn!(%method, "upload handler called with wrong method");
        return Err(ApiError::bad_request("Inconfigured handler."));
    }
    let mut multipart = multipart.map_err(|e| {
        ApiError::bad_request(format!(
            "Expected multipart/form-data POST request; {}",
            e.body_text()
        ))
    })?;

    let ctx = request_context(&headers);
    let max_blob_size = state.config.max_blob_size;
    let mut received: Vec<SizedBlob> = Vec::new();
    let mut errors = UploadErrors::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                errors.add(&ctx, format!("Error reading multipart section: {e}"));
                break;
            }
        };

        let disposition = match ContentDisposition::of_field(&field) {
            Ok(d) => d,
            Err(e) => {
                tracing::debug!(request_id = %ctx.request_id, error = %e, "bad section disposition");
                errors.add(&ctx, "invalid Content-Disposition".to_string());
                break;
            }
        };
        if !disposition.is_form_data() {
            errors.add(
                &ctx,
                format!(
                    "Expected Content-Disposition of \"form-data\"; got {:?}",
                    disposition.kind()
                ),
            );
            break;
        }

        let form_name = disposition.param("name").unwrap_or_default();
        let Some(blob_ref) = BlobRef::parse(form_name) else {
            errors.add(&ctx, format!("Ignoring form key {form_name:?}"));
            continue;
        };

        let data = match read_part(field, max_blob_size).await {
            Ok(data) => data,
            Err(e) => {
                errors.add(&ctx, format!("Error receiving blob {blob_ref}: {e}"));
                break;
            }
        };
        match state.storage.receive_blob(&ctx, &blob_ref, &data).await {
            Ok(got) => {
                tracing::info!(request_id = %ctx.request_id, blob = %got, "Received blob");
                received.push(got);
            }
            Err(e) => {
                errors.add(&ctx, format!("Error receiving blob {blob_ref}: {e}"));
                break;
            }
        }
    }

    let mut vivified = Vec::new();
    if headers.get(VIVIFY_HEADER).and_then(|v| v.to_str().ok()) == Some("1") {
        for got in &received {
            match state.vivifier.vivify(&ctx, got).await {
                Ok(_) => vivified.push(got.blob_ref.to_string()),
                Err(e) => {
                    if e.is_configuration() {
                        tracing::error!(
                            request_id = %ctx.request_id,
                            category = "configuration",
                            error = %e,
                            "vivify unavailable"
                        );
                    }
                    errors.add(&ctx, format!("Error vivifying blob {}: {e}", got.blob_ref));
                }
            }
        }
    }

    let body = UploadResponse {
        max_upload_size: max_blob_size,
        upload_url_expiration_seconds: state.config.upload_url_expiration_secs,
        upload_url: upload_url(&state.config, &headers),
        received: received.iter().map(ReceivedBlob::from).collect(),
        error_text: errors.into_text(),
    };

    let mut response = Json(body).into_response();
    for blob_ref in vivified {
        let value = HeaderValue::from_str(&blob_ref)
            .map_err(|e| ApiError::internal(format!("invalid header value: {e}")))?;
        response.headers_mut().append(VIVIFIED_HEADER, value);
    }
    Ok(response)
}

/// Absolute upload URL when a base is known, else the bare path.
fn upload_url(config: &Config, headers: &HeaderMap) -> String {
    let base = match &config.base_url {
        Some(base) => base.clone(),
        None => headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(|host| format!("http://{host}"))
            .unwrap_or_default(),
    };
    format!("{base}{}camli/upload", config.blob_prefix)
}
