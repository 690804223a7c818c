//! JSON signing endpoints
//!
//! Everything below the signing handler's mount prefix is dispatched here on
//! (method, sub-path):
//!
//! | method | sub-path              | result                         |
//! |--------|-----------------------|--------------------------------|
//! | GET    | *(empty)*             | 302 to the discovery document  |
//! | GET    | `camli/<key ref>`     | armored public key             |
//! | GET    | `camli/sig/discovery` | discovery document             |
//! | POST   | `camli/sig/sign`      | signed JSON text               |
//! | POST   | `camli/sig/verify`    | verification result            |
//!
//! GET on sign or verify answers `POST required`; anything else is a 400.

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::request_context;
use crate::registry::Mounted;
use crate::signing::{DiscoveryDocument, SignHandler, DISCOVERY_PATH, SIGN_PATH, VERIFY_PATH};
use crate::state::AppState;
use crate::validation::{require_param, validate_param_length, MAX_JSON_LENGTH};

/// Form accepted by the sign endpoint.
#[derive(Debug, Deserialize)]
pub struct SignForm {
    json: Option<String>,
}

/// Form accepted by the verify endpoint.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    sjson: Option<String>,
}

/// Verification result. Always returned with HTTP 200.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// 1 when the signature is valid, 0 otherwise
    #[schema(example = 1)]
    pub signature_valid: u8,
    /// Key id of the signer, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_key_id: Option<String>,
    /// The signed object without its signature, on success
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub verified_data: Option<serde_json::Value>,
    /// Why verification failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Dispatch a request below the signing handler's prefix.
pub async fn sig_handler(State(state): State<AppState>, req: Request) -> Response {
    let Some(mounted) = state.registry.find_json_sign().cloned() else {
        return ApiError::misconfigured("jsonsign handler not configured").into_response();
    };
    let method = req.method().clone();
    let sub_path = req
        .uri()
        .path()
        .strip_prefix(mounted.prefix.as_str())
        .unwrap_or_default()
        .to_string();

    let result = if method == Method::GET {
        match sub_path.as_str() {
            "" => Ok(redirect_to_discovery(&mounted.prefix)),
            path if path == mounted.handler.public_key_serve_suffix() => {
                Ok(public_key(&mounted.handler))
            }
            SIGN_PATH | VERIFY_PATH => Err(ApiError::bad_request("POST required")),
            DISCOVERY_PATH => Ok(Json(discovery(&mounted)).into_response()),
            _ => Err(unsupported()),
        }
    } else if method == Method::POST {
        match sub_path.as_str() {
            SIGN_PATH => handle_sign(&mounted.handler, req).await,
            VERIFY_PATH => handle_verify(&mounted.handler, req).await,
            _ => Err(unsupported()),
        }
    } else {
        Err(unsupported())
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

fn unsupported() -> ApiError {
    ApiError::bad_request("Unsupported path or method.")
}

fn redirect_to_discovery(base: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, format!("{base}{DISCOVERY_PATH}"))],
    )
        .into_response()
}

fn public_key(handler: &SignHandler) -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        handler.public_key_bytes().to_vec(),
    )
        .into_response()
}

/// Signing service discovery
#[utoipa::path(
    get,
    path = "/sighelper/camli/sig/discovery",
    tag = "Signing",
    responses(
        (status = 200, description = "Signing service capabilities", body = DiscoveryDocument)
    )
)]
pub fn discovery(mounted: &Mounted<SignHandler>) -> DiscoveryDocument {
    mounted.handler.discovery_document(&mounted.prefix)
}

/// Sign a JSON object
///
/// Takes the unsigned object in the `json` form field. The server's key is
/// added as `camliSigner` when the object names none; a `claimDate` in the
/// object becomes the signature time.
#[utoipa::path(
    post,
    path = "/sighelper/camli/sig/sign",
    tag = "Signing",
    request_body(
        content_type = "application/x-www-form-urlencoded",
        description = "`json`: the unsigned object, at most 1 MiB"
    ),
    responses(
        (status = 200, description = "Signed JSON text", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing, oversized or unsignable payload")
    )
)]
pub async fn handle_sign(handler: &SignHandler, req: Request) -> Result<Response, ApiError> {
    let ctx = request_context(req.headers());
    let Form(form) = Form::<SignForm>::from_request(req, &())
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;

    let json = require_param(form.json.as_deref(), "json")?;
    validate_param_length(json, "json", MAX_JSON_LENGTH)?;

    let signed = handler.sign_json(&ctx, json).await?;
    tracing::debug!(request_id = %ctx.request_id, "signed JSON for client");
    Ok(signed.into_response())
}

/// Verify a signed JSON object
///
/// Takes the signed text in the `sjson` form field. An invalid signature is
/// reported in the body, not through the status code.
#[utoipa::path(
    post,
    path = "/sighelper/camli/sig/verify",
    tag = "Signing",
    request_body(
        content_type = "application/x-www-form-urlencoded",
        description = "`sjson`: the signed object"
    ),
    responses(
        (status = 200, description = "Verification result", body = VerifyResponse),
        (status = 400, description = "Missing sjson parameter")
    )
)]
pub async fn handle_verify(handler: &SignHandler, req: Request) -> Result<Response, ApiError> {
    let ctx = request_context(req.headers());
    let Form(form) = Form::<VerifyForm>::from_request(req, &())
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;
    let sjson = require_param(form.sjson.as_deref(), "sjson")?;

    let body = match handler.verify(&ctx, sjson).await {
        Ok(verified) => VerifyResponse {
            signature_valid: 1,
            signer_key_id: Some(verified.signer_key_id),
            verified_data: Some(serde_json::Value::Object(verified.payload)),
            error_message: None,
        },
        Err(e) => {
            tracing::debug!(request_id = %ctx.request_id, error = %e, "signature did not verify");
            VerifyResponse {
                signature_valid: 0,
                signer_key_id: None,
                verified_data: None,
                error_message: Some(e.to_string()),
            }
        }
    };
    Ok(Json(body).into_response())
}
