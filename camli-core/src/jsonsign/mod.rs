//! Signing and verification of JSON schema blobs.
//!
//! A signed blob is the canonical JSON of the payload with its closing brace
//! replaced by a `camliSig` member:
//!
//! ```text
//! {
//!   "camliSigner": "sha3-…",
//!   "camliType": "permanode",
//!   …
//! ,"camliSig":"<base64(time ‖ signature)>"}
//! ```
//!
//! The signature covers everything before `,"camliSig":"` followed by the
//! 8-byte big-endian signature time (unix seconds), which is also carried in
//! the first 8 bytes of the decoded `camliSig`. The signer is recovered from
//! the payload's `camliSigner` ref, resolved through a fetcher.

pub mod keys;

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, VerifyingKey, SIGNATURE_LENGTH};
use serde_json::{Map, Value};

use crate::blobref::BlobRef;
use crate::canonical::canonical_json;
use crate::error::{CamliError, Result};
use crate::schema::parse_rfc3339;
use crate::storage::{BlobSeeker, RequestContext, StreamingFetcher};

pub use keys::{
    armored_public_key, entity_from_secring, key_id, key_id_matches, parse_armored_public_key,
    KeyRing, SecretEntity,
};

/// Separator between payload and signature in a signed blob.
pub const CAMLI_SIG_MARKER: &str = ",\"camliSig\":\"";

const TIME_LEN: usize = 8;

/// A request to sign one JSON object.
pub struct SignRequest<'a> {
    pub ctx: &'a RequestContext,
    /// Unsigned payload; must be an object with a `camliSigner` ref.
    pub unsigned_json: &'a str,
    /// Resolves `camliSigner` to the armored public key.
    pub fetcher: &'a dyn StreamingFetcher,
    /// Server mode honors an explicit keyring override and takes the
    /// signature time from the payload's `claimDate` when present.
    pub server_mode: bool,
    pub secret_keyring_path: Option<&'a Path>,
    /// Keyring consulted when no override applies.
    pub default_keyring_path: &'a Path,
    /// Explicit signature time; wins over every default.
    pub signature_time: Option<DateTime<Utc>>,
}

impl SignRequest<'_> {
    fn secret_keyring(&self) -> &Path {
        match (self.server_mode, self.secret_keyring_path) {
            (true, Some(path)) => path,
            _ => self.default_keyring_path,
        }
    }

    fn signature_time(&self, payload: &Map<String, Value>) -> Result<DateTime<Utc>> {
        if let Some(t) = self.signature_time {
            return Ok(t);
        }
        if self.server_mode {
            if let Some(claim_date) = payload.get("claimDate") {
                let raw = claim_date.as_str().ok_or_else(|| {
                    CamliError::Schema("claimDate must be a string".into())
                })?;
                return parse_rfc3339(raw);
            }
        }
        Ok(Utc::now())
    }

    pub async fn sign(&self) -> Result<String> {
        let payload = parse_object(self.unsigned_json)?;
        let signer = signer_ref(&payload)?;
        let public_key = fetch_public_key(self.ctx, self.fetcher, &signer).await?;
        let entity = entity_from_secring(&key_id(&public_key), self.secret_keyring())?;
        if entity.verifying_key() != public_key {
            return Err(CamliError::SignatureError(format!(
                "secret key {} does not match camliSigner {signer}",
                entity.key_id()
            )));
        }

        let signed_at = self.signature_time(&payload)?.timestamp();
        let canonical = canonical_json(&Value::Object(payload))?;
        let body = strip_closing_brace(&canonical)?;

        let signature = entity.sign(&signed_message(body, signed_at));
        let mut packet = Vec::with_capacity(TIME_LEN + SIGNATURE_LENGTH);
        packet.extend_from_slice(&signed_at.to_be_bytes());
        packet.extend_from_slice(&signature.to_bytes());

        tracing::debug!(
            signer = %signer,
            key_id = %entity.key_id(),
            signed_at,
            "signed JSON payload"
        );
        Ok(format!(
            "{body}{CAMLI_SIG_MARKER}{}\"}}\n",
            BASE64.encode(packet)
        ))
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedPayload {
    pub signer: BlobRef,
    pub signer_key_id: String,
    pub signature_time: DateTime<Utc>,
    /// The signed object without its `camliSig` member.
    pub payload: Map<String, Value>,
}

/// Verify a signed blob, resolving its signer through `fetcher`.
///
/// Any failure, including a signature that simply does not match, is
/// returned as an error describing why the blob is not valid.
pub async fn verify(
    ctx: &RequestContext,
    signed_json: &str,
    fetcher: &dyn StreamingFetcher,
) -> Result<VerifiedPayload> {
    let trimmed = signed_json.trim_end();
    if !trimmed.starts_with('{') {
        return Err(CamliError::VerificationFailed(
            "signed JSON does not begin with '{'".into(),
        ));
    }
    let sig_index = trimmed
        .rfind(CAMLI_SIG_MARKER)
        .ok_or_else(|| CamliError::VerificationFailed("no camliSig found".into()))?;
    let body = &trimmed[..sig_index];
    let encoded = trimmed[sig_index + CAMLI_SIG_MARKER.len()..]
        .strip_suffix("\"}")
        .ok_or_else(|| CamliError::VerificationFailed("malformed camliSig trailer".into()))?;

    let payload = parse_object(&format!("{body}}}"))?;
    let signer = signer_ref(&payload)?;
    let public_key = fetch_public_key(ctx, fetcher, &signer).await?;

    let packet = BASE64
        .decode(encoded)
        .map_err(|e| CamliError::VerificationFailed(format!("camliSig base64: {e}")))?;
    if packet.len() != TIME_LEN + SIGNATURE_LENGTH {
        return Err(CamliError::VerificationFailed(format!(
            "camliSig is {} bytes, expected {}",
            packet.len(),
            TIME_LEN + SIGNATURE_LENGTH
        )));
    }
    let (time_bytes, sig_bytes) = packet.split_at(TIME_LEN);
    let mut time_buf = [0u8; TIME_LEN];
    time_buf.copy_from_slice(time_bytes);
    let signed_at = i64::from_be_bytes(time_buf);
    let signature = Signature::from_slice(sig_bytes)
        .map_err(|e| CamliError::VerificationFailed(format!("camliSig: {e}")))?;

    public_key
        .verify_strict(&signed_message(body, signed_at), &signature)
        .map_err(|_| CamliError::VerificationFailed("signature does not match".into()))?;

    let signature_time = DateTime::from_timestamp(signed_at, 0).ok_or_else(|| {
        CamliError::VerificationFailed(format!("signature time {signed_at} out of range"))
    })?;

    Ok(VerifiedPayload {
        signer,
        signer_key_id: key_id(&public_key),
        signature_time,
        payload,
    })
}

/// Fetch and parse the armored public key stored under `signer`.
pub async fn fetch_public_key(
    ctx: &RequestContext,
    fetcher: &dyn StreamingFetcher,
    signer: &BlobRef,
) -> Result<VerifyingKey> {
    let armored = BlobSeeker::new(fetcher)
        .fetch_all(ctx, signer)
        .await
        .map_err(|e| {
            CamliError::SignatureError(format!("fetching public key {signer}: {e}"))
        })?;
    let armored = String::from_utf8(armored)
        .map_err(|_| CamliError::KeyRing(format!("public key {signer} is not UTF-8")))?;
    parse_armored_public_key(&armored)
}

fn parse_object(json: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CamliError::Schema("JSON payload must be an object".into())),
        Err(e) => Err(CamliError::Schema(format!("invalid JSON payload: {e}"))),
    }
}

fn signer_ref(payload: &Map<String, Value>) -> Result<BlobRef> {
    let raw = payload
        .get("camliSigner")
        .ok_or(CamliError::MissingField("camliSigner"))?;
    raw.as_str()
        .and_then(BlobRef::parse)
        .ok_or_else(|| CamliError::InvalidBlobRef(raw.to_string()))
}

fn strip_closing_brace(canonical: &str) -> Result<&str> {
    let trimmed = canonical.trim_end();
    if !trimmed.starts_with('{') {
        return Err(CamliError::Schema("JSON payload must start with '{'".into()));
    }
    trimmed
        .strip_suffix('}')
        .ok_or_else(|| CamliError::Schema("JSON payload must end with '}'".into()))
}

fn signed_message(body: &str, signed_at: i64) -> Vec<u8> {
    let mut message = Vec::with_capacity(body.len() + TIME_LEN);
    message.extend_from_slice(body.as_bytes());
    message.extend_from_slice(&signed_at.to_be_bytes());
    message
}
