//! Signing key material.
//!
//! Secret keys live in a JSON keyring file; public keys are exported in a
//! small armored text form whose blob ref names the signer in signed blobs.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CamliError, Result};

pub const ARMOR_HEADER: &str = "-----BEGIN CAMLI ED25519 PUBLIC KEY-----";
pub const ARMOR_FOOTER: &str = "-----END CAMLI ED25519 PUBLIC KEY-----";

/// Upper-case hex of the last 8 bytes of SHA3-256 over the public key.
pub fn key_id(public_key: &VerifyingKey) -> String {
    let digest = Sha3_256::digest(public_key.as_bytes());
    hex::encode_upper(&digest[digest.len() - 8..])
}

/// Whether `selector` names `key_id`, either in full or by its short
/// (last eight hex digits) form.
pub fn key_id_matches(key_id: &str, selector: &str) -> bool {
    let selector = selector.trim();
    let selector = selector
        .strip_prefix("0x")
        .or_else(|| selector.strip_prefix("0X"))
        .unwrap_or(selector)
        .to_ascii_uppercase();
    if selector.is_empty() {
        return false;
    }
    key_id == selector || (selector.len() == 8 && key_id.ends_with(&selector))
}

pub fn armored_public_key(public_key: &VerifyingKey) -> String {
    format!(
        "{ARMOR_HEADER}\n{}\n{ARMOR_FOOTER}\n",
        BASE64.encode(public_key.as_bytes())
    )
}

pub fn parse_armored_public_key(armored: &str) -> Result<VerifyingKey> {
    let body = armored
        .trim()
        .strip_prefix(ARMOR_HEADER)
        .and_then(|rest| rest.strip_suffix(ARMOR_FOOTER))
        .ok_or_else(|| CamliError::KeyRing("public key is not armored".into()))?;
    let raw = BASE64
        .decode(body.trim())
        .map_err(|e| CamliError::KeyRing(format!("public key base64: {e}")))?;
    let bytes: [u8; PUBLIC_KEY_LENGTH] = raw.as_slice().try_into().map_err(|_| {
        CamliError::KeyRing(format!(
            "public key is {} bytes, expected {PUBLIC_KEY_LENGTH}",
            raw.len()
        ))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| CamliError::KeyRing(format!("invalid public key: {e}")))
}

/// A local signer: secret key plus derived identifiers.
pub struct SecretEntity {
    signing_key: SigningKey,
    key_id: String,
}

impl SecretEntity {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let key_id = key_id(&signing_key.verifying_key());
        Self {
            signing_key,
            key_id,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn armored_public_key(&self) -> String {
        armored_public_key(&self.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl std::fmt::Debug for SecretEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretEntity")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
struct KeyRingEntry {
    key_id: String,
    secret_key: String,
}

/// Contents of a secret keyring file.
#[derive(Serialize, Deserialize, Default)]
pub struct KeyRing {
    keys: Vec<KeyRingEntry>,
}

impl KeyRing {
    pub fn load(path: &Path) -> Result<Self> {
        let text = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            CamliError::KeyRing(format!("reading secret keyring {}: {e}", path.display()))
        })?);
        serde_json::from_str(&text).map_err(|e| {
            CamliError::KeyRing(format!("parsing secret keyring {}: {e}", path.display()))
        })
    }

    pub fn from_entities<'e>(entities: impl IntoIterator<Item = &'e SecretEntity>) -> Self {
        let keys = entities
            .into_iter()
            .map(|e| KeyRingEntry {
                key_id: e.key_id.clone(),
                secret_key: BASE64.encode(e.signing_key.to_bytes()),
            })
            .collect();
        Self { keys }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let text = Zeroizing::new(serde_json::to_string_pretty(self)?);
        fs::write(path, text.as_bytes()).map_err(|e| {
            CamliError::KeyRing(format!("writing secret keyring {}: {e}", path.display()))
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The entity whose key id matches `selector`.
    pub fn entity(&self, selector: &str) -> Result<SecretEntity> {
        for entry in &self.keys {
            let raw = Zeroizing::new(
                BASE64
                    .decode(entry.secret_key.trim())
                    .map_err(|e| CamliError::KeyRing(format!("secret key base64: {e}")))?,
            );
            let seed: Zeroizing<[u8; 32]> =
                Zeroizing::new(raw.as_slice().try_into().map_err(|_| {
                    CamliError::KeyRing(format!(
                        "secret key for {} is {} bytes, expected 32",
                        entry.key_id,
                        raw.len()
                    ))
                })?);
            let entity = SecretEntity::from_seed(&seed);
            if !entry.key_id.is_empty() && !key_id_matches(&entity.key_id, &entry.key_id) {
                return Err(CamliError::KeyRing(format!(
                    "keyring entry {} does not match its secret key ({})",
                    entry.key_id, entity.key_id
                )));
            }
            if key_id_matches(&entity.key_id, selector) {
                return Ok(entity);
            }
        }
        Err(CamliError::KeyRing(format!(
            "no secret key with id {selector:?} in keyring"
        )))
    }
}

/// Load the secret entity `selector` from the keyring at `path`.
pub fn entity_from_secring(selector: &str, path: &Path) -> Result<SecretEntity> {
    KeyRing::load(path)?.entity(selector)
}
