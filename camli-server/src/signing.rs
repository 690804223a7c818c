//! JSON signing service
//!
//! Owns the server's signing identity: the selected secret key, its exported
//! public key (served from memory and optionally mirrored into a storage
//! target) and the discovery document describing the sign/verify endpoints.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use utoipa::ToSchema;

use camli_core::jsonsign::{self, entity_from_secring, SignRequest, VerifiedPayload};
use camli_core::schema::Builder;
use camli_core::storage::{BlobStorage, MemoryStore, RequestContext};
use camli_core::{BlobRef, CamliError, StorageError};

use crate::config::Config;
use crate::registry::StorageRegistry;

/// Sub-path of the sign endpoint below the handler's mount prefix.
pub const SIGN_PATH: &str = "camli/sig/sign";
/// Sub-path of the verify endpoint.
pub const VERIFY_PATH: &str = "camli/sig/verify";
/// Sub-path of the discovery endpoint.
pub const DISCOVERY_PATH: &str = "camli/sig/discovery";

/// Settings the signing handler is built from.
#[derive(Debug, Clone)]
pub struct SignHandlerConfig {
    /// Full or short key id selecting the signing key
    pub key_id: String,
    /// Explicit keyring path
    pub secret_ring: Option<PathBuf>,
    /// Keyring consulted when no explicit path is set
    pub default_secret_ring: PathBuf,
    /// Storage prefix to mirror the public key into
    pub public_key_dest: Option<String>,
}

impl SignHandlerConfig {
    /// Derive handler settings from server config. `None` without a key id.
    pub fn from_config(config: &Config) -> Option<Self> {
        Some(Self {
            key_id: config.key_id.clone()?,
            secret_ring: config.secret_ring.clone(),
            default_secret_ring: config.default_secret_ring.clone(),
            public_key_dest: config.public_key_dest.clone(),
        })
    }

    fn secret_ring_path(&self) -> &std::path::Path {
        self.secret_ring
            .as_deref()
            .unwrap_or(&self.default_secret_ring)
    }
}

/// Failures while constructing a [`SignHandler`].
#[derive(Debug, Error)]
pub enum SignSetupError {
    #[error(transparent)]
    Camli(#[from] CamliError),

    #[error("no storage mounted at {0:?} for publicKeyDest")]
    UnknownDestination(String),

    #[error("Error seeding self public key in storage: {0}")]
    Publish(#[source] StorageError),
}

/// Capabilities of the signing service, as served on the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryDocument {
    /// Key id of the signing key
    #[schema(example = "9F3C2A1B7E5D4C60")]
    pub public_key_id: String,
    /// URL path of the sign endpoint
    #[schema(example = "/sighelper/camli/sig/sign")]
    pub sign_handler: String,
    /// URL path of the verify endpoint
    #[schema(example = "/sighelper/camli/sig/verify")]
    pub verify_handler: String,
    /// Blob ref of the armored public key
    pub public_key_blob_ref: String,
    /// URL path serving the armored public key
    pub public_key: String,
}

pub struct SignHandler {
    secret_ring: Option<PathBuf>,
    default_secret_ring: PathBuf,

    key_id: String,
    armored_public_key: String,
    pub_key_ref: BlobRef,
    pub_key_fetcher: MemoryStore,
    pub_key_serve_suffix: String,

    pub_key_dest: Option<Arc<dyn BlobStorage>>,
    pub_key_published: OnceCell<()>,
}

impl SignHandler {
    /// Load the signing key and publish its public half if a destination is
    /// configured.
    pub async fn new(
        config: SignHandlerConfig,
        storages: &StorageRegistry,
    ) -> Result<Self, SignSetupError> {
        let entity = entity_from_secring(&config.key_id, config.secret_ring_path())?;
        let armored_public_key = entity.armored_public_key();

        let pub_key_fetcher = MemoryStore::new();
        let pub_key_ref = pub_key_fetcher.add_blob(&armored_public_key);

        let pub_key_dest = match &config.public_key_dest {
            Some(prefix) => Some(
                storages
                    .get_storage(prefix)
                    .ok_or_else(|| SignSetupError::UnknownDestination(prefix.clone()))?,
            ),
            None => None,
        };

        let handler = Self {
            secret_ring: config.secret_ring,
            default_secret_ring: config.default_secret_ring,
            key_id: entity.key_id().to_string(),
            armored_public_key,
            pub_key_serve_suffix: format!("camli/{pub_key_ref}"),
            pub_key_ref,
            pub_key_fetcher,
            pub_key_dest,
            pub_key_published: OnceCell::new(),
        };

        handler
            .publish_public_key(&RequestContext::background())
            .await
            .map_err(SignSetupError::Publish)?;

        tracing::info!(
            key_id = %handler.key_id,
            public_key = %handler.pub_key_ref,
            "JSON signing handler ready"
        );
        Ok(handler)
    }

    /// Mirror the public key into the configured destination.
    ///
    /// Runs at most once per handler; the destination is stat'ed first so a
    /// key already present from an earlier start is not written again.
    pub async fn publish_public_key(&self, ctx: &RequestContext) -> Result<(), StorageError> {
        let Some(dest) = &self.pub_key_dest else {
            return Ok(());
        };
        self.pub_key_published
            .get_or_try_init(|| async {
                if dest.stat_blob(ctx, &self.pub_key_ref).await?.is_some() {
                    tracing::debug!(public_key = %self.pub_key_ref, "public key already published");
                    return Ok(());
                }
                dest.receive_blob(ctx, &self.pub_key_ref, self.armored_public_key.as_bytes())
                    .await?;
                tracing::info!(public_key = %self.pub_key_ref, "published public key");
                Ok::<(), StorageError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key_ref(&self) -> &BlobRef {
        &self.pub_key_ref
    }

    /// Sub-path the raw public key is served at, `camli/<ref>`.
    pub fn public_key_serve_suffix(&self) -> &str {
        &self.pub_key_serve_suffix
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        self.armored_public_key.as_bytes()
    }

    pub fn discovery_document(&self, base: &str) -> DiscoveryDocument {
        DiscoveryDocument {
            public_key_id: self.key_id.clone(),
            sign_handler: format!("{base}{SIGN_PATH}"),
            verify_handler: format!("{base}{VERIFY_PATH}"),
            public_key_blob_ref: self.pub_key_ref.to_string(),
            public_key: format!("{base}{}", self.pub_key_serve_suffix),
        }
    }

    fn sign_request<'a>(
        &'a self,
        ctx: &'a RequestContext,
        unsigned_json: &'a str,
        signature_time: Option<DateTime<Utc>>,
    ) -> SignRequest<'a> {
        SignRequest {
            ctx,
            unsigned_json,
            fetcher: &self.pub_key_fetcher,
            server_mode: true,
            secret_keyring_path: self.secret_ring.as_deref(),
            default_keyring_path: &self.default_secret_ring,
            signature_time,
        }
    }

    /// Sign a schema blob on behalf of another component. The blob's claim
    /// date, if any, becomes the signature time.
    pub async fn sign(&self, ctx: &RequestContext, builder: &mut Builder) -> Result<String, CamliError> {
        builder.set_signer(&self.pub_key_ref);
        let unsigned = builder.to_json()?;
        let signature_time = match builder.claim_date() {
            Ok(t) => Some(t),
            Err(e) if e.is_missing_field() => None,
            Err(e) => return Err(e),
        };
        self.sign_request(ctx, &unsigned, signature_time).sign().await
    }

    /// Sign caller-supplied JSON, adding this handler as `camliSigner` when
    /// the payload names no signer.
    pub async fn sign_json(&self, ctx: &RequestContext, json: &str) -> Result<String, CamliError> {
        let unsigned: Cow<'_, str> = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(mut m)) if !m.contains_key("camliSigner") => {
                m.insert(
                    "camliSigner".into(),
                    Value::String(self.pub_key_ref.to_string()),
                );
                Cow::Owned(serde_json::to_string(&Value::Object(m))?)
            }
            _ => Cow::Borrowed(json),
        };
        self.sign_request(ctx, &unsigned, None).sign().await
    }

    /// Verify a signed blob against the keys this handler knows about.
    pub async fn verify(&self, ctx: &RequestContext, signed_json: &str) -> Result<VerifiedPayload, CamliError> {
        jsonsign::verify(ctx, signed_json, &self.pub_key_fetcher).await
    }
}

impl std::fmt::Debug for SignHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignHandler")
            .field("key_id", &self.key_id)
            .field("pub_key_ref", &self.pub_key_ref)
            .field("publishes", &self.pub_key_dest.is_some())
            .finish()
    }
}
