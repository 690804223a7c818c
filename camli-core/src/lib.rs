//! camli-core - content-addressed blobs and signed schema objects
//!
//! Building blocks shared by the blob server:
//!
//! - [`BlobRef`]: digest-of-content identity (`sha3-…`, legacy `sha1-…`)
//! - [`storage`]: the storage collaborator traits, with explicit capability
//!   queries, plus an in-memory implementation
//! - [`schema`]: permanode / claim / file schema blobs and a file reader that
//!   reassembles chunked content
//! - [`jsonsign`]: ed25519 signing and verification of canonical JSON
//!
//! # Example
//!
//! ```no_run
//! use camli_core::storage::{MemoryStore, RequestContext};
//! use camli_core::jsonsign::{self, KeyRing, SecretEntity, SignRequest};
//! use camli_core::schema::Builder;
//! use std::path::Path;
//!
//! # async fn example() -> camli_core::Result<()> {
//! let ring = Path::new("/tmp/secring.json");
//! let entity = SecretEntity::from_seed(&[7; 32]);
//! KeyRing::from_entities([&entity]).write_to(ring)?;
//!
//! let keys = MemoryStore::new();
//! let signer = keys.add_blob(entity.armored_public_key());
//!
//! let mut permanode = Builder::planned_permanode("seed");
//! permanode.set_signer(&signer);
//! let unsigned = permanode.to_json()?;
//!
//! let ctx = RequestContext::new();
//! let signed = SignRequest {
//!     ctx: &ctx,
//!     unsigned_json: &unsigned,
//!     fetcher: &keys,
//!     server_mode: true,
//!     secret_keyring_path: None,
//!     default_keyring_path: ring,
//!     signature_time: None,
//! }
//! .sign()
//! .await?;
//!
//! let verified = jsonsign::verify(&ctx, &signed, &keys).await?;
//! assert_eq!(verified.signer_key_id, entity.key_id());
//! # Ok(())
//! # }
//! ```

pub mod blobref;
pub mod canonical;
pub mod error;
pub mod jsonsign;
pub mod schema;
pub mod storage;

pub use blobref::{BlobHasher, BlobRef, HashAlgorithm, SizedBlob};
pub use error::{CamliError, Result, StorageError};
