//! Vivification: turning an uploaded file blob into a signed permanode with a
//! `camliContent` claim pointing at the file.
//!
//! Every object produced here is derived from the file's content and its
//! declared modification time, so vivifying the same file twice yields
//! byte-identical blobs and the second run stores nothing new.

use std::sync::Arc;

use thiserror::Error;

use camli_core::schema::{Builder, FileReader, ATTR_CAMLI_CONTENT};
use camli_core::storage::{BlobStorage, RequestContext};
use camli_core::{BlobHasher, BlobRef, CamliError, HashAlgorithm, SizedBlob, StorageError};

use crate::registry::HandlerRegistry;

/// Largest file, by declared size, that is read back for vivification (1 GiB).
pub const MAX_FILE_SIZE: u64 = 1 << 30;

#[derive(Debug, Error)]
pub enum VivifyError {
    #[error("storage does not support streaming fetch")]
    NoStreamingFetcher,

    #[error("jsonsign handler not found")]
    NoSignHandler,

    #[error("Discovery: invalid publicKeyBlobRef {0:?}")]
    Discovery(String),

    #[error("Filereader error for blobref {blob_ref}: {source}")]
    FileReader {
        blob_ref: BlobRef,
        #[source]
        source: CamliError,
    },

    #[error("Could not read all file of blobref {blob_ref}: {source}")]
    Read {
        blob_ref: BlobRef,
        #[source]
        source: CamliError,
    },

    #[error("File {blob_ref} declares {size} bytes, more than the {max} allowed")]
    TooLarge { blob_ref: BlobRef, size: u64, max: u64 },

    #[error("Could not read all file of blobref {blob_ref}. Wanted {wanted}, got {got}")]
    SizeMismatch {
        blob_ref: BlobRef,
        wanted: u64,
        got: u64,
    },

    #[error("While parsing modtime for file {file_name:?}: {source}")]
    ModTime {
        file_name: String,
        #[source]
        source: CamliError,
    },

    #[error("Signing {what}: {source}")]
    Sign {
        what: &'static str,
        #[source]
        source: CamliError,
    },

    #[error("While uploading signed {what} {blob_ref}: {source}")]
    Upload {
        what: &'static str,
        blob_ref: BlobRef,
        #[source]
        source: StorageError,
    },
}

impl VivifyError {
    /// True when the failure comes from how the server is put together
    /// rather than from the blob being vivified.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoStreamingFetcher | Self::NoSignHandler | Self::Discovery(_)
        )
    }
}

/// The two blobs published by a successful vivification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VivifyOutcome {
    pub permanode: SizedBlob,
    pub claim: SizedBlob,
}

pub struct Vivifier {
    storage: Arc<dyn BlobStorage>,
    registry: Arc<HandlerRegistry>,
    max_file_size: u64,
}

impl Vivifier {
    pub fn new(storage: Arc<dyn BlobStorage>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            storage,
            registry,
            max_file_size: MAX_FILE_SIZE,
        }
    }

    /// Refuse files whose parts declare more than `max` bytes.
    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    /// Vivify `file_blob`, which must already be in storage along with every
    /// chunk it references.
    ///
    /// Nothing is stored unless the file reads back completely and both
    /// objects sign. A failure after the permanode is stored leaves that
    /// permanode behind with no claim referencing it.
    pub async fn vivify(
        &self,
        ctx: &RequestContext,
        file_blob: &SizedBlob,
    ) -> Result<VivifyOutcome, VivifyError> {
        let file_ref = &file_blob.blob_ref;
        let fetcher = self
            .storage
            .streaming_fetcher()
            .ok_or(VivifyError::NoStreamingFetcher)?;

        let reader = FileReader::new(ctx, fetcher, file_ref)
            .await
            .map_err(|source| VivifyError::FileReader {
                blob_ref: file_ref.clone(),
                source,
            })?;

        let declared = reader.size().map_err(|source| VivifyError::FileReader {
            blob_ref: reader.file_ref().clone(),
            source,
        })?;
        if declared > self.max_file_size {
            return Err(VivifyError::TooLarge {
                blob_ref: reader.file_ref().clone(),
                size: declared,
                max: self.max_file_size,
            });
        }

        let mut hasher = BlobHasher::new(HashAlgorithm::DEFAULT);
        let n = reader
            .copy_to(ctx, |chunk| hasher.update(chunk))
            .await
            .map_err(|source| VivifyError::Read {
                blob_ref: reader.file_ref().clone(),
                source,
            })?;
        if n != declared {
            return Err(VivifyError::SizeMismatch {
                blob_ref: reader.file_ref().clone(),
                wanted: declared,
                got: n,
            });
        }
        let content_digest = hasher.finish();

        let sign = self
            .registry
            .find_json_sign()
            .ok_or(VivifyError::NoSignHandler)?;
        let discovery = sign.handler.discovery_document(&sign.prefix);
        let signer = BlobRef::parse(&discovery.public_key_blob_ref)
            .ok_or(VivifyError::Discovery(discovery.public_key_blob_ref))?;

        // The modtime is the permanode's signature time, the claim's
        // claimDate and the claim's signature time.
        let schema = reader.schema();
        let claim_date = schema.mod_time().map_err(|source| VivifyError::ModTime {
            file_name: schema.file_name.clone().unwrap_or_default(),
            source,
        })?;

        let mut permanode = Builder::hash_planned_permanode(&content_digest);
        permanode.set_signer(&signer).set_claim_date(claim_date);
        let permanode = self.sign_and_store(ctx, "permanode", &mut permanode).await?;

        let mut claim =
            Builder::set_attribute_claim(&permanode.blob_ref, ATTR_CAMLI_CONTENT, &file_ref.to_string());
        claim.set_signer(&signer).set_claim_date(claim_date);
        let claim = self
            .sign_and_store(ctx, "camliContent claim", &mut claim)
            .await?;

        tracing::info!(
            request_id = %ctx.request_id,
            file = %file_ref,
            permanode = %permanode.blob_ref,
            claim = %claim.blob_ref,
            "vivified file"
        );
        Ok(VivifyOutcome { permanode, claim })
    }

    async fn sign_and_store(
        &self,
        ctx: &RequestContext,
        what: &'static str,
        builder: &mut Builder,
    ) -> Result<SizedBlob, VivifyError> {
        let sign = self
            .registry
            .find_json_sign()
            .ok_or(VivifyError::NoSignHandler)?;
        let signed = sign
            .handler
            .sign(ctx, builder)
            .await
            .map_err(|source| VivifyError::Sign { what, source })?;

        let blob_ref = BlobRef::for_content(&signed);
        self.storage
            .receive_blob(ctx, &blob_ref, signed.as_bytes())
            .await
            .map_err(|source| VivifyError::Upload {
                what,
                blob_ref,
                source,
            })
    }
}
