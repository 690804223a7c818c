use thiserror::Error;

use crate::blobref::BlobRef;

/// Failures reported by a storage collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("blob {0} not found")]
    NotFound(BlobRef),

    #[error("digest mismatch: declared {declared}, computed {computed}")]
    DigestMismatch { declared: BlobRef, computed: BlobRef },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum CamliError {
    #[error("invalid blobref: {0:?}")]
    InvalidBlobRef(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("keyring error: {0}")]
    KeyRing(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CamliError {
    /// True when the error reports a field that is absent, as opposed to
    /// present but malformed.
    pub fn is_missing_field(&self) -> bool {
        matches!(self, Self::MissingField(_))
    }
}

impl From<serde_json::Error> for CamliError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CamliError>;
