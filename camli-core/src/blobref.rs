//! Content addresses.
//!
//! A [`BlobRef`] is the digest of a blob's bytes tagged with the hash
//! algorithm that produced it, written as `<algorithm>-<lowercase hex>`.
//! Identical content always yields an identical ref, which makes the ref both
//! the blob's identity and its storage key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::Sha1;
use sha3::{Digest, Sha3_256};

use crate::error::CamliError;

/// Hash algorithms accepted in blob references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    /// SHA-1, kept for refs produced by older clients.
    Sha1,
    /// SHA3-256, used for every ref this server computes itself.
    Sha3,
}

impl HashAlgorithm {
    pub const DEFAULT: HashAlgorithm = HashAlgorithm::Sha3;

    pub fn name(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha3 => "sha3",
        }
    }

    pub fn digest_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha3 => 32,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha1" => Some(Self::Sha1),
            "sha3" => Some(Self::Sha3),
            _ => None,
        }
    }
}

/// Digest-of-content identity of a blob.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobRef {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl BlobRef {
    /// Parse the string form of a ref, returning `None` for anything that is
    /// not a well-formed ref of a known algorithm.
    pub fn parse(s: &str) -> Option<Self> {
        let (name, hex_digest) = s.split_once('-')?;
        let algorithm = HashAlgorithm::from_name(name)?;
        if hex_digest.len() != algorithm.digest_len() * 2
            || !hex_digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return None;
        }
        let digest = hex::decode(hex_digest).ok()?;
        Some(Self { algorithm, digest })
    }

    /// Compute the ref of `data` with the given algorithm.
    pub fn from_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = BlobHasher::new(algorithm);
        hasher.update(data);
        hasher.finish()
    }

    /// Compute the ref of `data` with the default algorithm.
    pub fn for_content(data: impl AsRef<[u8]>) -> Self {
        Self::from_bytes(HashAlgorithm::DEFAULT, data.as_ref())
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.algorithm.name(), hex::encode(&self.digest))
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({self})")
    }
}

impl FromStr for BlobRef {
    type Err = CamliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CamliError::InvalidBlobRef(s.to_string()))
    }
}

impl Serialize for BlobRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BlobRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid blobref {s:?}")))
    }
}

/// Incremental digest producing a [`BlobRef`].
pub enum BlobHasher {
    Sha1(Sha1),
    Sha3(Sha3_256),
}

impl BlobHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgorithm::Sha3 => Self::Sha3(Sha3_256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha3(h) => h.update(data),
        }
    }

    pub fn finish(self) -> BlobRef {
        match self {
            Self::Sha1(h) => BlobRef {
                algorithm: HashAlgorithm::Sha1,
                digest: h.finalize().to_vec(),
            },
            Self::Sha3(h) => BlobRef {
                algorithm: HashAlgorithm::Sha3,
                digest: h.finalize().to_vec(),
            },
        }
    }
}

impl Default for BlobHasher {
    fn default() -> Self {
        Self::new(HashAlgorithm::DEFAULT)
    }
}

/// A blob ref together with the number of bytes it addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedBlob {
    #[serde(rename = "blobRef")]
    pub blob_ref: BlobRef,
    pub size: u64,
}

impl SizedBlob {
    pub fn new(blob_ref: BlobRef, size: u64) -> Self {
        Self { blob_ref, size }
    }
}

impl fmt::Display for SizedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}; {} bytes]", self.blob_ref, self.size)
    }
}
