//! Schema blobs: the JSON objects that give structure to raw blobs.
//!
//! [`Builder`] constructs permanodes, attribute claims and file descriptions.
//! [`FileSchema`] is the parsed form of a `file` (or `bytes`) blob, and
//! [`FileReader`] reassembles the bytes such a blob describes.

mod file_reader;

pub use file_reader::FileReader;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blobref::BlobRef;
use crate::canonical::canonical_json;
use crate::error::{CamliError, Result};

pub const CAMLI_VERSION: u64 = 1;

/// Attribute naming the content of a permanode.
pub const ATTR_CAMLI_CONTENT: &str = "camliContent";

/// Format a time the way schema blobs store it: RFC 3339 in UTC, with
/// fractional seconds only when they are non-zero.
pub fn rfc3339_from_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CamliError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Builder for unsigned schema blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Builder {
    m: Map<String, Value>,
}

impl Builder {
    fn base(camli_type: &str) -> Self {
        let mut m = Map::new();
        m.insert("camliVersion".into(), Value::from(CAMLI_VERSION));
        m.insert("camliType".into(), Value::from(camli_type));
        Self { m }
    }

    /// A permanode whose identity is fixed by `random` rather than by
    /// fresh randomness, so building it twice gives the same blob.
    pub fn planned_permanode(random: impl Into<String>) -> Self {
        let mut b = Self::base("permanode");
        b.m.insert("random".into(), Value::String(random.into()));
        b
    }

    /// A planned permanode seeded with a content digest.
    pub fn hash_planned_permanode(digest: &BlobRef) -> Self {
        Self::planned_permanode(digest.to_string())
    }

    /// A `set-attribute` claim on `permanode`.
    pub fn set_attribute_claim(permanode: &BlobRef, attribute: &str, value: &str) -> Self {
        let mut b = Self::base("claim");
        b.m.insert("claimType".into(), Value::from("set-attribute"));
        b.m.insert("permaNode".into(), Value::String(permanode.to_string()));
        b.m.insert("attribute".into(), Value::from(attribute));
        b.m.insert("value".into(), Value::from(value));
        b
    }

    /// A file description with no parts yet.
    pub fn file(file_name: &str) -> Self {
        let mut b = Self::base("file");
        b.m.insert("fileName".into(), Value::from(file_name));
        b.m.insert("parts".into(), Value::Array(Vec::new()));
        b
    }

    /// A bytes description, the nested building block of file descriptions.
    pub fn bytes() -> Self {
        let mut b = Self::base("bytes");
        b.m.insert("parts".into(), Value::Array(Vec::new()));
        b
    }

    pub fn set_signer(&mut self, signer: &BlobRef) -> &mut Self {
        self.m
            .insert("camliSigner".into(), Value::String(signer.to_string()));
        self
    }

    pub fn set_claim_date(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.m
            .insert("claimDate".into(), Value::String(rfc3339_from_time(t)));
        self
    }

    pub fn set_mod_time(&mut self, t: DateTime<Utc>) -> &mut Self {
        self.m
            .insert("unixMtime".into(), Value::String(rfc3339_from_time(t)));
        self
    }

    pub fn add_part(&mut self, part: BytesPart) -> Result<&mut Self> {
        let part = serde_json::to_value(part)?;
        match self.m.get_mut("parts") {
            Some(Value::Array(parts)) => parts.push(part),
            _ => {
                self.m.insert("parts".into(), Value::Array(vec![part]));
            }
        }
        Ok(self)
    }

    /// The claim date, or [`CamliError::MissingField`] when none is set.
    pub fn claim_date(&self) -> Result<DateTime<Utc>> {
        match self.m.get("claimDate") {
            None => Err(CamliError::MissingField("claimDate")),
            Some(Value::String(s)) => parse_rfc3339(s),
            Some(other) => Err(CamliError::Schema(format!(
                "claimDate must be a string, got {other}"
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.m
    }

    /// Canonical JSON text of the blob.
    pub fn to_json(&self) -> Result<String> {
        canonical_json(&Value::Object(self.m.clone()))
    }
}

/// One contiguous piece of a file or bytes description.
///
/// Exactly one of `blob_ref` (raw chunk) or `bytes_ref` (nested bytes
/// description) is normally set; a part with neither stands for `size`
/// zero bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytesPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_ref: Option<BlobRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes_ref: Option<BlobRef>,
    pub size: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub offset: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl BytesPart {
    pub fn chunk(blob_ref: BlobRef, size: u64) -> Self {
        Self {
            blob_ref: Some(blob_ref),
            bytes_ref: None,
            size,
            offset: 0,
        }
    }

    pub fn nested(bytes_ref: BlobRef, size: u64) -> Self {
        Self {
            blob_ref: None,
            bytes_ref: Some(bytes_ref),
            size,
            offset: 0,
        }
    }
}

/// Parsed `file` or `bytes` schema blob.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSchema {
    pub camli_version: u64,
    pub camli_type: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub unix_mtime: Option<String>,
    #[serde(default)]
    pub parts: Vec<BytesPart>,
}

impl FileSchema {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| CamliError::Schema(format!("invalid file schema: {e}")))
    }

    /// Total size declared by the parts.
    pub fn size(&self) -> Result<u64> {
        self.parts.iter().try_fold(0u64, |total, p| {
            total
                .checked_add(p.size)
                .ok_or_else(|| CamliError::Schema("declared file size overflows".into()))
        })
    }

    /// The declared modification time.
    pub fn mod_time(&self) -> Result<DateTime<Utc>> {
        let raw = self
            .unix_mtime
            .as_deref()
            .ok_or(CamliError::MissingField("unixMtime"))?;
        parse_rfc3339(raw)
    }
}
