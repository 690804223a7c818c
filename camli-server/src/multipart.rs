//! Multipart section helpers
//!
//! The upload handler decides per section whether to keep going, so it needs
//! the raw disposition kind and parameters instead of multer's lenient view
//! of them, and it must cap how much of a section it buffers.

use std::collections::HashMap;

use axum::extract::multipart::{Field, MultipartError};
use axum::http::header::CONTENT_DISPOSITION;
use thiserror::Error;

/// Parsed `Content-Disposition` header: a kind plus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    kind: String,
    params: HashMap<String, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispositionError {
    #[error("missing Content-Disposition header")]
    Missing,
    #[error("invalid disposition kind {0:?}")]
    InvalidKind(String),
    #[error("malformed parameter {0:?}")]
    MalformedParam(String),
    #[error("duplicate parameter {0:?}")]
    DuplicateParam(String),
}

impl ContentDisposition {
    /// Parse a header value such as `form-data; name="sha3-…"; filename=x`.
    pub fn parse(value: &str) -> Result<Self, DispositionError> {
        let (kind, mut rest) = match value.find(';') {
            Some(i) => (&value[..i], &value[i..]),
            None => (value, ""),
        };
        let kind = kind.trim();
        if kind.is_empty() || !kind.bytes().all(is_token_byte) {
            return Err(DispositionError::InvalidKind(kind.to_string()));
        }

        let mut params = HashMap::new();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            let Some(after_semi) = rest.strip_prefix(';') else {
                return Err(DispositionError::MalformedParam(rest.to_string()));
            };
            let after_semi = after_semi.trim_start();
            if after_semi.is_empty() {
                // A trailing semicolon is tolerated.
                break;
            }
            let (key, value, remaining) = parse_param(after_semi)?;
            let key = key.to_ascii_lowercase();
            if params.contains_key(&key) {
                return Err(DispositionError::DuplicateParam(key));
            }
            params.insert(key, value);
            rest = remaining;
        }

        Ok(Self {
            kind: kind.to_ascii_lowercase(),
            params,
        })
    }

    /// Parse the disposition of a multipart field.
    pub fn of_field(field: &Field<'_>) -> Result<Self, DispositionError> {
        let value = field
            .headers()
            .get(CONTENT_DISPOSITION)
            .ok_or(DispositionError::Missing)?;
        let value = value
            .to_str()
            .map_err(|_| DispositionError::InvalidKind(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;
        Self::parse(value)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_form_data(&self) -> bool {
        self.kind == "form-data"
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// Parse `key=value` or `key="quoted value"` at the start of `input`.
fn parse_param(input: &str) -> Result<(&str, String, &str), DispositionError> {
    let malformed = || DispositionError::MalformedParam(input.to_string());

    let eq = input.find('=').ok_or_else(malformed)?;
    let key = input[..eq].trim();
    if key.is_empty() || !key.bytes().all(is_token_byte) {
        return Err(malformed());
    }
    let after_eq = input[eq + 1..].trim_start();

    if let Some(quoted) = after_eq.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = quoted.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => {
                    let (_, escaped) = chars.next().ok_or_else(malformed)?;
                    value.push(escaped);
                }
                '"' => return Ok((key, value, &quoted[i + 1..])),
                _ => value.push(c),
            }
        }
        Err(malformed())
    } else {
        let end = after_eq.find(';').unwrap_or(after_eq.len());
        let value = after_eq[..end].trim_end();
        if value.is_empty() || !value.bytes().all(is_token_byte) {
            return Err(malformed());
        }
        Ok((key, value.to_string(), &after_eq[end..]))
    }
}

/// Failure while buffering one multipart section.
#[derive(Debug, Error)]
pub enum PartError {
    #[error("{0}")]
    Read(#[from] MultipartError),
    #[error("blob exceeds maximum size of {max} bytes")]
    TooLarge { max: usize },
}

/// Buffer the body of `field`, refusing to hold more than `max` bytes.
pub async fn read_part(mut field: Field<'_>, max: usize) -> Result<Vec<u8>, PartError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if data.len() + chunk.len() > max {
            return Err(PartError::TooLarge { max });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}
