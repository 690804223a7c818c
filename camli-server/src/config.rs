//! Server configuration module
//!
//! Loads configuration from environment variables with sensible defaults.
//! Everything environment-derived, including the default keyring location,
//! is resolved here once and passed down explicitly.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::vivify::MAX_FILE_SIZE;

/// Largest blob the upload handler accepts (16 MiB).
pub const MAX_BLOB_SIZE: usize = 16 << 20;

/// Advisory lifetime of an upload URL handed to clients.
pub const UPLOAD_URL_EXPIRATION_SECS: u64 = 86400;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3179)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 64)
    pub body_limit_mb: usize,
    /// Externally visible base URL, e.g. `https://blobs.example.com`
    pub base_url: Option<String>,
    /// Mount prefix of the blob server (default: `/bs/`)
    pub blob_prefix: String,
    /// Mount prefix of the signing service (default: `/sighelper/`)
    pub sig_prefix: String,
    /// Largest accepted blob in bytes
    pub max_blob_size: usize,
    /// Largest declared file size vivification will read back
    pub max_file_size: u64,
    /// Value reported as `uploadUrlExpirationSeconds`
    pub upload_url_expiration_secs: u64,
    /// Signing key selector, full or short key id (required to serve)
    pub key_id: Option<String>,
    /// Explicit secret keyring path
    pub secret_ring: Option<PathBuf>,
    /// Keyring used when no explicit path is configured
    pub default_secret_ring: PathBuf,
    /// Storage prefix the public key is published to, if any
    pub public_key_dest: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3179,
            host: [127, 0, 0, 1],
            allowed_origins: None,
            body_limit_mb: 64,
            base_url: None,
            blob_prefix: "/bs/".to_string(),
            sig_prefix: "/sighelper/".to_string(),
            max_blob_size: MAX_BLOB_SIZE,
            max_file_size: MAX_FILE_SIZE,
            upload_url_expiration_secs: UPLOAD_URL_EXPIRATION_SECS,
            key_id: None,
            secret_ring: None,
            default_secret_ring: PathBuf::from("secring.json"),
            public_key_dest: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|origins| split_list(&origins));

        let body_limit_mb = std::env::var("BODY_LIMIT_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit_mb);

        let base_url = non_empty_var("CAMLI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string());

        let blob_prefix = non_empty_var("CAMLI_BLOB_PREFIX")
            .map(|p| normalize_prefix(&p))
            .unwrap_or(defaults.blob_prefix);

        let sig_prefix = non_empty_var("CAMLI_SIG_PREFIX")
            .map(|p| normalize_prefix(&p))
            .unwrap_or(defaults.sig_prefix);

        let max_blob_size = std::env::var("CAMLI_MAX_BLOB_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_blob_size);

        let max_file_size = std::env::var("CAMLI_MAX_FILE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_file_size);

        let upload_url_expiration_secs = std::env::var("CAMLI_UPLOAD_URL_EXPIRATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.upload_url_expiration_secs);

        let default_secret_ring = std::env::var("HOME")
            .map(|home| default_secret_ring_in(&home))
            .unwrap_or(defaults.default_secret_ring);

        Self {
            port,
            host,
            allowed_origins,
            body_limit_mb,
            base_url,
            blob_prefix,
            sig_prefix,
            max_blob_size,
            max_file_size,
            upload_url_expiration_secs,
            key_id: non_empty_var("CAMLI_KEY_ID"),
            secret_ring: non_empty_var("CAMLI_SECRET_RING").map(PathBuf::from),
            default_secret_ring,
            public_key_dest: non_empty_var("CAMLI_PUBLIC_KEY_DEST").map(|p| normalize_prefix(&p)),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Keyring actually consulted for signing: the explicit path if set,
    /// otherwise the default location.
    pub fn secret_ring_path(&self) -> PathBuf {
        self.secret_ring
            .clone()
            .unwrap_or_else(|| self.default_secret_ring.clone())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Force a mount prefix into the `/name/` form.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

fn default_secret_ring_in(home: &str) -> PathBuf {
    PathBuf::from(home)
        .join(".config")
        .join("camli")
        .join("secring.json")
}
