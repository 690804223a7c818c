//! Handler and storage registries
//!
//! Both registries are filled once while the server is composed and are
//! read-only afterwards. Handlers are looked up by role, not by name, so a
//! lookup hands back the concrete handler type.

use std::collections::HashMap;
use std::sync::Arc;

use camli_core::storage::BlobStorage;

use crate::signing::SignHandler;

/// A handler together with the path prefix it is mounted under.
#[derive(Debug)]
pub struct Mounted<H> {
    /// Mount prefix in `/name/` form
    pub prefix: String,
    pub handler: Arc<H>,
}

impl<H> Clone for Mounted<H> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Handlers other components depend on, keyed by the role they play.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    json_sign: Option<Mounted<SignHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the JSON signing handler mounted at `prefix`.
    pub fn with_json_sign(mut self, prefix: impl Into<String>, handler: Arc<SignHandler>) -> Self {
        self.json_sign = Some(Mounted {
            prefix: prefix.into(),
            handler,
        });
        self
    }

    /// The JSON signing handler, if one is configured.
    pub fn find_json_sign(&self) -> Option<&Mounted<SignHandler>> {
        self.json_sign.as_ref()
    }
}

/// Storage targets addressable by mount prefix.
#[derive(Default)]
pub struct StorageRegistry {
    storages: HashMap<String, Arc<dyn BlobStorage>>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>, storage: Arc<dyn BlobStorage>) {
        self.storages.insert(prefix.into(), storage);
    }

    pub fn get_storage(&self, prefix: &str) -> Option<Arc<dyn BlobStorage>> {
        self.storages.get(prefix).cloned()
    }
}

impl std::fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut prefixes: Vec<&String> = self.storages.keys().collect();
        prefixes.sort();
        f.debug_struct("StorageRegistry")
            .field("prefixes", &prefixes)
            .finish()
    }
}
