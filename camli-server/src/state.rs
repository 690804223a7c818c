//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use camli_core::storage::BlobStorage;

use crate::config::Config;
use crate::registry::HandlerRegistry;
use crate::vivify::Vivifier;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Storage the upload handler receives into
    pub storage: Arc<dyn BlobStorage>,
    /// Role-keyed handlers (currently the JSON signer)
    pub registry: Arc<HandlerRegistry>,
    /// Vivification engine bound to `storage` and `registry`
    pub vivifier: Arc<Vivifier>,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn BlobStorage>, registry: HandlerRegistry) -> Self {
        let registry = Arc::new(registry);
        let vivifier = Arc::new(
            Vivifier::new(Arc::clone(&storage), Arc::clone(&registry))
                .with_max_file_size(config.max_file_size),
        );
        Self {
            config: Arc::new(config),
            storage,
            registry,
            vivifier,
        }
    }
}
