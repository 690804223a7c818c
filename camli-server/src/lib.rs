//! camli-server - HTTP blob ingestion, vivification and JSON signing
//!
//! This library exposes the server components for use in integration tests.
//! The main binary composes these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod openapi;
pub mod registry;
pub mod routes;
pub mod signing;
pub mod state;
pub mod validation;
pub mod vivify;

pub use config::Config;
pub use error::ApiError;
pub use openapi::ApiDoc;
pub use registry::{HandlerRegistry, Mounted, StorageRegistry};
pub use routes::create_router;
pub use signing::{DiscoveryDocument, SignHandler, SignHandlerConfig, SignSetupError};
pub use state::AppState;
pub use vivify::{Vivifier, VivifyError, VivifyOutcome};
