//! camli-server - blob upload, vivification and JSON signing over HTTP
//!
//! Endpoints (default prefixes):
//! - POST /bs/camli/upload - Upload blobs, optionally vivifying them
//! - GET  /sighelper/camli/sig/discovery - Signing service discovery
//! - POST /sighelper/camli/sig/sign - Sign a JSON object
//! - POST /sighelper/camli/sig/verify - Verify a signed JSON object
//! - GET  /health, /ready, /openapi.json

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use camli_core::storage::{BlobStorage, MemoryStore};
use camli_server::{
    create_router, AppState, Config, HandlerRegistry, SignHandler, SignHandlerConfig,
    StorageRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("camli_server=info,camli_core=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env();

    let storage: Arc<dyn BlobStorage> = Arc::new(MemoryStore::new());
    let mut storages = StorageRegistry::new();
    storages.insert(config.blob_prefix.clone(), Arc::clone(&storage));

    let sign_config = SignHandlerConfig::from_config(&config)
        .context("CAMLI_KEY_ID must name a key in the secret keyring")?;
    let sign_handler = SignHandler::new(sign_config, &storages)
        .await
        .with_context(|| {
            format!(
                "setting up JSON signing with keyring {}",
                config.secret_ring_path().display()
            )
        })?;
    let registry =
        HandlerRegistry::new().with_json_sign(config.sig_prefix.clone(), Arc::new(sign_handler));

    let addr = config.socket_addr();
    let app = create_router(AppState::new(config, storage, registry));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "camli-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("camli-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
