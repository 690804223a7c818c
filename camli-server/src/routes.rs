//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{any, get},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::handlers::{health, ready, sig_handler, upload_handler, REQUEST_ID_HEADER};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let config = &state.config;

    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static("x-camlistore-vivify"),
                ])
                .expose_headers([HeaderName::from_static("x-camlistore-vivified")])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any)
        }
    };

    // Request body limit; the multipart and form extractors need their own
    let body_limit_bytes = config.body_limit_mb * 1024 * 1024;
    let body_limit = RequestBodyLimitLayer::new(body_limit_bytes);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let mut router = Router::new()
        .route(
            &format!("{}camli/upload", config.blob_prefix),
            any(upload_handler),
        )
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

    if let Some(sign) = state.registry.find_json_sign() {
        tracing::info!(prefix = %sign.prefix, "mounting JSON signing handler");
        router = router
            .route(&sign.prefix, any(sig_handler))
            .route(&format!("{}{{*sub_path}}", sign.prefix), any(sig_handler));
    } else {
        tracing::warn!("no JSON signing handler; sign, verify and vivify are unavailable");
    }

    router
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(cors)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}
