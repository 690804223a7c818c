//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served at `/openapi.json`. Paths are
//! shown under the default mount prefixes (`/bs/` and `/sighelper/`).

use utoipa::OpenApi;

use crate::handlers::{HealthResponse, ReadyResponse, ReceivedBlob, UploadResponse, VerifyResponse};
use crate::signing::DiscoveryDocument;

/// camli blob server - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "camli blob server",
        version = "0.1.0",
        description = r#"
## Content-addressed blob ingestion with signed provenance

- **Upload** blobs named by their content digest (`sha3-…`, legacy `sha1-…`)
- **Vivify** an uploaded file into a signed permanode plus a `camliContent` claim
- **Sign and verify** JSON schema blobs with the server's ed25519 key
"#,
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "Blobs", description = "Blob upload and vivification"),
        (name = "Signing", description = "JSON signing, verification and key discovery"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::upload::upload_handler,
        crate::handlers::sig::discovery,
        crate::handlers::sig::handle_sign,
        crate::handlers::sig::handle_verify,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            UploadResponse,
            ReceivedBlob,
            VerifyResponse,
            DiscoveryDocument,
        )
    )
)]
pub struct ApiDoc;
