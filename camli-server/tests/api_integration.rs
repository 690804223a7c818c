//! API integration tests for camli-server.
//!
//! These tests drive the full router with hand-built multipart and form
//! requests: blob upload with partial failures, vivification, and the JSON
//! signing endpoints.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use camli_core::jsonsign::{KeyRing, SecretEntity};
use camli_core::schema::{Builder, BytesPart};
use camli_core::storage::{
    BlobReceiver, BlobStatter, BlobStorage, MemoryStore, RequestContext, StreamingFetcher,
};
use camli_core::{BlobRef, SizedBlob, StorageError};
use camli_server::{
    create_router, AppState, Config, HandlerRegistry, SignHandler, SignHandlerConfig,
    StorageRegistry,
};

const BOUNDARY: &str = "----CamliTestBoundary7MA4YWxkTrZu0gW";

struct TestServer {
    _dir: TempDir,
    app: Router,
    storage: Arc<MemoryStore>,
    handler: Arc<SignHandler>,
}

fn write_keyring(dir: &TempDir) -> (std::path::PathBuf, SecretEntity) {
    let ring = dir.path().join("secring.json");
    let entity = SecretEntity::from_seed(&[21; 32]);
    KeyRing::from_entities([&entity]).write_to(&ring).unwrap();
    (ring, entity)
}

async fn test_server() -> TestServer {
    test_server_with(|_| {}).await
}

async fn test_server_with(configure: impl FnOnce(&mut Config)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let (ring, entity) = write_keyring(&dir);

    let mut config = Config {
        key_id: Some(entity.key_id().to_string()),
        secret_ring: Some(ring),
        ..Config::default()
    };
    configure(&mut config);

    let storage = Arc::new(MemoryStore::new());
    let mut storages = StorageRegistry::new();
    storages.insert(config.blob_prefix.clone(), storage.clone());

    let handler = Arc::new(
        SignHandler::new(SignHandlerConfig::from_config(&config).unwrap(), &storages)
            .await
            .unwrap(),
    );
    let registry = HandlerRegistry::new().with_json_sign(config.sig_prefix.clone(), handler.clone());
    let app = create_router(AppState::new(config, storage.clone(), registry));

    TestServer {
        _dir: dir,
        app,
        storage,
        handler,
    }
}

fn form_data(name: &str) -> String {
    format!("form-data; name=\"{name}\"; filename=\"blob\"")
}

/// Build a multipart body from (Content-Disposition, bytes) sections.
fn multipart_body(parts: &[(String, Vec<u8>)]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (disposition, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

fn upload_request(parts: &[(String, Vec<u8>)], vivify: bool) -> Request<Body> {
    let (content_type, body) = multipart_body(parts);
    let mut builder = Request::builder()
        .method("POST")
        .uri("/bs/camli/upload")
        .header(header::HOST, "blobs.test")
        .header(header::CONTENT_TYPE, content_type);
    if vivify {
        builder = builder.header("X-Camlistore-Vivify", "1");
    }
    builder.body(Body::from(body)).unwrap()
}

fn blob_part(data: &[u8]) -> (String, Vec<u8>) {
    (form_data(&BlobRef::for_content(data).to_string()), data.to_vec())
}

fn percent_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

fn form_request(uri: &str, field: &str, value: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("{field}={}", percent_encode(value))))
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ============================================================================
// Health & Documentation
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["signing_available"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_openapi_document_served() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(
            Request::builder()
                .uri("/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/bs/camli/upload"].is_object());
}

// ============================================================================
// Upload Tests
// ============================================================================

#[tokio::test]
async fn test_upload_skips_unparsable_name_and_continues() {
    let server = test_server().await;
    let a = blob_part(b"blob A");
    let c = blob_part(b"blob C");
    let parts = vec![
        a.clone(),
        (form_data("not-a-ref"), b"blob B".to_vec()),
        c.clone(),
    ];

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&parts, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let received = json["received"].as_array().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["blobRef"], BlobRef::for_content(b"blob A").to_string());
    assert_eq!(received[0]["size"], 6);
    assert_eq!(received[1]["blobRef"], BlobRef::for_content(b"blob C").to_string());
    assert_eq!(json["errorText"], "Ignoring form key \"not-a-ref\"");

    assert!(server.storage.contains(&BlobRef::for_content(b"blob A")));
    assert!(server.storage.contains(&BlobRef::for_content(b"blob C")));
    assert_eq!(server.storage.len(), 2);
}

#[tokio::test]
async fn test_upload_stops_at_bad_disposition() {
    let server = test_server().await;
    let b_ref = BlobRef::for_content(b"blob B");
    let parts = vec![
        blob_part(b"blob A"),
        (format!("attachment; name=\"{b_ref}\""), b"blob B".to_vec()),
        blob_part(b"blob C"),
    ];

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&parts, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["received"].as_array().unwrap().len(), 1);
    assert_eq!(
        json["errorText"],
        "Expected Content-Disposition of \"form-data\"; got \"attachment\""
    );
    assert!(server.storage.contains(&BlobRef::for_content(b"blob A")));
    assert!(!server.storage.contains(&b_ref));
    assert!(!server.storage.contains(&BlobRef::for_content(b"blob C")));
}

#[tokio::test]
async fn test_upload_stops_at_unparsable_disposition() {
    let server = test_server().await;
    let parts = vec![
        ("form-data; name".to_string(), b"blob A".to_vec()),
        blob_part(b"blob B"),
    ];

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&parts, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["received"].as_array().unwrap().is_empty());
    assert_eq!(json["errorText"], "invalid Content-Disposition");
    assert!(server.storage.is_empty());
}

#[tokio::test]
async fn test_upload_digest_mismatch_stops_ingestion() {
    let server = test_server().await;
    let wrong = BlobRef::for_content(b"something else");
    let parts = vec![
        blob_part(b"first"),
        (form_data(&wrong.to_string()), b"actual bytes".to_vec()),
        blob_part(b"never read"),
    ];

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&parts, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["received"].as_array().unwrap().len(), 1);
    let error_text = json["errorText"].as_str().unwrap();
    assert!(error_text.starts_with(&format!("Error receiving blob {wrong}: ")));
    assert!(!server.storage.contains(&BlobRef::for_content(b"never read")));
    assert_eq!(server.storage.len(), 1);
}

#[tokio::test]
async fn test_upload_stops_at_oversized_part() {
    let server = test_server_with(|config| config.max_blob_size = 4).await;
    let oversize = BlobRef::for_content(b"too big");
    let parts = vec![
        blob_part(b"abc"),
        blob_part(b"too big"),
        blob_part(b"xyz"),
    ];

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&parts, false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let received = json["received"].as_array().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["blobRef"], BlobRef::for_content(b"abc").to_string());
    assert_eq!(json["maxUploadSize"], 4);
    assert!(json["errorText"]
        .as_str()
        .unwrap()
        .starts_with(&format!("Error receiving blob {oversize}: blob exceeds maximum size")));
    assert!(!server.storage.contains(&oversize));
    assert!(!server.storage.contains(&BlobRef::for_content(b"xyz")));
    assert_eq!(server.storage.len(), 1);
}

#[tokio::test]
async fn test_upload_response_echoes_configuration() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(upload_request(&[blob_part(b"x")], false))
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["maxUploadSize"], 16 * 1024 * 1024);
    assert_eq!(json["uploadUrlExpirationSeconds"], 86400);
    assert_eq!(json["uploadUrl"], "http://blobs.test/bs/camli/upload");
    assert!(json.get("errorText").is_none());
}

#[tokio::test]
async fn test_reingest_is_idempotent() {
    let server = test_server().await;
    let parts = vec![blob_part(b"same content")];

    let first = body_json(
        server
            .app
            .clone()
            .oneshot(upload_request(&parts, false))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        server
            .app
            .clone()
            .oneshot(upload_request(&parts, false))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["received"], second["received"]);
    assert_eq!(server.storage.len(), 1);
}

#[tokio::test]
async fn test_upload_without_boundary_is_bad_request() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/bs/camli/upload")
                .header(header::CONTENT_TYPE, "multipart/form-data")
                .body(Body::from("no parts here"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("Expected multipart/form-data POST request"));
}

#[tokio::test]
async fn test_upload_requires_post() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(
            Request::builder()
                .uri("/bs/camli/upload")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Vivify Tests
// ============================================================================

fn file_schema(chunk: &[u8]) -> Vec<u8> {
    let mut file = Builder::file("photo.jpg");
    file.set_mod_time(Utc.with_ymd_and_hms(2013, 2, 3, 4, 5, 6).unwrap());
    file.add_part(BytesPart::chunk(BlobRef::for_content(chunk), chunk.len() as u64))
        .unwrap();
    file.to_json().unwrap().into_bytes()
}

#[tokio::test]
async fn test_vivify_publishes_and_is_idempotent() {
    let server = test_server().await;
    let chunk = b"pretend these are jpeg bytes".to_vec();
    let schema = file_schema(&chunk);
    let file_ref = BlobRef::for_content(&schema);

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&[blob_part(&chunk)], false))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&[blob_part(&schema)], true))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let vivified: Vec<_> = response
        .headers()
        .get_all("X-Camlistore-Vivified")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(vivified, vec![file_ref.to_string()]);
    let json = body_json(response).await;
    assert!(json.get("errorText").is_none(), "unexpected: {json}");

    // chunk + file + permanode + claim
    assert_eq!(server.storage.len(), 4);
    let first_refs = server.storage.refs();

    let response = server
        .app
        .clone()
        .oneshot(upload_request(&[blob_part(&schema)], true))
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("X-Camlistore-Vivified").unwrap(),
        file_ref.to_string().as_str()
    );
    assert_eq!(server.storage.refs(), first_refs);

    // The claim ties the permanode to the file and is signed by our key.
    let claim = first_refs
        .iter()
        .filter_map(|r| server.storage.get(r))
        .map(|data| String::from_utf8(data.to_vec()).unwrap())
        .find(|text| text.contains("\"claimType\": \"set-attribute\""))
        .expect("claim stored");
    let verified = server
        .handler
        .verify(&RequestContext::new(), &claim)
        .await
        .unwrap();
    assert_eq!(verified.payload["value"], file_ref.to_string());
    assert_eq!(verified.payload["claimDate"], "2013-02-03T04:05:06Z");
}

#[tokio::test]
async fn test_vivify_rejects_file_declaring_huge_hole() {
    let server = test_server().await;
    let mut file = Builder::file("sparse.img");
    file.set_mod_time(Utc.with_ymd_and_hms(2013, 2, 3, 4, 5, 6).unwrap());
    file.add_part(BytesPart {
        blob_ref: None,
        bytes_ref: None,
        size: 1 << 40,
        offset: 0,
    })
    .unwrap();
    let schema = file.to_json().unwrap().into_bytes();
    let file_ref = BlobRef::for_content(&schema);

    let response = server
        .app
        .oneshot(upload_request(&[blob_part(&schema)], true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-Camlistore-Vivified").is_none());
    let json = body_json(response).await;
    let error_text = json["errorText"].as_str().unwrap();
    assert!(error_text.starts_with(&format!("Error vivifying blob {file_ref}: ")));
    assert!(error_text.contains("more than the 1073741824 allowed"), "{error_text}");
    assert_eq!(server.storage.len(), 1);
}

#[tokio::test]
async fn test_vivify_failure_is_reported_in_body() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(upload_request(&[blob_part(b"not a schema blob")], true))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-Camlistore-Vivified").is_none());
    let json = body_json(response).await;
    assert_eq!(json["received"].as_array().unwrap().len(), 1);
    let ref_text = BlobRef::for_content(b"not a schema blob").to_string();
    assert!(json["errorText"]
        .as_str()
        .unwrap()
        .starts_with(&format!("Error vivifying blob {ref_text}: ")));
    assert_eq!(server.storage.len(), 1);
}

// ============================================================================
// Signing Tests
// ============================================================================

#[tokio::test]
async fn test_sign_then_verify_roundtrip() {
    let server = test_server().await;

    let response = server
        .app
        .clone()
        .oneshot(form_request(
            "/sighelper/camli/sig/sign",
            "json",
            r#"{"camliVersion":1,"camliType":"permanode","random":"xyz"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let signed = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(signed.contains(",\"camliSig\":\""));

    let response = server
        .app
        .clone()
        .oneshot(form_request("/sighelper/camli/sig/verify", "sjson", &signed))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["signatureValid"], 1);
    assert_eq!(json["signerKeyId"], server.handler.key_id());
    assert_eq!(json["verifiedData"]["random"], "xyz");
    assert_eq!(
        json["verifiedData"]["camliSigner"],
        server.handler.public_key_ref().to_string()
    );
    assert!(json.get("errorMessage").is_none());
}

#[tokio::test]
async fn test_verify_invalid_signature_is_not_http_error() {
    let server = test_server().await;

    let response = server
        .app
        .clone()
        .oneshot(form_request(
            "/sighelper/camli/sig/sign",
            "json",
            r#"{"camliType":"permanode","random":"original"}"#,
        ))
        .await
        .unwrap();
    let signed = String::from_utf8(body_bytes(response).await).unwrap();
    let tampered = signed.replace("original", "modified");

    let response = server
        .app
        .oneshot(form_request("/sighelper/camli/sig/verify", "sjson", &tampered))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["signatureValid"], 0);
    assert!(json["errorMessage"].is_string());
    assert!(json.get("signerKeyId").is_none());
    assert!(json.get("verifiedData").is_none());
}

#[tokio::test]
async fn test_sign_rejects_oversized_payload() {
    let server = test_server().await;
    let padding = "a".repeat(1024 * 1024);
    let payload = format!(r#"{{"camliType":"permanode","random":"{padding}"}}"#);

    let response = server
        .app
        .oneshot(form_request("/sighelper/camli/sig/sign", "json", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "parameter \"json\" too large");
}

#[tokio::test]
async fn test_sign_and_verify_require_parameters() {
    let server = test_server().await;

    let response = server
        .app
        .clone()
        .oneshot(form_request("/sighelper/camli/sig/sign", "other", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "missing \"json\" parameter");

    let response = server
        .app
        .oneshot(form_request("/sighelper/camli/sig/verify", "json", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "missing \"sjson\" parameter");
}

#[tokio::test]
async fn test_sign_endpoints_require_post() {
    let server = test_server().await;

    for path in ["/sighelper/camli/sig/sign", "/sighelper/camli/sig/verify"] {
        let response = server
            .app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "POST required");
    }

    let response = server
        .app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/sighelper/camli/sig/discovery")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Unsupported path or method.");
}

#[tokio::test]
async fn test_sig_base_redirects_to_discovery() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(
            Request::builder()
                .uri("/sighelper/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/sighelper/camli/sig/discovery"
    );
}

#[tokio::test]
async fn test_discovery_document() {
    let server = test_server().await;

    let response = server
        .app
        .oneshot(
            Request::builder()
                .uri("/sighelper/camli/sig/discovery")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let key_ref = server.handler.public_key_ref().to_string();
    assert_eq!(json["publicKeyId"], server.handler.key_id());
    assert_eq!(json["signHandler"], "/sighelper/camli/sig/sign");
    assert_eq!(json["verifyHandler"], "/sighelper/camli/sig/verify");
    assert_eq!(json["publicKeyBlobRef"], key_ref);
    assert_eq!(json["publicKey"], format!("/sighelper/camli/{key_ref}"));
}

#[tokio::test]
async fn test_public_key_served() {
    let server = test_server().await;
    let uri = format!("/sighelper/camli/{}", server.handler.public_key_ref());

    let response = server
        .app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/octet-stream"
    );
    let bytes = body_bytes(response).await;
    assert_eq!(bytes, server.handler.public_key_bytes());
    assert_eq!(BlobRef::for_content(&bytes), *server.handler.public_key_ref());
}

// ============================================================================
// Key Publication
// ============================================================================

/// Storage that counts writes.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    receives: AtomicUsize,
}

#[async_trait]
impl BlobReceiver for CountingStore {
    async fn receive_blob(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
        data: &[u8],
    ) -> Result<SizedBlob, StorageError> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        self.inner.receive_blob(ctx, blob_ref, data).await
    }
}

#[async_trait]
impl BlobStatter for CountingStore {
    async fn stat_blob(
        &self,
        ctx: &RequestContext,
        blob_ref: &BlobRef,
    ) -> Result<Option<SizedBlob>, StorageError> {
        self.inner.stat_blob(ctx, blob_ref).await
    }
}

impl BlobStorage for CountingStore {
    fn streaming_fetcher(&self) -> Option<&dyn StreamingFetcher> {
        Some(&self.inner)
    }
}

#[tokio::test]
async fn test_public_key_published_at_most_once() {
    let dir = tempfile::tempdir().unwrap();
    let (ring, entity) = write_keyring(&dir);
    let dest = Arc::new(CountingStore::default());
    let mut storages = StorageRegistry::new();
    storages.insert("/bs/", dest.clone());

    let config = SignHandlerConfig {
        key_id: entity.key_id().to_string(),
        secret_ring: Some(ring),
        default_secret_ring: dir.path().join("unused.json"),
        public_key_dest: Some("/bs/".into()),
    };

    let first = SignHandler::new(config.clone(), &storages).await.unwrap();
    assert_eq!(dest.receives.load(Ordering::SeqCst), 1);

    // Same handler again, then a second start against the same destination.
    first
        .publish_public_key(&RequestContext::new())
        .await
        .unwrap();
    let second = SignHandler::new(config, &storages).await.unwrap();
    second
        .publish_public_key(&RequestContext::new())
        .await
        .unwrap();

    assert_eq!(dest.receives.load(Ordering::SeqCst), 1);
    assert!(dest.inner.contains(first.public_key_ref()));
}
