//! Common test utilities for artesia integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use artesia_core::{AccountId, StyleCatalog};
use artesia_service::{create_router, AppState, ServiceConfig};
use artesia_store::MemoryStore;
use artesia_transform::{ScriptedTransformer, TransformationService};

/// HS256 secret shared by the harness and the service.
pub const JWT_SECRET: &str = "test-jwt-secret";

/// Audience the service expects.
pub const AUDIENCE: &str = "artesia";

/// Smallest byte string that sniffs as a JPEG.
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];

/// Smallest byte string that sniffs as a PNG.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

/// Bitmap file header.
pub const BMP_BYTES: &[u8] = b"BM\x36\0\0\0\0\0\0\0\x36\0\0\0";

/// AVIF `ftyp` box.
pub const AVIF_BYTES: &[u8] = b"\0\0\0 ftypavif\0\0\0\0mif1";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for direct assertions.
    pub store: Arc<MemoryStore>,
    /// The scripted transformer, if conversions are enabled.
    pub transformer: Option<Arc<ScriptedTransformer>>,
    /// A test account ID for authenticated requests.
    pub test_account_id: AccountId,
    /// The admin API key.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a harness whose transformer always succeeds.
    pub fn new() -> Self {
        Self::with_transformer(ScriptedTransformer::succeeding(
            "A luminous rendition with visible brush strokes",
        ))
    }

    /// Create a harness with a specific scripted transformer.
    pub fn with_transformer(transformer: ScriptedTransformer) -> Self {
        Self::build(Some(Arc::new(transformer)))
    }

    /// Create a harness with conversions disabled.
    pub fn without_transformer() -> Self {
        Self::build(None)
    }

    fn build(transformer: Option<Arc<ScriptedTransformer>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            auth_audience: AUDIENCE.into(),
            admin_api_key: Some(admin_api_key.clone()),
            ..ServiceConfig::default()
        };

        let state = AppState::with_transformer(
            store.clone(),
            Arc::new(StyleCatalog::builtin().unwrap()),
            config,
            transformer
                .clone()
                .map(|t| t as Arc<dyn TransformationService>),
        );
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            transformer,
            test_account_id: AccountId::generate(),
            admin_api_key,
        }
    }

    /// Get the authorization header for the test account.
    pub fn user_auth_header(&self) -> String {
        auth_header_for(&self.test_account_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        auth_header_for(&AccountId::generate())
    }

    /// Register the test account and return the response body.
    pub async fn register(&self) -> serde_json::Value {
        let response = self
            .server
            .post("/v1/accounts")
            .add_header("authorization", self.user_auth_header())
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// Upload an image for conversion.
    pub async fn convert(&self, style_id: &str, image: &'static [u8]) -> axum_test::TestResponse {
        self.server
            .post(&format!("/v1/conversions?style_id={style_id}"))
            .add_header("authorization", self.user_auth_header())
            .bytes(image.into())
            .await
    }

    /// Number of transformer calls so far.
    pub fn transformer_calls(&self) -> usize {
        self.transformer.as_ref().map_or(0, |t| t.calls())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint a bearer header for an account.
pub fn auth_header_for(account_id: &AccountId) -> String {
    format!("Bearer {}", mint_token(&account_id.to_string(), AUDIENCE, JWT_SECRET, 3600))
}

/// Mint an HS256 token; a negative `ttl_seconds` yields an expired token.
pub fn mint_token(sub: &str, audience: &str, secret: &str, ttl_seconds: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "sub": sub,
        "aud": audience,
        "iat": now,
        "exp": now + ttl_seconds,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to mint token")
}
