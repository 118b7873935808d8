//! Test helpers for HTTP API tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use tempfile::TempDir;

use homenas::config::UploadConfig;
use homenas::storage::{EscapePolicy, PathResolver, StorageRoot};
use homenas::web::handlers::AppState;
use homenas::web::router::create_router;

/// Create a test server over a fresh temporary storage root.
pub fn create_test_server() -> (TestServer, TempDir) {
    create_test_server_with(EscapePolicy::Clamp, UploadConfig::default())
}

/// Create a test server with a specific escape policy and upload limits.
pub fn create_test_server_with(policy: EscapePolicy, upload: UploadConfig) -> (TestServer, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root = StorageRoot::new(temp_dir.path()).expect("Failed to open storage root");
    let resolver = PathResolver::new(root).with_policy(policy);

    let app_state = Arc::new(AppState::new(resolver, &upload));
    let router = create_router(app_state, &[]);

    let server = TestServer::new(router).expect("Failed to create test server");
    (server, temp_dir)
}

/// Build a header pair for axum-test.
pub fn header(name: &'static str, value: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(name),
        HeaderValue::from_str(value).expect("invalid header value"),
    )
}

/// Deterministic test payload.
pub fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Write a file under the storage root, creating parents.
pub fn write_file(root: &Path, relative: &str, data: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, data).unwrap();
}
