//! CORS middleware configuration.

use axum::http::header::{
    HeaderName, ACCEPT, ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, RANGE,
};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Request headers a browser client sends to the file API.
fn allowed_headers() -> [HeaderName; 8] {
    [
        CONTENT_TYPE,
        ACCEPT,
        RANGE,
        HeaderName::from_static("x-file-name"),
        HeaderName::from_static("x-folder-path"),
        HeaderName::from_static("x-chunk-index"),
        HeaderName::from_static("x-total-chunks"),
        HeaderName::from_static("x-upload-id"),
    ]
}

/// Response headers media players need to read for seeking.
fn exposed_headers() -> [HeaderName; 4] {
    [CONTENT_RANGE, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_DISPOSITION]
}

/// Create a CORS layer from configuration.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    let parsed_origins: Vec<HeaderValue> =
        origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed_origins.is_empty() {
        // No usable origins configured: allow any origin
        if !origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, allowing any origin");
        }
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .expose_headers(exposed_headers())
            .allow_origin(Any)
    } else {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(allowed_headers())
            .expose_headers(exposed_headers())
            .allow_origin(parsed_origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer_empty_origins() {
        let _layer = create_cors_layer(&[]);
    }

    #[test]
    fn test_create_cors_layer_with_origins() {
        let origins = vec![
            "http://nas.local:3000".to_string(),
            "http://localhost:5173".to_string(),
        ];
        let _layer = create_cors_layer(&origins);
    }

    #[test]
    fn test_allowed_headers_include_upload_headers() {
        let headers = allowed_headers();
        assert!(headers.contains(&RANGE));
        assert!(headers.iter().any(|h| h.as_str() == "x-total-chunks"));
    }
}
