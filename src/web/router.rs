//! Router configuration for the HTTP API.

use axum::{routing::get, routing::post, Json, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::dto::{
    CreateEntryRequest, DeleteEntryRequest, ListFilesResponse, SuccessResponse, UploadResponse,
};
use super::handlers::{
    self, create_entry, delete_entry, download_file, list_files, stream_file, upload_chunk,
    AppState,
};
use super::middleware::create_cors_layer;
use crate::storage::{DirectoryEntry, MemoryStats, StorageStats, SystemStats};

/// OpenAPI document for the file API.
#[derive(OpenApi)]
#[openapi(
    info(title = "homenas API", description = "Home NAS file service"),
    servers((url = "/api")),
    paths(
        handlers::list_files,
        handlers::create_entry,
        handlers::delete_entry,
        handlers::upload_chunk,
        handlers::download_file,
        handlers::stream_file,
    ),
    components(schemas(
        ListFilesResponse,
        SuccessResponse,
        UploadResponse,
        CreateEntryRequest,
        DeleteEntryRequest,
        DirectoryEntry,
        SystemStats,
        MemoryStats,
        StorageStats,
    )),
    tags(
        (name = "files", description = "Directory listing and management"),
        (name = "transfer", description = "Chunked upload, download and streaming")
    )
)]
pub struct ApiDoc;

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let api_routes = Router::new()
        .route(
            "/files",
            get(list_files).post(create_entry).delete(delete_entry),
        )
        .route("/upload", post(upload_chunk))
        .route("/download", get(download_file))
        .route("/stream", get(stream_file));

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

/// Create a router serving the OpenAPI document as JSON.
pub fn create_openapi_router() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
