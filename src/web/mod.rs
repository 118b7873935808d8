//! HTTP surface for the file service.
//!
//! Exposes the storage components as a small JSON API: listing and
//! management under `/api/files`, chunked upload at `/api/upload`, and
//! whole-file download and range streaming at `/api/download` and
//! `/api/stream`.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_router, ApiDoc};
pub use server::WebServer;
