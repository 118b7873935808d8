//! homenas - a small home network-attached-storage file service.
//!
//! Every client path is sandboxed beneath a single storage root. On top of
//! that the crate offers directory listings with host statistics, folder
//! creation and deletion, resumable chunked uploads and HTTP range
//! streaming, served over an axum JSON API.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod web;

pub use config::Config;
pub use error::{NasError, Result};
pub use storage::{
    ChunkRequest, ChunkedUploadReceiver, DirectoryCatalog, EntryLifecycle, EscapePolicy,
    PathResolver, RangeStreamer, StorageRoot, UploadTracker,
};
pub use web::WebServer;
