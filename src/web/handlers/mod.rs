//! API handlers for the file service.

pub mod files;
pub mod transfer;

pub use files::*;
pub use transfer::*;

use std::sync::Arc;

use crate::config::UploadConfig;
use crate::storage::{
    ChunkedUploadReceiver, DirectoryCatalog, EntryLifecycle, PathResolver, RangeStreamer,
    UploadTracker,
};

/// Application state shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Directory listings.
    pub catalog: DirectoryCatalog,
    /// Folder creation and deletion.
    pub lifecycle: EntryLifecycle,
    /// Chunked upload writer.
    pub receiver: ChunkedUploadReceiver,
    /// Download and range streaming.
    pub streamer: RangeStreamer,
}

impl AppState {
    /// Create application state for a resolved storage root.
    pub fn new(resolver: PathResolver, upload: &UploadConfig) -> Self {
        let tracker = Arc::new(UploadTracker::new(upload.session_ttl()));
        Self {
            catalog: DirectoryCatalog::new(resolver.clone()),
            lifecycle: EntryLifecycle::new(resolver.clone()),
            receiver: ChunkedUploadReceiver::new(
                resolver.clone(),
                tracker,
                upload.max_chunk_size_bytes(),
                upload.chunk_timeout(),
            ),
            streamer: RangeStreamer::new(resolver),
        }
    }

    /// The upload session tracker.
    pub fn uploads(&self) -> &Arc<UploadTracker> {
        self.receiver.tracker()
    }
}
