//! Storage module for homenas.
//!
//! Everything that touches the NAS volume lives here:
//! - Sandboxed path resolution beneath a single storage root
//! - Directory listing with host resource statistics
//! - Directory creation and recursive deletion
//! - Chunked upload reassembly with per-path session tracking
//! - Full and byte-range file streaming
//!
//! Every component receives the [`PathResolver`] it needs at construction;
//! there is no process-wide storage root.

mod catalog;
mod lifecycle;
mod resolver;
mod stats;
mod stream;
mod upload;

use std::fs;
use std::path::{Path, PathBuf};

pub use catalog::{compare_names, DirectoryCatalog, DirectoryEntry, Listing};
pub use lifecycle::{validate_entry_name, EntryLifecycle};
pub use resolver::{EscapePolicy, PathResolver};
pub use stats::{sample_system_stats, MemoryStats, StorageStats, SystemStats};
pub use stream::{content_type_for, parse_range, ByteRange, FileStream, RangeStreamer};
pub use upload::{ChunkRequest, ChunkedUploadReceiver, ChunkOutcome, UploadTracker};

use crate::{NasError, Result};

/// The single directory all client-visible paths are sandboxed beneath.
///
/// The path is canonicalized once at construction so that prefix checks
/// compare like with like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    path: PathBuf,
}

impl StorageRoot {
    /// Open an existing directory as the storage root.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let canonical = fs::canonicalize(path).map_err(|e| {
            NasError::Config(format!("storage root {} is unusable: {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(NasError::Config(format!(
                "storage root {} is not a directory",
                canonical.display()
            )));
        }

        Ok(Self { path: canonical })
    }

    /// Open the storage root, creating the directory first if it is missing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(path.as_ref())?;
        Self::new(path)
    }

    /// Absolute path of the root.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
