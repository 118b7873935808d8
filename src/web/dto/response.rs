//! Response DTOs for the HTTP API.

use serde::Serialize;
use utoipa::ToSchema;

use crate::storage::{DirectoryEntry, SystemStats};

/// Directory listing with host statistics.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesResponse {
    /// Immediate children, directories first.
    pub files: Vec<DirectoryEntry>,
    /// The requested path, echoed back unchanged.
    pub current_path: String,
    /// Host resource snapshot.
    pub system: SystemStats,
}

/// Plain success acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    /// A `{ "success": true }` body.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Result of an upload chunk.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    /// Destination relative to the storage root.
    pub path: String,
    /// True once the final chunk has been written.
    pub complete: bool,
}
