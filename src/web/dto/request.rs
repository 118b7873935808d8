//! Request DTOs for the HTTP API.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::validation::no_control_chars;

/// Query for `GET /api/files`.
#[derive(Debug, Default, Deserialize)]
pub struct ListFilesQuery {
    /// Directory to list, relative to the storage root.
    #[serde(default)]
    pub path: Option<String>,
}

/// Query for `GET /api/download` and `GET /api/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    /// File path relative to the storage root.
    #[serde(default)]
    pub file: Option<String>,
}

/// Body of `POST /api/files`.
///
/// Fields are optional so that a missing one can be reported as a 400
/// rather than a deserialization failure.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryRequest {
    /// Entry type: only `"folder"` is handled here.
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    /// Name of the new entry.
    #[serde(default)]
    #[validate(
        length(max = 255, message = "Name must be at most 255 bytes"),
        custom(function = "no_control_chars")
    )]
    pub name: Option<String>,
    /// Parent directory, relative to the storage root.
    #[serde(default)]
    pub folder_path: Option<String>,
}

/// Body of `DELETE /api/files`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteEntryRequest {
    /// Entry to delete, relative to the storage root.
    #[serde(default)]
    pub path: Option<String>,
}
