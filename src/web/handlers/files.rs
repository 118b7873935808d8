//! Listing and entry management handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;

use crate::web::dto::{
    CreateEntryRequest, DeleteEntryRequest, ListFilesQuery, ListFilesResponse, SuccessResponse,
    ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /api/files - List a directory with host statistics.
#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    params(
        ("path" = Option<String>, Query, description = "Directory relative to the storage root")
    ),
    responses(
        (status = 200, description = "Directory listing", body = ListFilesResponse),
        (status = 400, description = "Not a directory"),
        (status = 404, description = "Directory not found")
    )
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ListFilesResponse>, ApiError> {
    let current_path = query.path.unwrap_or_default();

    let listing = state.catalog.list(&current_path).await.map_err(|e| {
        tracing::debug!(path = %current_path, error = %e, "listing failed");
        ApiError::from(e)
    })?;

    Ok(Json(ListFilesResponse {
        files: listing.entries,
        current_path,
        system: listing.stats,
    }))
}

/// POST /api/files - Create a folder.
///
/// Files are created through `/api/upload`; `type: "file"` is answered with 501.
#[utoipa::path(
    post,
    path = "/files",
    tag = "files",
    request_body = CreateEntryRequest,
    responses(
        (status = 200, description = "Folder created", body = SuccessResponse),
        (status = 400, description = "Missing parameters or invalid name"),
        (status = 404, description = "Parent folder does not exist"),
        (status = 409, description = "Entry already exists"),
        (status = 501, description = "Files must be uploaded")
    )
)]
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateEntryRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let (Some(name), Some(folder_path)) = (req.name.as_deref(), req.folder_path.as_deref()) else {
        return Err(ApiError::bad_request("Missing params"));
    };

    match req.entry_type.as_deref() {
        Some("folder") => {
            state.lifecycle.create_directory(folder_path, name).await?;
            Ok(Json(SuccessResponse::ok()))
        }
        Some("file") => Err(ApiError::not_implemented("Use /upload for files")),
        _ => Err(ApiError::bad_request("Unsupported entry type")),
    }
}

/// DELETE /api/files - Delete a file or folder tree.
#[utoipa::path(
    delete,
    path = "/files",
    tag = "files",
    request_body = DeleteEntryRequest,
    responses(
        (status = 200, description = "Entry deleted", body = SuccessResponse),
        (status = 400, description = "Missing path"),
        (status = 403, description = "Cannot delete root")
    )
)]
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<DeleteEntryRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let path = req
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing path"))?;

    state.lifecycle.delete(&path).await?;

    Ok(Json(SuccessResponse::ok()))
}
