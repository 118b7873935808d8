//! Upload, download and streaming handlers.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::storage::{ChunkRequest, FileStream};
use crate::web::dto::{FileQuery, UploadResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Upload header carrying the URL-encoded file name.
pub const FILE_NAME_HEADER: &str = "x-file-name";
/// Upload header carrying the destination folder.
pub const FOLDER_PATH_HEADER: &str = "x-folder-path";
/// Upload header carrying the zero-based chunk index.
pub const CHUNK_INDEX_HEADER: &str = "x-chunk-index";
/// Upload header carrying the total number of chunks.
pub const TOTAL_CHUNKS_HEADER: &str = "x-total-chunks";
/// Optional upload header tying chunks of one upload together.
pub const UPLOAD_ID_HEADER: &str = "x-upload-id";

/// Build a `Content-Disposition: attachment` value for `filename`.
///
/// Control characters never reach the header. Names that are not plain ASCII
/// get an RFC 5987 `filename*` parameter next to an ASCII-only fallback.
fn content_disposition_header(filename: &str) -> String {
    let needs_encoding = !filename.is_ascii()
        || filename
            .chars()
            .any(|c| c.is_control() || c == '"' || c == '\\');

    if !needs_encoding {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| {
            if c == '"' || c == '\\' || !c.is_ascii() {
                '_'
            } else {
                c
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// Read an optional header as UTF-8.
fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, ApiError> {
    headers
        .get(name)
        .map(|v| std::str::from_utf8(v.as_bytes()))
        .transpose()
        .map_err(|_| ApiError::bad_request(format!("{} is not valid UTF-8", name)))
}

/// Read an optional numeric header, falling back to `default` when absent.
fn header_count(headers: &HeaderMap, name: &str, default: u32) -> Result<u32, ApiError> {
    match header_text(headers, name)? {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Invalid {} header", name))),
        None => Ok(default),
    }
}

/// Turn upload headers into a [`ChunkRequest`].
fn chunk_request(headers: &HeaderMap) -> Result<ChunkRequest, ApiError> {
    let raw_name = header_text(headers, FILE_NAME_HEADER)?
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing x-file-name header"))?;
    let filename = urlencoding::decode(raw_name)
        .map_err(|_| ApiError::bad_request("Invalid x-file-name header"))?
        .into_owned();

    Ok(ChunkRequest {
        folder_path: header_text(headers, FOLDER_PATH_HEADER)?
            .unwrap_or("/")
            .to_string(),
        filename,
        chunk_index: header_count(headers, CHUNK_INDEX_HEADER, 0)?,
        total_chunks: header_count(headers, TOTAL_CHUNKS_HEADER, 1)?,
        upload_id: header_text(headers, UPLOAD_ID_HEADER)?
            .filter(|id| !id.is_empty())
            .map(str::to_string),
    })
}

/// POST /api/upload - Write one chunk of a chunked upload.
///
/// The body is the raw chunk. Chunk 0 creates or truncates the destination,
/// later chunks append in order.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "transfer",
    params(
        ("x-file-name" = String, Header, description = "URL-encoded file name"),
        ("x-folder-path" = Option<String>, Header, description = "Destination folder, default /"),
        ("x-chunk-index" = Option<u32>, Header, description = "Zero-based chunk index, default 0"),
        ("x-total-chunks" = Option<u32>, Header, description = "Number of chunks, default 1"),
        ("x-upload-id" = Option<String>, Header, description = "Client-chosen upload id")
    ),
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Chunk written", body = UploadResponse),
        (status = 400, description = "Missing or invalid headers"),
        (status = 404, description = "Destination folder does not exist"),
        (status = 409, description = "Out-of-order or concurrent chunk"),
        (status = 413, description = "Chunk too large"),
        (status = 500, description = "Write failed")
    )
)]
pub async fn upload_chunk(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UploadResponse>, ApiError> {
    let request = chunk_request(&headers)?;

    let outcome = state
        .receiver
        .write_chunk(&request, body.into_data_stream())
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        path: outcome.path,
        complete: outcome.complete,
    }))
}

/// Build a streaming response body from an opened file.
fn file_body(stream: FileStream) -> Body {
    Body::from_stream(ReaderStream::new(stream.into_reader()))
}

/// GET /api/download - Download a whole file as an attachment.
#[utoipa::path(
    get,
    path = "/download",
    tag = "transfer",
    params(
        ("file" = String, Query, description = "File relative to the storage root")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Missing file parameter"),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> Result<Response<Body>, ApiError> {
    let file = query
        .file
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing file parameter"))?;

    let stream = state.streamer.open(&file, None).await?;
    let disposition = content_disposition_header(&stream.file_name);
    let length = stream.content_length();

    Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(header::CONTENT_LENGTH, length)
        .body(file_body(stream))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// GET /api/stream - Stream a media file, honouring `Range`.
#[utoipa::path(
    get,
    path = "/stream",
    tag = "transfer",
    params(
        ("file" = String, Query, description = "File relative to the storage root"),
        ("Range" = Option<String>, Header, description = "Byte range, e.g. bytes=0-1023")
    ),
    responses(
        (status = 200, description = "Whole file"),
        (status = 206, description = "Requested byte range"),
        (status = 400, description = "Missing file parameter"),
        (status = 404, description = "File not found"),
        (status = 416, description = "Range not satisfiable")
    )
)]
pub async fn stream_file(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
) -> Result<Response<Body>, ApiError> {
    let file = query
        .file
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing file parameter"))?;
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    let stream = state.streamer.open(&file, range).await?;

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, stream.content_type)
        .header(header::CONTENT_LENGTH, stream.content_length())
        .header(header::ACCEPT_RANGES, "bytes");

    builder = match stream.content_range() {
        Some(content_range) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, content_range),
        None => builder.status(StatusCode::OK),
    };

    builder.body(file_body(stream)).map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        ApiError::internal("Failed to build response")
    })
}
