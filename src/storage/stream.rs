//! Full and byte-range file streaming.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};

use super::PathResolver;
use crate::{NasError, Result};

/// Content type used when the extension is not in the media table.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Infer a playback content type from the file extension.
///
/// Only a handful of media types are known; everything else is served as
/// [`DEFAULT_CONTENT_TYPE`].
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("ogg") => "audio/ogg",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// An inclusive byte span, `start <= end < file size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the span.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; a range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Parse a `Range` header against a file of `file_size` bytes.
///
/// Parsing is lenient: an unparsable start reads as 0, an unparsable or
/// missing end as the last byte, an end past the file is clamped, and only
/// the first of several ranges is used. `bytes=-N` selects the last N bytes.
/// A unit other than `bytes` is ignored (`Ok(None)`). A range starting at or
/// past the end of the file is [`NasError::RangeNotSatisfiable`].
pub fn parse_range(header: &str, file_size: u64) -> Result<Option<ByteRange>> {
    let header = header.trim();
    let Some(spec) = header
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes="))
        .map(|_| &header[6..])
    else {
        return Ok(None);
    };

    let unsatisfiable = NasError::RangeNotSatisfiable(file_size);
    let Some(last) = file_size.checked_sub(1) else {
        return Err(unsatisfiable);
    };

    let first = spec.split(',').next().unwrap_or_default().trim();
    let (start_part, end_part) = first.split_once('-').unwrap_or((first, ""));
    let (start_part, end_part) = (start_part.trim(), end_part.trim());

    if start_part.is_empty() {
        if let Ok(suffix) = end_part.parse::<u64>() {
            if suffix == 0 {
                return Err(unsatisfiable);
            }
            return Ok(Some(ByteRange {
                start: file_size.saturating_sub(suffix),
                end: last,
            }));
        }
    }

    let start = start_part.parse::<u64>().unwrap_or(0);
    let end = end_part.parse::<u64>().unwrap_or(last).min(last);

    if start > end {
        return Err(unsatisfiable);
    }

    Ok(Some(ByteRange { start, end }))
}

/// An opened file ready to be sent, whole or as one range.
#[derive(Debug)]
pub struct FileStream {
    reader: Take<File>,
    /// Size of the whole file.
    pub file_size: u64,
    /// The requested span, if a satisfiable range was asked for.
    pub range: Option<ByteRange>,
    pub content_type: &'static str,
    /// Final path component, for download headers.
    pub file_name: String,
}

impl FileStream {
    /// Number of body bytes.
    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.file_size, |r| r.len())
    }

    /// `Content-Range` value for a partial response.
    pub fn content_range(&self) -> Option<String> {
        self.range
            .map(|r| format!("bytes {}-{}/{}", r.start, r.end, self.file_size))
    }

    /// Reader limited to exactly the body bytes.
    pub fn into_reader(self) -> Take<File> {
        self.reader
    }
}

/// Opens files under the storage root for streaming.
#[derive(Debug, Clone)]
pub struct RangeStreamer {
    resolver: PathResolver,
}

impl RangeStreamer {
    /// Create a new streamer.
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Open `path` and position it for `range_header`, if any.
    ///
    /// The handle is opened before anything is sent, so a concurrent delete
    /// does not cut off a stream that already started on POSIX systems.
    pub async fn open(&self, path: &str, range_header: Option<&str>) -> Result<FileStream> {
        let full_path = self
            .resolver
            .confine(self.resolver.resolve(path)?, path)
            .await?;
        let not_found = || NasError::NotFound(format!("File: {path}"));

        let mut file = File::open(&full_path).await.map_err(|_| not_found())?;
        let metadata = file.metadata().await.map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }
        let file_size = metadata.len();

        let range = match range_header {
            Some(header) => parse_range(header, file_size).inspect_err(|_| {
                tracing::debug!(path = %path, range = %header, file_size, "range not satisfiable");
            })?,
            None => None,
        };

        let limit = match range {
            Some(r) => {
                file.seek(SeekFrom::Start(r.start)).await?;
                tracing::debug!(path = %path, start = r.start, end = r.end, "streaming range");
                r.len()
            }
            None => file_size,
        };

        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(FileStream {
            reader: file.take(limit),
            file_size,
            range,
            content_type: content_type_for(&full_path),
            file_name,
        })
    }
}
