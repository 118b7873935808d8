//! Chunked upload reassembly.
//!
//! A client splits a file into ordered chunks and sends them one request at
//! a time. Chunk 0 truncates (or creates) the destination, every later chunk
//! appends. The [`UploadTracker`] keeps one session per destination so that
//! out-of-order, duplicate or concurrent chunks are refused instead of
//! silently corrupting the file.

use std::collections::HashMap;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::lifecycle::validate_entry_name;
use super::PathResolver;
use crate::{NasError, Result};

/// One chunk of a chunked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Destination directory, relative to the storage root.
    pub folder_path: String,
    /// Destination file name (a single path component).
    pub filename: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    /// Client-chosen id tying the chunks of one upload together.
    pub upload_id: Option<String>,
}

/// Result of a successfully written chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Destination, relative to the storage root.
    pub path: String,
    pub bytes_written: u64,
    /// Whether this was the last chunk of the upload.
    pub complete: bool,
}

#[derive(Debug)]
struct UploadSession {
    upload_id: Option<String>,
    next_index: u32,
    total_chunks: u32,
    writing: bool,
    last_activity: Instant,
}

/// In-progress uploads, keyed by resolved destination path.
#[derive(Debug)]
pub struct UploadTracker {
    sessions: Mutex<HashMap<PathBuf, UploadSession>>,
    ttl: Duration,
}

impl UploadTracker {
    /// Create a tracker that abandons sessions idle for longer than `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of uploads currently in progress.
    pub fn active_sessions(&self) -> usize {
        self.lock().len()
    }

    /// Drop sessions idle longer than the TTL; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.writing || now.duration_since(s.last_activity) <= self.ttl);
        before - sessions.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, UploadSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `dest` for writing `request`'s chunk.
    ///
    /// The returned guard holds the per-path write lock until it is completed
    /// or dropped.
    fn begin(&self, dest: &Path, request: &ChunkRequest) -> Result<WriteGuard<'_>> {
        let now = Instant::now();
        let mut sessions = self.lock();

        sessions.retain(|_, s| s.writing || now.duration_since(s.last_activity) <= self.ttl);

        if let Some(session) = sessions.get(dest) {
            if session.writing {
                return Err(NasError::Conflict(
                    "another chunk is being written to this file".to_string(),
                ));
            }
        }

        if request.chunk_index == 0 {
            if let Some(session) = sessions.get(dest) {
                if session.upload_id.is_some() && session.upload_id != request.upload_id {
                    return Err(NasError::Conflict(
                        "a different upload is in progress for this file".to_string(),
                    ));
                }
            }
            sessions.insert(
                dest.to_path_buf(),
                UploadSession {
                    upload_id: request.upload_id.clone(),
                    next_index: 0,
                    total_chunks: request.total_chunks,
                    writing: true,
                    last_activity: now,
                },
            );
        } else {
            let session = sessions.get_mut(dest).ok_or_else(|| {
                NasError::Conflict(format!(
                    "no upload in progress, chunk {} received; restart from chunk 0",
                    request.chunk_index
                ))
            })?;
            if session.upload_id != request.upload_id {
                return Err(NasError::Conflict("upload id mismatch".to_string()));
            }
            if session.total_chunks != request.total_chunks {
                return Err(NasError::Conflict(format!(
                    "total chunk count changed from {} to {}",
                    session.total_chunks, request.total_chunks
                )));
            }
            if session.next_index != request.chunk_index {
                return Err(NasError::Conflict(format!(
                    "expected chunk {}, got {}",
                    session.next_index, request.chunk_index
                )));
            }
            session.writing = true;
            session.last_activity = now;
        }

        Ok(WriteGuard {
            tracker: self,
            dest: dest.to_path_buf(),
            settled: false,
        })
    }
}

/// Per-path write lock. Dropping it without [`WriteGuard::finish`] abandons the session.
struct WriteGuard<'a> {
    tracker: &'a UploadTracker,
    dest: PathBuf,
    settled: bool,
}

impl WriteGuard<'_> {
    /// Record a successful chunk; returns true when the upload is complete.
    fn finish(mut self) -> bool {
        self.settled = true;
        let mut sessions = self.tracker.lock();

        let Some(session) = sessions.get_mut(&self.dest) else {
            return false;
        };
        session.next_index += 1;
        session.writing = false;
        session.last_activity = Instant::now();

        if session.next_index >= session.total_chunks {
            sessions.remove(&self.dest);
            true
        } else {
            false
        }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.lock().remove(&self.dest);
        }
    }
}

/// Writes upload chunks to disk.
#[derive(Debug, Clone)]
pub struct ChunkedUploadReceiver {
    resolver: PathResolver,
    tracker: Arc<UploadTracker>,
    max_chunk_size: u64,
    chunk_timeout: Duration,
}

impl ChunkedUploadReceiver {
    /// Create a new receiver.
    pub fn new(
        resolver: PathResolver,
        tracker: Arc<UploadTracker>,
        max_chunk_size: u64,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            tracker,
            max_chunk_size,
            chunk_timeout,
        }
    }

    /// The session tracker shared by this receiver.
    pub fn tracker(&self) -> &Arc<UploadTracker> {
        &self.tracker
    }

    /// Stream one chunk into its destination file.
    ///
    /// The destination directory must exist. On success the data has been
    /// flushed and synced to disk. On failure the partial file is kept and the
    /// session is dropped, so the client has to restart from chunk 0.
    pub async fn write_chunk<S, B, E>(&self, request: &ChunkRequest, body: S) -> Result<ChunkOutcome>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        if request.total_chunks == 0 {
            return Err(NasError::Validation(
                "total chunk count must be at least 1".to_string(),
            ));
        }
        if request.chunk_index >= request.total_chunks {
            return Err(NasError::Validation(format!(
                "chunk index {} out of range for {} chunks",
                request.chunk_index, request.total_chunks
            )));
        }
        validate_entry_name(&request.filename)?;

        let dir = self
            .resolver
            .confine(self.resolver.resolve(&request.folder_path)?, &request.folder_path)
            .await?;
        match tokio::fs::metadata(&dir).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) => return Err(NasError::DirectoryMissing(request.folder_path.clone())),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Err(NasError::DirectoryMissing(request.folder_path.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        let dest = dir.join(&request.filename);

        // An existing symlink at the destination would redirect the write.
        if self.resolver.escapes_root(&dest).await? {
            tracing::warn!(file = %request.filename, "upload destination links outside storage root");
            return Err(NasError::OutOfBounds(request.filename.clone()));
        }

        let guard = self.tracker.begin(&dest, request).inspect_err(|e| {
            tracing::warn!(
                path = %self.resolver.relative(&dest),
                chunk_index = request.chunk_index,
                error = %e,
                "chunk refused"
            );
        })?;

        let truncate = request.chunk_index == 0;
        let written = match tokio::time::timeout(
            self.chunk_timeout,
            self.write_body(&dest, truncate, body),
        )
        .await
        {
            Ok(Ok(written)) => written,
            Ok(Err(e)) => {
                tracing::warn!(
                    path = %self.resolver.relative(&dest),
                    chunk_index = request.chunk_index,
                    error = %e,
                    "chunk write failed, partial file kept"
                );
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(
                    path = %self.resolver.relative(&dest),
                    chunk_index = request.chunk_index,
                    "chunk write timed out, partial file kept"
                );
                return Err(NasError::WriteFailed("chunk write timed out".to_string()));
            }
        };

        let complete = guard.finish();
        let path = self.resolver.relative(&dest);

        tracing::debug!(
            path = %path,
            chunk_index = request.chunk_index,
            total_chunks = request.total_chunks,
            bytes = written,
            "chunk written"
        );
        if complete {
            tracing::info!(path = %path, "upload complete");
        }

        Ok(ChunkOutcome {
            path,
            bytes_written: written,
            complete,
        })
    }

    async fn write_body<S, B, E>(&self, dest: &Path, truncate: bool, body: S) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut options = OpenOptions::new();
        if truncate {
            options.write(true).create(true).truncate(true);
        } else {
            options.append(true).create(true);
        }
        let mut file = options.open(dest).await.map_err(write_failed)?;

        let mut body = std::pin::pin!(body);
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| NasError::WriteFailed(format!("request body: {e}")))?;
            let bytes = chunk.as_ref();
            written += bytes.len() as u64;
            if written > self.max_chunk_size {
                return Err(NasError::ChunkTooLarge(self.max_chunk_size));
            }
            file.write_all(bytes).await.map_err(write_failed)?;
        }

        file.flush().await.map_err(write_failed)?;
        file.sync_all().await.map_err(write_failed)?;

        Ok(written)
    }
}

fn write_failed(e: io::Error) -> NasError {
    NasError::WriteFailed(e.to_string())
}
