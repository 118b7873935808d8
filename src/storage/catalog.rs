//! Directory listing.

use std::cmp::Ordering;
use std::io;

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;

use super::stats::{sample_system_stats, SystemStats};
use super::PathResolver;
use crate::{NasError, Result};

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    /// Always 0: children are not stat'ed, to keep large listings cheap.
    pub size: u64,
    /// Location relative to the storage root, usable as the next request path.
    pub path: String,
}

/// Result of listing a directory.
#[derive(Debug, Clone)]
pub struct Listing {
    pub entries: Vec<DirectoryEntry>,
    pub stats: SystemStats,
}

/// Lists directories under the storage root.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    resolver: PathResolver,
}

impl DirectoryCatalog {
    /// Create a new catalog.
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// List the immediate children of `path`, directories first, and sample host stats.
    pub async fn list(&self, path: &str) -> Result<Listing> {
        let dir = self
            .resolver
            .confine(self.resolver.resolve(path)?, path)
            .await?;

        let metadata = match tokio::fs::metadata(&dir).await {
            Ok(m) => m,
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                return Err(NasError::NotFound(format!("Directory: {path}")));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Err(NasError::NotADirectory(path.to_string()));
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let is_directory = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory,
                size: 0,
                path: self.resolver.relative(&entry.path()),
            });
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| compare_names(&a.name, &b.name))
        });

        let root = self.resolver.root().to_path_buf();
        let stats = tokio::task::spawn_blocking(move || sample_system_stats(&root))
            .await
            .map_err(|e| NasError::Io(io::Error::other(e)))?;

        tracing::debug!(path = %path, count = entries.len(), "listed directory");

        Ok(Listing { entries, stats })
    }
}

/// Locale-style name ordering.
///
/// Names compare by base letter first, ignoring case and accents. On a tie
/// unaccented letters sort before accented ones, then lowercase before
/// uppercase, and the raw string breaks any remaining tie so the order is total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accents(a).cmp(&accents(b)))
        .then_with(|| {
            a.chars()
                .zip(b.chars())
                .find(|(x, y)| x != y)
                .map(|(x, y)| match (x.is_lowercase(), y.is_lowercase()) {
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => Ordering::Equal,
                })
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.cmp(b))
}

fn base_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

/// Combining marks attached to each base character, in order.
fn accents(name: &str) -> Vec<Vec<char>> {
    let mut marks: Vec<Vec<char>> = Vec::new();
    for c in name.nfd() {
        if is_combining_mark(c) {
            if let Some(last) = marks.last_mut() {
                last.push(c);
            }
        } else {
            marks.push(Vec::new());
        }
    }
    marks
}
