//! Error types for homenas.

use thiserror::Error;

/// Common error type for homenas storage operations.
#[derive(Error, Debug)]
pub enum NasError {
    /// A client path tried to leave the storage root.
    #[error("path escapes the storage root: {0}")]
    OutOfBounds(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The target exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The entry to create already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The parent of a directory to create does not exist.
    #[error("parent directory missing for {0}")]
    ParentMissing(String),

    /// The upload destination directory does not exist.
    #[error("directory does not exist: {0}")]
    DirectoryMissing(String),

    /// Attempt to delete the storage root itself.
    #[error("cannot delete the storage root")]
    ForbiddenRootDeletion,

    /// Writing an upload chunk failed; the partial file is left on disk.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Concurrent or out-of-order access to an upload destination.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A file or folder name that is not a single path component.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// An upload chunk exceeded the configured size limit.
    #[error("chunk exceeds {0} bytes")]
    ChunkTooLarge(u64),

    /// A byte range that does not overlap the file; carries the file size.
    #[error("range not satisfiable for {0} byte file")]
    RangeNotSatisfiable(u64),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for homenas operations.
pub type Result<T> = std::result::Result<T, NasError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error_display() {
        let err = NasError::NotFound("file".to_string());
        assert_eq!(err.to_string(), "file not found");
    }

    #[test]
    fn test_forbidden_root_deletion_display() {
        let err = NasError::ForbiddenRootDeletion;
        assert_eq!(err.to_string(), "cannot delete the storage root");
    }

    #[test]
    fn test_conflict_error_display() {
        let err = NasError::Conflict("chunk 3 expected, got 5".to_string());
        assert_eq!(err.to_string(), "conflict: chunk 3 expected, got 5");
    }

    #[test]
    fn test_chunk_too_large_display() {
        let err = NasError::ChunkTooLarge(1024);
        assert_eq!(err.to_string(), "chunk exceeds 1024 bytes");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: NasError = io_err.into();
        assert!(matches!(err, NasError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(NasError::Validation("test".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
