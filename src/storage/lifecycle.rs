//! Directory creation and entry deletion.

use std::io;

use super::PathResolver;
use crate::{NasError, Result};

/// Maximum length of a single file or folder name, in bytes.
pub const MAX_NAME_LENGTH: usize = 255;

/// Check that `name` is a single, ordinary path component.
pub fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(NasError::InvalidName(name.to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(NasError::InvalidName(format!(
            "name longer than {MAX_NAME_LENGTH} bytes"
        )));
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c == '\0') {
        return Err(NasError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Creates directories and deletes entries beneath the storage root.
#[derive(Debug, Clone)]
pub struct EntryLifecycle {
    resolver: PathResolver,
}

impl EntryLifecycle {
    /// Create a new lifecycle manager.
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Create the directory `name` inside `folder_path`.
    ///
    /// Exactly one level is created; the parent must already exist.
    pub async fn create_directory(&self, folder_path: &str, name: &str) -> Result<()> {
        validate_entry_name(name)?;
        let target = self
            .resolver
            .confine(self.resolver.resolve_child(folder_path, name)?, folder_path)
            .await?;

        match tokio::fs::create_dir(&target).await {
            Ok(()) => {
                tracing::info!(path = %self.resolver.relative(&target), "created directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(NasError::AlreadyExists(name.to_string()))
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                Err(NasError::ParentMissing(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the file or directory tree at `path`.
    ///
    /// Deleting something that is already gone succeeds. A symlink is removed
    /// without touching its target. A failure midway through a tree may leave
    /// part of it behind.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolver.resolve(path)?;
        if self.resolver.is_root(&target) {
            tracing::warn!(path = %path, "refused to delete storage root");
            return Err(NasError::ForbiddenRootDeletion);
        }

        // The entry itself may be a symlink; only the directories leading to it
        // have to stay inside the root.
        if let Some(parent) = target.parent() {
            if self.resolver.escapes_root(parent).await? {
                self.resolver.escape(path)?;
                tracing::warn!(path = %path, "delete through symlink resolves to storage root");
                return Err(NasError::ForbiddenRootDeletion);
            }
        }

        let metadata = match tokio::fs::symlink_metadata(&target).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "delete target already absent");
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotADirectory => {
                return Err(NasError::NotADirectory(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&target).await
        } else {
            tokio::fs::remove_file(&target).await
        };

        match result {
            Ok(()) => {
                tracing::info!(path = %self.resolver.relative(&target), "deleted entry");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!(path = %path, error = %e, "delete failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EscapePolicy, StorageRoot};
    use std::fs;
    use tempfile::TempDir;

    fn setup_lifecycle() -> (TempDir, EntryLifecycle) {
        let temp_dir = TempDir::new().unwrap();
        let root = StorageRoot::new(temp_dir.path()).unwrap();
        (temp_dir, EntryLifecycle::new(PathResolver::new(root)))
    }

    #[tokio::test]
    async fn test_create_directory() {
        let (temp_dir, lifecycle) = setup_lifecycle();

        lifecycle.create_directory("/", "photos").await.unwrap();

        assert!(temp_dir.path().join("photos").is_dir());
    }

    #[tokio::test]
    async fn test_create_nested_directory() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        fs::create_dir(temp_dir.path().join("media")).unwrap();

        lifecycle.create_directory("media", "2024").await.unwrap();

        assert!(temp_dir.path().join("media").join("2024").is_dir());
    }

    #[tokio::test]
    async fn test_create_directory_already_exists() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        fs::create_dir(temp_dir.path().join("photos")).unwrap();

        let result = lifecycle.create_directory("", "photos").await;

        assert!(matches!(result, Err(NasError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_create_directory_parent_missing() {
        let (_temp_dir, lifecycle) = setup_lifecycle();

        let result = lifecycle.create_directory("no/such/parent", "child").await;

        assert!(matches!(result, Err(NasError::ParentMissing(_))));
    }

    #[tokio::test]
    async fn test_create_directory_invalid_names() {
        let (_temp_dir, lifecycle) = setup_lifecycle();

        for name in ["", ".", "..", "a/b", "a\\b"] {
            let result = lifecycle.create_directory("", name).await;
            assert!(
                matches!(result, Err(NasError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        let file = temp_dir.path().join("old.txt");
        fs::write(&file, b"bye").unwrap();

        lifecycle.delete("old.txt").await.unwrap();

        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_delete_directory_recursively() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        let tree = temp_dir.path().join("tree");
        fs::create_dir_all(tree.join("a").join("b")).unwrap();
        fs::write(tree.join("a").join("b").join("leaf.bin"), b"leaf").unwrap();

        lifecycle.delete("/tree").await.unwrap();

        assert!(!tree.exists());
        assert!(temp_dir.path().exists());
    }

    #[tokio::test]
    async fn test_delete_absent_is_ok() {
        let (_temp_dir, lifecycle) = setup_lifecycle();

        lifecycle.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_root_forbidden() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        fs::write(temp_dir.path().join("keep.txt"), b"keep").unwrap();

        for path in ["", "/", "/../", ".", "a/..", "../../"] {
            let result = lifecycle.delete(path).await;
            assert!(
                matches!(result, Err(NasError::ForbiddenRootDeletion)),
                "{path:?} should be refused"
            );
        }

        assert!(temp_dir.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_escape_rejected_with_policy() {
        let temp_dir = TempDir::new().unwrap();
        let root = StorageRoot::new(temp_dir.path()).unwrap();
        let lifecycle =
            EntryLifecycle::new(PathResolver::new(root).with_policy(EscapePolicy::Reject));

        let result = lifecycle.delete("../outside").await;

        assert!(matches!(result, Err(NasError::OutOfBounds(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_delete_symlink_keeps_target() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        let target = temp_dir.path().join("real");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("data.txt"), b"data").unwrap();
        std::os::unix::fs::symlink(&target, temp_dir.path().join("link")).unwrap();

        lifecycle.delete("link").await.unwrap();

        assert!(!temp_dir.path().join("link").exists());
        assert!(target.join("data.txt").exists());
    }

    #[test]
    fn test_validate_entry_name() {
        assert!(validate_entry_name("report.pdf").is_ok());
        assert!(validate_entry_name("日本語フォルダ").is_ok());
        assert!(validate_entry_name("...").is_ok());
        assert!(validate_entry_name(&"x".repeat(256)).is_err());
        assert!(validate_entry_name("nul\0byte").is_err());
    }

    #[tokio::test]
    async fn test_file_in_the_middle_of_a_path() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        fs::write(temp_dir.path().join("notes.txt"), b"x").unwrap();

        let created = lifecycle.create_directory("notes.txt", "sub").await;
        assert!(matches!(created, Err(NasError::ParentMissing(_))));

        let deleted = lifecycle.delete("notes.txt/inner").await;
        assert!(matches!(deleted, Err(NasError::NotADirectory(_))));
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directory_outside_root() {
        let (temp_dir, lifecycle) = setup_lifecycle();
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, b"top secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();

        let result = lifecycle.delete("link/secret.txt").await;
        assert!(matches!(result, Err(NasError::ForbiddenRootDeletion)));
        assert!(secret.exists());

        let result = lifecycle.create_directory("link", "planted").await;
        assert!(matches!(result, Err(NasError::AlreadyExists(_))));
        assert!(!outside.path().join("planted").exists());

        // Removing the link itself leaves its target alone
        lifecycle.delete("link").await.unwrap();
        assert!(!temp_dir.path().join("link").exists());
        assert!(secret.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_directory_outside_root_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), b"top secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();
        let root = StorageRoot::new(temp_dir.path()).unwrap();
        let lifecycle =
            EntryLifecycle::new(PathResolver::new(root).with_policy(EscapePolicy::Reject));

        let result = lifecycle.delete("link/secret.txt").await;

        assert!(matches!(result, Err(NasError::OutOfBounds(_))));
        assert!(outside.path().join("secret.txt").exists());
    }
}
