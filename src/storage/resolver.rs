//! Client path resolution beneath the storage root.

use std::io;
use std::path::{Component, Path, PathBuf};

use super::StorageRoot;
use crate::{NasError, Result};

/// What to do with a client path that would climb above the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapePolicy {
    /// Resolve to the root itself.
    #[default]
    Clamp,
    /// Fail with [`NasError::OutOfBounds`].
    Reject,
}

/// Maps client-supplied relative paths to absolute paths inside a [`StorageRoot`].
///
/// [`PathResolver::resolve`] is pure path arithmetic. Before touching the
/// filesystem, callers pass the result through [`PathResolver::confine`],
/// which follows symlinks and re-checks that the real location stays inside
/// the root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: StorageRoot,
    policy: EscapePolicy,
}

impl PathResolver {
    /// Create a resolver that clamps escaping paths to the root.
    pub fn new(root: StorageRoot) -> Self {
        Self {
            root,
            policy: EscapePolicy::Clamp,
        }
    }

    /// Set the escape policy.
    pub fn with_policy(mut self, policy: EscapePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Whether `path` is the storage root itself.
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root.path()
    }

    /// Resolve a client path against the storage root.
    ///
    /// Leading slashes are stripped and `.`/`..` segments collapsed. A path
    /// whose `..` segments climb above the root is handled per the
    /// [`EscapePolicy`].
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let mut segments: Vec<&str> = Vec::new();
        let mut escaped = false;

        for segment in relative.trim_start_matches('/').split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        escaped = true;
                        break;
                    }
                }
                name => segments.push(name),
            }
        }

        if escaped {
            return self.escape(relative);
        }

        let mut resolved = self.root.path().to_path_buf();
        for segment in segments {
            resolved.push(segment);
        }

        // A segment such as "C:" or one carrying a separator on another
        // platform could still re-anchor the path.
        if !self.contains(&resolved) {
            return self.escape(relative);
        }

        Ok(resolved)
    }

    /// Resolve `folder` and then a single child `name` beneath it.
    pub fn resolve_child(&self, folder: &str, name: &str) -> Result<PathBuf> {
        self.resolve(&format!("{}/{}", folder.trim_end_matches('/'), name))
    }

    /// Express an absolute path inside the root as a `/`-separated relative path.
    ///
    /// Returns an empty string for the root itself.
    pub fn relative(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(self.root.path())
            .map(|rel| {
                rel.components()
                    .filter_map(|c| match c {
                        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default()
    }

    /// Check `resolved` against the real filesystem and apply the escape
    /// policy if a symlink along it leads outside the root.
    pub async fn confine(&self, resolved: PathBuf, relative: &str) -> Result<PathBuf> {
        if self.escapes_root(&resolved).await? {
            return self.escape(relative);
        }
        Ok(resolved)
    }

    /// Whether the deepest existing ancestor of `path`, with symlinks
    /// followed, lies outside the root.
    ///
    /// A dangling symlink is judged by where it points.
    pub async fn escapes_root(&self, path: &Path) -> Result<bool> {
        let mut ancestor = path.to_path_buf();
        loop {
            match tokio::fs::canonicalize(&ancestor).await {
                Ok(real) => return Ok(!self.contains(&real)),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                    ) =>
                {
                    let dangling = tokio::fs::symlink_metadata(&ancestor)
                        .await
                        .map(|m| m.file_type().is_symlink())
                        .unwrap_or(false);
                    ancestor = if dangling {
                        let target = tokio::fs::read_link(&ancestor).await?;
                        match ancestor.parent() {
                            Some(parent) => parent.join(target),
                            None => target,
                        }
                    } else {
                        match ancestor.parent() {
                            Some(parent) => parent.to_path_buf(),
                            None => return Ok(false),
                        }
                    };
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Apply the escape policy to `relative`.
    pub(super) fn escape(&self, relative: &str) -> Result<PathBuf> {
        match self.policy {
            EscapePolicy::Clamp => {
                tracing::warn!(path = %relative, "path escapes storage root, clamping to root");
                Ok(self.root.path().to_path_buf())
            }
            EscapePolicy::Reject => {
                tracing::warn!(path = %relative, "path escapes storage root, rejecting");
                Err(NasError::OutOfBounds(relative.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_resolver() -> (TempDir, PathResolver) {
        let temp_dir = TempDir::new().unwrap();
        let root = StorageRoot::new(temp_dir.path()).unwrap();
        (temp_dir, PathResolver::new(root))
    }

    #[test]
    fn test_resolve_simple() {
        let (_temp_dir, resolver) = setup_resolver();

        let path = resolver.resolve("movies/clip.mp4").unwrap();

        assert_eq!(path, resolver.root().join("movies").join("clip.mp4"));
    }

    #[test]
    fn test_resolve_strips_leading_slashes() {
        let (_temp_dir, resolver) = setup_resolver();

        assert_eq!(
            resolver.resolve("///music").unwrap(),
            resolver.root().join("music")
        );
    }

    #[test]
    fn test_resolve_root_forms() {
        let (_temp_dir, resolver) = setup_resolver();

        for input in ["", "/", ".", "./", "a/..", "/../", "//"] {
            let path = resolver.resolve(input).unwrap();
            assert!(resolver.is_root(&path), "{input:?} should resolve to root");
        }
    }

    #[test]
    fn test_resolve_collapses_dots() {
        let (_temp_dir, resolver) = setup_resolver();

        let path = resolver.resolve("a/./b/../c//d").unwrap();

        assert_eq!(path, resolver.root().join("a").join("c").join("d"));
    }

    #[test]
    fn test_escape_is_clamped() {
        let (_temp_dir, resolver) = setup_resolver();

        for input in ["../../etc", "a/../../etc/passwd", "/../secret", ".."] {
            let path = resolver.resolve(input).unwrap();
            assert!(resolver.is_root(&path), "{input:?} should clamp to root");
        }
    }

    #[test]
    fn test_escape_is_rejected() {
        let (_temp_dir, resolver) = setup_resolver();
        let resolver = resolver.with_policy(EscapePolicy::Reject);

        let result = resolver.resolve("../../etc");

        assert!(matches!(result, Err(NasError::OutOfBounds(_))));
        assert!(resolver.resolve("a/../b").is_ok());
    }

    #[test]
    fn test_never_leaves_root() {
        let (_temp_dir, resolver) = setup_resolver();
        let pieces = ["..", ".", "a", "b", "", "..."];

        for a in pieces {
            for b in pieces {
                for c in pieces {
                    let input = format!("{a}/{b}/{c}");
                    let path = resolver.resolve(&input).unwrap();
                    assert!(path.starts_with(resolver.root()), "{input:?} escaped");
                }
            }
        }
    }

    #[test]
    fn test_triple_dot_is_a_name() {
        let (_temp_dir, resolver) = setup_resolver();

        assert_eq!(resolver.resolve("...").unwrap(), resolver.root().join("..."));
    }

    #[test]
    fn test_resolve_child() {
        let (_temp_dir, resolver) = setup_resolver();

        assert_eq!(
            resolver.resolve_child("/docs/", "report.pdf").unwrap(),
            resolver.root().join("docs").join("report.pdf")
        );
        assert_eq!(
            resolver.resolve_child("", "top.txt").unwrap(),
            resolver.root().join("top.txt")
        );
    }

    #[test]
    fn test_relative() {
        let (_temp_dir, resolver) = setup_resolver();

        let abs = resolver.root().join("a").join("b.txt");
        assert_eq!(resolver.relative(&abs), "a/b.txt");
        assert_eq!(resolver.relative(resolver.root()), "");
    }

    #[cfg(unix)]
    fn link_outside(resolver: &PathResolver) -> TempDir {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), b"top secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), resolver.root().join("link")).unwrap();
        outside
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_escapes() {
        let (_temp_dir, resolver) = setup_resolver();
        let _outside = link_outside(&resolver);

        let through_link = resolver.resolve("link/secret.txt").unwrap();
        assert!(resolver.escapes_root(&through_link).await.unwrap());

        let not_yet_created = resolver.resolve("link/new/deeper.txt").unwrap();
        assert!(resolver.escapes_root(&not_yet_created).await.unwrap());

        assert_eq!(
            resolver.confine(through_link, "link/secret.txt").await.unwrap(),
            resolver.root()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_rejected() {
        let (_temp_dir, resolver) = setup_resolver();
        let resolver = resolver.with_policy(EscapePolicy::Reject);
        let _outside = link_outside(&resolver);

        let resolved = resolver.resolve("link").unwrap();
        let result = resolver.confine(resolved, "link").await;

        assert!(matches!(result, Err(NasError::OutOfBounds(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_inside_root_is_allowed() {
        let (_temp_dir, resolver) = setup_resolver();
        std::fs::create_dir(resolver.root().join("real")).unwrap();
        std::os::unix::fs::symlink(resolver.root().join("real"), resolver.root().join("alias"))
            .unwrap();

        let resolved = resolver.resolve("alias/file.txt").unwrap();

        assert!(!resolver.escapes_root(&resolved).await.unwrap());
        assert_eq!(
            resolver.confine(resolved.clone(), "alias/file.txt").await.unwrap(),
            resolved
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_out_of_root_escapes() {
        let (_temp_dir, resolver) = setup_resolver();
        let outside = TempDir::new().unwrap();
        let dangling = resolver.root().join("dangling.bin");
        std::os::unix::fs::symlink(outside.path().join("not-yet.bin"), &dangling).unwrap();

        assert!(resolver.escapes_root(&dangling).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_path_does_not_escape() {
        let (_temp_dir, resolver) = setup_resolver();

        let resolved = resolver.resolve("a/b/c.txt").unwrap();

        assert!(!resolver.escapes_root(&resolved).await.unwrap());
    }
}
