//! File store confined to a root directory.

use crate::error::{CoreError, CoreResult};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Reads, writes and deletes files under a fixed root.
///
/// Every caller-supplied path is interpreted relative to the root. Paths that
/// would resolve outside it - absolute paths, `..` climbing past the root, or
/// symlinks pointing elsewhere - are rejected with [`CoreError::PathEscape`]
/// before any I/O happens.
///
/// `FileStore` is cheap to clone; clones share the same root.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Canonical root directory.
    root: Arc<PathBuf>,
}

impl FileStore {
    /// Opens a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or is not a directory.
    pub fn open(root: &Path) -> CoreResult<Self> {
        let canonical = root.canonicalize()?;
        if !canonical.is_dir() {
            return Err(CoreError::invalid_config(format!(
                "store root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: Arc::new(canonical),
        })
    }

    /// Returns the canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a root-relative path to an absolute path under the root.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PathEscape`] if the path does not name an entry
    /// strictly inside the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> CoreResult<PathBuf> {
        let requested = path.as_ref();
        let escape = || CoreError::PathEscape {
            path: requested.to_path_buf(),
        };

        let mut normalized = PathBuf::new();
        for component in requested.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(escape());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(escape()),
            }
        }
        if normalized.as_os_str().is_empty() {
            return Err(escape());
        }

        let candidate = self.root.join(&normalized);
        let (Some(parent), Some(file_name)) = (candidate.parent(), candidate.file_name()) else {
            return Err(escape());
        };

        // Resolve symlinked directories so the result names the same path a
        // tree walk would report.
        let real_parent = self.real_dir(parent, requested)?;

        let resolved = real_parent.join(file_name);
        let is_symlink = fs::symlink_metadata(&resolved)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_symlink {
            match resolved.canonicalize() {
                Ok(target) if target.starts_with(self.root.as_path()) && target != *self.root => {}
                Ok(_) => return Err(escape()),
                // Dangling symlink: its target is unknown.
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(escape()),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(resolved)
    }

    /// Canonicalizes the nearest existing ancestor of `dir` and re-appends
    /// the missing tail, rejecting ancestors that resolve outside the root.
    fn real_dir(&self, dir: &Path, requested: &Path) -> CoreResult<PathBuf> {
        let escape = || CoreError::PathEscape {
            path: requested.to_path_buf(),
        };
        for ancestor in dir.ancestors() {
            match fs::symlink_metadata(ancestor) {
                Ok(_) => {
                    let real = match ancestor.canonicalize() {
                        Ok(real) => real,
                        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(escape()),
                        Err(e) => return Err(e.into()),
                    };
                    if !real.starts_with(self.root.as_path()) {
                        return Err(escape());
                    }
                    return Ok(match dir.strip_prefix(ancestor) {
                        Ok(tail) if !tail.as_os_str().is_empty() => real.join(tail),
                        _ => real,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(escape())
    }

    /// Reads the full contents of a file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the file does not exist.
    pub fn read(&self, path: impl AsRef<Path>) -> CoreResult<Vec<u8>> {
        let resolved = self.resolve(&path)?;
        Self::read_resolved(path.as_ref(), &resolved)
    }

    /// Creates or fully overwrites a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the root or the write fails.
    pub fn write(&self, path: impl AsRef<Path>, bytes: &[u8]) -> CoreResult<()> {
        let resolved = self.resolve(path)?;
        Self::write_resolved(&resolved, bytes)
    }

    /// Removes a file. Removing a file that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes the root or the removal fails.
    pub fn delete(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let resolved = self.resolve(path)?;
        Self::delete_resolved(&resolved)
    }

    /// Lists every regular file under the root as root-relative paths, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be walked.
    pub fn list(&self) -> CoreResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(self.root.as_path())
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                if let Ok(relative) = entry.path().strip_prefix(self.root.as_path()) {
                    files.push(relative.to_path_buf());
                }
            }
        }
        Ok(files)
    }

    pub(crate) fn read_resolved(requested: &Path, resolved: &Path) -> CoreResult<Vec<u8>> {
        fs::read(resolved).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CoreError::NotFound {
                path: requested.to_path_buf(),
            },
            _ => CoreError::Io(e),
        })
    }

    /// Returns the file a resolved symlink finally points to.
    ///
    /// `None` for anything that is not a symlink. Only meaningful for paths
    /// returned by [`FileStore::resolve`], which has already checked that
    /// the target lies inside the root.
    pub(crate) fn link_target(resolved: &Path) -> Option<PathBuf> {
        let metadata = fs::symlink_metadata(resolved).ok()?;
        if !metadata.file_type().is_symlink() {
            return None;
        }
        resolved.canonicalize().ok()
    }

    pub(crate) fn write_resolved(resolved: &Path, bytes: &[u8]) -> CoreResult<()> {
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(resolved, bytes)?;
        Ok(())
    }

    pub(crate) fn delete_resolved(resolved: &Path) -> CoreResult<()> {
        match fs::remove_file(resolved) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
