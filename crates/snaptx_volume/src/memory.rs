//! In-memory snapshot provider for testing.

use crate::error::{SnapshotError, SnapshotResult};
use crate::provider::{validate_snapshot_name, SnapshotHandle, SnapshotProvider};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Dataset label used in handles issued by [`InMemoryProvider`].
const MEMORY_DATASET: &str = "memory";

/// A frozen copy of every file and directory under the root.
#[derive(Debug, Default, Clone)]
struct TreeImage {
    /// Root-relative directory paths.
    dirs: BTreeSet<PathBuf>,
    /// Root-relative file paths and their contents.
    files: BTreeMap<PathBuf, Vec<u8>>,
}

/// A snapshot provider that keeps tree images in memory.
///
/// Creating a snapshot reads every regular file under the root into memory;
/// rolling back rewrites the tree to match the image exactly, deleting files
/// and directories that appeared afterwards. Suitable for:
/// - Unit and integration tests
/// - Small trees on filesystems without native snapshots
///
/// # Atomicity
///
/// Provider operations are serialized against each other. They are not
/// atomic with respect to unrelated processes writing into the tree while a
/// rollback is in progress; a copy-on-write volume is required for that.
///
/// # Example
///
/// ```rust
/// use snaptx_volume::{InMemoryProvider, SnapshotProvider};
///
/// let dir = tempfile::tempdir().unwrap();
/// let provider = InMemoryProvider::new(dir.path());
/// let handle = provider.create_snapshot("s1").unwrap();
/// assert_eq!(provider.snapshot_names(), vec!["s1".to_string()]);
/// provider.destroy_snapshot(&handle).unwrap();
/// assert!(provider.snapshot_names().is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryProvider {
    root: PathBuf,
    /// Live snapshots in creation order.
    images: Mutex<Vec<(String, TreeImage)>>,
}

impl InMemoryProvider {
    /// Creates a provider for the tree rooted at `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            images: Mutex::new(Vec::new()),
        }
    }

    /// Returns the root this provider snapshots.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the names of live snapshots, oldest first.
    #[must_use]
    pub fn snapshot_names(&self) -> Vec<String> {
        self.images
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn capture(&self) -> SnapshotResult<TreeImage> {
        let mut image = TreeImage::default();
        for entry in WalkDir::new(&self.root).follow_links(false).min_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = relative_to(&self.root, entry.path());
            let file_type = entry.file_type();
            if file_type.is_dir() {
                image.dirs.insert(relative);
            } else if file_type.is_file() {
                match fs::read(entry.path()) {
                    Ok(bytes) => {
                        image.files.insert(relative, bytes);
                    }
                    // Deleted between listing and reading.
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(image)
    }

    fn restore(&self, image: &TreeImage) -> SnapshotResult<()> {
        let mut current_dirs = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false).min_depth(1) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = relative_to(&self.root, entry.path());
            if entry.file_type().is_dir() {
                if !image.dirs.contains(&relative) {
                    current_dirs.push((entry.depth(), entry.path().to_path_buf()));
                }
            } else if entry.file_type().is_file() && !image.files.contains_key(&relative) {
                remove_file_if_exists(entry.path())?;
            }
        }

        // Deepest first so children are gone before their parents.
        current_dirs.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, dir) in current_dirs {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        for dir in &image.dirs {
            fs::create_dir_all(self.root.join(dir))?;
        }
        for (relative, bytes) in &image.files {
            let path = self.root.join(relative);
            // Leave untouched files alone so their mtimes survive.
            if fs::read(&path).ok().as_deref() != Some(bytes.as_slice()) {
                fs::write(&path, bytes)?;
            }
        }
        Ok(())
    }
}

impl SnapshotProvider for InMemoryProvider {
    fn create_snapshot(&self, name: &str) -> SnapshotResult<SnapshotHandle> {
        validate_snapshot_name(name)?;
        let mut images = self.images.lock();
        if images.iter().any(|(existing, _)| existing == name) {
            return Err(SnapshotError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let image = self.capture()?;
        tracing::trace!(snapshot = name, files = image.files.len(), "captured tree image");
        images.push((name.to_string(), image));
        Ok(SnapshotHandle::new(MEMORY_DATASET, name))
    }

    fn rollback(&self, handle: &SnapshotHandle) -> SnapshotResult<()> {
        let mut images = self.images.lock();
        let position = images
            .iter()
            .position(|(name, _)| name == handle.name())
            .ok_or_else(|| SnapshotError::NotFound {
                name: handle.name().to_string(),
            })?;

        self.restore(&images[position].1)?;

        let discarded = images.len() - position - 1;
        if discarded > 0 {
            tracing::trace!(snapshot = %handle, discarded, "discarding newer snapshots");
        }
        images.truncate(position + 1);
        Ok(())
    }

    fn destroy_snapshot(&self, handle: &SnapshotHandle) -> SnapshotResult<()> {
        let mut images = self.images.lock();
        let position = images
            .iter()
            .position(|(name, _)| name == handle.name())
            .ok_or_else(|| SnapshotError::NotFound {
                name: handle.name().to_string(),
            })?;
        images.remove(position);
        Ok(())
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
