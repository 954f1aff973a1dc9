//! Test fixtures for transactional trees.
//!
//! Provides a temporary root with a manager over it, plus raw helpers that
//! act as an "external actor" touching files outside any transaction.

use snaptx_core::{Config, TransactionManager};
use snaptx_volume::{InMemoryProvider, SnapshotProvider};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A transactional tree in a temporary directory, with automatic cleanup.
pub struct TestTree {
    /// The transaction manager over the tree.
    pub manager: TransactionManager,
    /// The in-memory provider, when the tree was built with one.
    pub provider: Option<Arc<InMemoryProvider>>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestTree {
    /// Creates an empty tree with the in-memory provider and default config.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty tree with the in-memory provider.
    pub fn with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let provider = Arc::new(InMemoryProvider::new(temp_dir.path()));
        let manager = TransactionManager::open(temp_dir.path(), config, provider.clone())
            .expect("Failed to open transaction manager");
        Self {
            manager,
            provider: Some(provider),
            _temp_dir: temp_dir,
        }
    }

    /// Creates an empty tree snapshotted by the provider `make` builds.
    ///
    /// `make` receives the root directory.
    pub fn with_provider<P, F>(config: Config, make: F) -> (Self, Arc<P>)
    where
        P: SnapshotProvider + 'static,
        F: FnOnce(&std::path::Path) -> P,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let provider = Arc::new(make(temp_dir.path()));
        let manager = TransactionManager::open(temp_dir.path(), config, provider.clone())
            .expect("Failed to open transaction manager");
        let tree = Self {
            manager,
            provider: None,
            _temp_dir: temp_dir,
        };
        (tree, provider)
    }

    /// Seeds files outside any transaction.
    #[must_use]
    pub fn with_files(self, files: &[(&str, &str)]) -> Self {
        for (name, content) in files {
            self.write_raw(name, content);
        }
        self
    }

    /// Returns the absolute path of a root-relative name.
    pub fn path(&self, name: &str) -> PathBuf {
        self.manager.root().join(name)
    }

    /// Writes a file directly, as an external actor would.
    pub fn write_raw(&self, name: &str, content: &str) {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    /// Reads a file directly; `None` if it does not exist.
    pub fn read_raw(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.path(name)).ok()
    }

    /// Removes a file directly, as an external actor would.
    pub fn remove_raw(&self, name: &str) {
        fs::remove_file(self.path(name)).expect("Failed to remove file");
    }

    /// Returns the names of snapshots the in-memory provider still holds.
    pub fn snapshot_names(&self) -> Vec<String> {
        self.provider
            .as_ref()
            .map(|p| p.snapshot_names())
            .unwrap_or_default()
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestTree {
    type Target = TransactionManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

/// Runs a test with a temporary tree.
///
/// # Example
///
/// ```rust
/// use snaptx_testkit::with_temp_tree;
///
/// with_temp_tree(|tree| {
///     let mut txn = tree.begin().unwrap();
///     tree.commit(&mut txn).unwrap();
/// });
/// ```
pub fn with_temp_tree<F, R>(f: F) -> R
where
    F: FnOnce(&TestTree) -> R,
{
    let tree = TestTree::new();
    f(&tree)
}
