//! Transaction manager configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for opening a transaction manager.
#[derive(Debug, Clone)]
pub struct Config {
    /// Prefix for generated snapshot names (`<prefix>_<transaction uuid>`).
    pub snapshot_prefix: String,

    /// Transactions older than this are rolled back instead of committed.
    pub transaction_timeout: Option<Duration>,

    /// Advisory lock file that serializes commit decisions across processes.
    ///
    /// Must live outside the transactional root, otherwise it would be
    /// hashed and rolled back with everything else.
    pub lock_path: Option<PathBuf>,

    /// Whether to create the root directory if it doesn't exist.
    pub create_root_if_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_prefix: "snaptx".to_string(),
            transaction_timeout: None,
            lock_path: None,
            create_root_if_missing: false,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the snapshot name prefix.
    #[must_use]
    pub fn snapshot_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.snapshot_prefix = prefix.into();
        self
    }

    /// Sets the transaction timeout.
    #[must_use]
    pub const fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = Some(timeout);
        self
    }

    /// Sets the cross-process lock file.
    #[must_use]
    pub fn lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    /// Sets whether to create the root if missing.
    #[must_use]
    pub const fn create_root_if_missing(mut self, value: bool) -> Self {
        self.create_root_if_missing = value;
        self
    }
}
