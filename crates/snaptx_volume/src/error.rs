//! Error types for snapshot operations.

use std::io;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while creating, rolling back or destroying a snapshot.
///
/// Every variant means the substrate could not do what was asked. Callers
/// must treat these as fatal to the transaction that triggered them.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// An I/O error occurred while capturing or restoring a volume image.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A snapshot with this name already exists.
    #[error("snapshot already exists: {name}")]
    AlreadyExists {
        /// The requested snapshot name.
        name: String,
    },

    /// No snapshot with this name exists.
    #[error("snapshot not found: {name}")]
    NotFound {
        /// The snapshot name that was looked up.
        name: String,
    },

    /// The snapshot or dataset name is not acceptable to the substrate.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The volume manager command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// The rendered command line.
        command: String,
        /// The underlying spawn error.
        source: io::Error,
    },

    /// The volume manager command ran but reported failure.
    #[error("`{command}` failed with status {status:?}: {stderr}")]
    CommandFailed {
        /// The rendered command line.
        command: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

impl SnapshotError {
    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
