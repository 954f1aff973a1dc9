//! Error types for snaptx core.

use crate::conflict::ConflictReport;
use crate::types::TransactionId;
use snaptx_volume::SnapshotError;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in snaptx core operations.
///
/// `commit` always resolves to one of three outcomes: success, a
/// [`CoreError::Conflict`] (the volume was rolled back; retrying is safe), or
/// a fatal [`CoreError::Snapshot`] (the substrate itself failed).
#[derive(Debug, Error)]
pub enum CoreError {
    /// The snapshot provider failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Another actor changed files this transaction depended on.
    #[error("transaction {txid} conflicted and was rolled back: {report}")]
    Conflict {
        /// The transaction that was rolled back.
        txid: TransactionId,
        /// What conflicted.
        report: ConflictReport,
    },

    /// The requested file does not exist.
    #[error("file not found: {}", path.display())]
    NotFound {
        /// The path as requested by the caller.
        path: PathBuf,
    },

    /// The requested path resolves outside the store root.
    #[error("path escapes the store root: {}", path.display())]
    PathEscape {
        /// The path as requested by the caller.
        path: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation not permitted in the transaction's current state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// The transaction outlived the configured timeout and was rolled back.
    #[error("transaction {txid} expired after {elapsed:?} and was rolled back")]
    Expired {
        /// The transaction that was rolled back.
        txid: TransactionId,
        /// How long the transaction had been open.
        elapsed: Duration,
    },

    /// The manager configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this is a commit-time conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if the transaction was rolled back and may be retried.
    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Expired { .. })
    }

    /// Returns true if the snapshot substrate failed.
    ///
    /// Fatal errors are never retried automatically; the volume may need
    /// operator attention.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }
}
