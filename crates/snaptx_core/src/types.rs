//! Core type definitions for snaptx.

use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transaction.
///
/// Every `begin` draws a fresh random ID, which also names the transaction's
/// snapshot. IDs are never reused, even across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random transaction ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the snapshot name for this transaction under `prefix`.
    #[must_use]
    pub fn snapshot_name(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.0.simple())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0.simple())
    }
}
