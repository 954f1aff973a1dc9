//! Transaction state.

use crate::conflict::Baseline;
use crate::error::{CoreError, CoreResult};
use crate::store::FileStore;
use crate::transaction::manager::SnapshotRegistry;
use crate::types::TransactionId;
use parking_lot::Mutex;
use snaptx_volume::SnapshotHandle;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::time::{Duration, Instant};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// The commit decision is being made.
    Committing,
    /// Writes were kept and the snapshot destroyed.
    Committed,
    /// The volume was reverted to the transaction's snapshot, or another
    /// transaction's rollback already did so.
    RolledBack,
    /// The snapshot provider failed while finishing the transaction.
    Failed,
}

impl TransactionState {
    /// Returns true for states no transition can leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Failed)
    }
}

/// An open transaction over the file tree.
///
/// Writes and deletes are applied to the live tree immediately. The
/// transaction remembers which paths it touched so that commit-time conflict
/// detection does not blame it for its own changes.
///
/// A `Transaction` belongs to the caller that began it and is never shared.
/// Dropping one that is still active releases its place in the manager's
/// registry but leaks its snapshot; use [`super::TransactionGuard`] when the
/// owner may bail out early.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    snapshot: SnapshotHandle,
    /// Fingerprints captured at begin; never re-captured.
    baseline: Baseline,
    /// Absolute paths this transaction wrote or deleted.
    written: HashSet<PathBuf>,
    state: TransactionState,
    store: FileStore,
    started: Instant,
    /// The issuing manager's registry, for deregistration on drop.
    registry: Weak<Mutex<SnapshotRegistry>>,
}

impl Transaction {
    /// Creates a new active transaction.
    pub(crate) fn new(
        id: TransactionId,
        snapshot: SnapshotHandle,
        baseline: Baseline,
        store: FileStore,
        registry: Weak<Mutex<SnapshotRegistry>>,
    ) -> Self {
        Self {
            id,
            snapshot,
            baseline,
            written: HashSet::new(),
            state: TransactionState::Active,
            store,
            started: Instant::now(),
            registry,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the handle of the snapshot fencing this transaction.
    #[must_use]
    pub fn snapshot(&self) -> &SnapshotHandle {
        &self.snapshot
    }

    /// Returns the baseline captured at begin.
    #[must_use]
    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Returns the absolute paths this transaction wrote or deleted.
    #[must_use]
    pub fn written_paths(&self) -> &HashSet<PathBuf> {
        &self.written
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Returns how long ago the transaction began.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Reads a file from the live tree.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the file does not exist,
    /// [`CoreError::PathEscape`] for paths outside the root, or
    /// [`CoreError::InvalidState`] if the transaction is finished.
    pub fn read(&self, path: impl AsRef<Path>) -> CoreResult<Vec<u8>> {
        self.ensure_active()?;
        self.store.read(path)
    }

    /// Reads a UTF-8 file from the live tree.
    ///
    /// # Errors
    ///
    /// As [`Transaction::read`], plus an I/O error for invalid UTF-8.
    pub fn read_to_string(&self, path: impl AsRef<Path>) -> CoreResult<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| {
            CoreError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// Creates or overwrites a file and records it as this transaction's own.
    ///
    /// Writing through a symlink inside the root records the file it points
    /// to as well, since that is the file whose content changes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PathEscape`] for paths outside the root,
    /// [`CoreError::InvalidState`] if the transaction is finished, or an I/O
    /// error if the write fails.
    pub fn write(&mut self, path: impl AsRef<Path>, bytes: impl AsRef<[u8]>) -> CoreResult<()> {
        self.ensure_active()?;
        let resolved = self.store.resolve(path)?;
        // Registered first so a failed write still counts as ours.
        if let Some(target) = FileStore::link_target(&resolved) {
            self.written.insert(target);
        }
        self.written.insert(resolved.clone());
        FileStore::write_resolved(&resolved, bytes.as_ref())
    }

    /// Deletes a file and records it as this transaction's own.
    ///
    /// Deleting a file that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PathEscape`] for paths outside the root,
    /// [`CoreError::InvalidState`] if the transaction is finished, or an I/O
    /// error if the removal fails.
    pub fn delete(&mut self, path: impl AsRef<Path>) -> CoreResult<()> {
        self.ensure_active()?;
        let resolved = self.store.resolve(path)?;
        self.written.insert(resolved.clone());
        FileStore::delete_resolved(&resolved)
    }

    pub(crate) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    /// Ensures the transaction is active.
    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committing => Err(CoreError::invalid_state(format!(
                "transaction {} is committing",
                self.id
            ))),
            TransactionState::Committed => Err(CoreError::invalid_state(format!(
                "transaction {} already committed",
                self.id
            ))),
            TransactionState::RolledBack => Err(CoreError::invalid_state(format!(
                "transaction {} already rolled back",
                self.id
            ))),
            TransactionState::Failed => Err(CoreError::invalid_state(format!(
                "transaction {} failed",
                self.id
            ))),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            tracing::warn!(
                txid = %self.id,
                snapshot = %self.snapshot,
                "transaction dropped while active; snapshot left behind"
            );
            if let Some(registry) = self.registry.upgrade() {
                registry.lock().abandon(self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_txn() -> (TempDir, Transaction) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let txn = Transaction::new(
            TransactionId::new(),
            SnapshotHandle::new("memory", "s1"),
            Baseline::default(),
            store,
            Weak::new(),
        );
        (dir, txn)
    }

    fn finish(txn: &mut Transaction) {
        txn.set_state(TransactionState::RolledBack);
    }

    #[test]
    fn new_transaction_is_active() {
        let (_dir, mut txn) = create_txn();
        assert!(txn.is_active());
        assert_eq!(txn.state(), TransactionState::Active);
        assert!(txn.written_paths().is_empty());
        finish(&mut txn);
    }

    #[test]
    fn write_records_resolved_path() {
        let (dir, mut txn) = create_txn();
        txn.write("a.txt", "hello").unwrap();

        let expected = dir.path().canonicalize().unwrap().join("a.txt");
        assert!(txn.written_paths().contains(&expected));
        assert_eq!(txn.read("a.txt").unwrap(), b"hello");
        finish(&mut txn);
    }

    #[test]
    fn delete_records_path_even_if_absent() {
        let (_dir, mut txn) = create_txn();
        txn.delete("never.txt").unwrap();
        assert_eq!(txn.written_paths().len(), 1);
        finish(&mut txn);
    }

    #[test]
    fn escaping_write_records_nothing() {
        let (_dir, mut txn) = create_txn();
        let result = txn.write("../escape.txt", "x");
        assert!(matches!(result, Err(CoreError::PathEscape { .. })));
        assert!(txn.written_paths().is_empty());
        finish(&mut txn);
    }

    #[test]
    fn same_path_spelled_twice_recorded_once() {
        let (_dir, mut txn) = create_txn();
        txn.write("dir/a.txt", "1").unwrap();
        txn.write("dir/./../dir/a.txt", "2").unwrap();
        assert_eq!(txn.written_paths().len(), 1);
        assert_eq!(txn.read_to_string("dir/a.txt").unwrap(), "2");
        finish(&mut txn);
    }

    #[cfg(unix)]
    #[test]
    fn write_through_symlink_records_target() {
        let (dir, mut txn) = create_txn();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("a.txt"), "A").unwrap();
        std::os::unix::fs::symlink(root.join("a.txt"), root.join("link.txt")).unwrap();

        txn.write("link.txt", "mine").unwrap();

        assert!(txn.written_paths().contains(&root.join("a.txt")));
        assert!(txn.written_paths().contains(&root.join("link.txt")));
        assert_eq!(std::fs::read_to_string(root.join("a.txt")).unwrap(), "mine");
        finish(&mut txn);
    }

    #[cfg(unix)]
    #[test]
    fn delete_through_symlink_records_only_link() {
        let (dir, mut txn) = create_txn();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("a.txt"), "A").unwrap();
        std::os::unix::fs::symlink(root.join("a.txt"), root.join("link.txt")).unwrap();

        txn.delete("link.txt").unwrap();

        assert_eq!(txn.written_paths().len(), 1);
        assert!(root.join("a.txt").exists());
        finish(&mut txn);
    }

    #[test]
    fn read_to_string_rejects_invalid_utf8() {
        let (_dir, mut txn) = create_txn();
        txn.write("bin", [0xff, 0xfe]).unwrap();
        assert!(matches!(txn.read_to_string("bin"), Err(CoreError::Io(_))));
        finish(&mut txn);
    }

    #[test]
    fn cannot_write_after_commit() {
        let (_dir, mut txn) = create_txn();
        txn.set_state(TransactionState::Committed);

        let result = txn.write("a.txt", "x");
        assert!(matches!(result, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn cannot_read_after_rollback() {
        let (_dir, mut txn) = create_txn();
        txn.set_state(TransactionState::RolledBack);
        assert!(txn.read("a.txt").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!TransactionState::Active.is_terminal());
        assert!(!TransactionState::Committing.is_terminal());
        assert!(TransactionState::Committed.is_terminal());
        assert!(TransactionState::RolledBack.is_terminal());
        assert!(TransactionState::Failed.is_terminal());
    }
}
