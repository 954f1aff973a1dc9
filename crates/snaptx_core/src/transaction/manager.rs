//! Transaction manager.

use crate::config::Config;
use crate::conflict::{ConflictDetector, ConflictReport};
use crate::error::{CoreError, CoreResult};
use crate::store::FileStore;
use crate::transaction::guard::TransactionGuard;
use crate::transaction::state::{Transaction, TransactionState};
use crate::types::TransactionId;
use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use snaptx_volume::{validate_snapshot_name, SnapshotHandle, SnapshotProvider};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

/// A snapshot owned by an in-flight transaction.
#[derive(Debug)]
struct LiveSnapshot {
    txid: TransactionId,
    handle: SnapshotHandle,
}

/// Bookkeeping guarded by the decision lock.
#[derive(Debug, Default)]
pub(crate) struct SnapshotRegistry {
    /// Snapshots of in-flight transactions, oldest first.
    live: Vec<LiveSnapshot>,
    /// In-flight transactions whose snapshot another rollback discarded,
    /// mapped to the transaction that rolled back.
    reverted: HashMap<TransactionId, TransactionId>,
}

/// Shared handle to a manager's registry.
pub(crate) type SharedRegistry = Arc<Mutex<SnapshotRegistry>>;

impl SnapshotRegistry {
    fn forget(&mut self, txid: TransactionId) {
        self.live.retain(|s| s.txid != txid);
    }

    /// Drops every trace of a transaction whose owner gave it up unfinished.
    pub(crate) fn abandon(&mut self, txid: TransactionId) {
        self.forget(txid);
        self.reverted.remove(&txid);
    }

    /// Drops every snapshot newer than `txid`'s and marks its owner reverted.
    fn discard_after(&mut self, txid: TransactionId) -> Vec<TransactionId> {
        let Some(position) = self.live.iter().position(|s| s.txid == txid) else {
            return Vec::new();
        };
        let newer: Vec<_> = self.live.drain(position + 1..).map(|s| s.txid).collect();
        for victim in &newer {
            self.reverted.insert(*victim, txid);
        }
        newer
    }
}

/// The region in which snapshots are created, rolled back and destroyed.
///
/// Holding it excludes every other begin/commit/rollback of this manager
/// and, when a lock file is configured, of every other process using it.
struct DecisionRegion<'a> {
    registry: MutexGuard<'a, SnapshotRegistry>,
    lock_file: Option<&'a File>,
}

impl Drop for DecisionRegion<'_> {
    fn drop(&mut self) {
        if let Some(file) = self.lock_file {
            if let Err(e) = FileExt::unlock(file) {
                tracing::warn!(error = %e, "failed to release decision lock file");
            }
        }
    }
}

/// Coordinates snapshot-fenced transactions over one file tree.
///
/// The transaction manager provides:
/// - `begin`: snapshot the volume and fingerprint every file
/// - `commit`: keep the writes unless someone else touched the baseline
/// - `rollback`: revert the whole volume to the transaction's snapshot
///
/// ## Decision region
///
/// Reads and writes run freely on the caller's thread. Snapshot creation,
/// conflict detection and the keep-or-revert decision are serialized by a
/// single lock, so at most one rollback is in progress at a time.
///
/// ## Rollback blast radius
///
/// A rollback reverts the **entire** volume. Changes other transactions
/// committed after this transaction's snapshot are reverted too. In-flight
/// transactions whose snapshots are newer lose their snapshot and their
/// writes; the manager remembers them and fails their commit with a
/// [`crate::Conflict::Reverted`] conflict.
///
/// The manager holds no per-transaction state beyond that registry; each
/// [`Transaction`] is a value owned by the caller.
///
/// A plain transaction must be finished with `commit` or `rollback`.
/// Dropping one while active releases its registry entry but leaves its
/// snapshot on the volume; use [`TransactionManager::begin_guarded`] when the
/// owner may bail out early.
pub struct TransactionManager {
    config: Config,
    store: FileStore,
    detector: ConflictDetector,
    provider: Arc<dyn SnapshotProvider>,
    decision: SharedRegistry,
    lock_file: Option<File>,
}

impl TransactionManager {
    /// Opens a manager for the tree at `root`, snapshotted by `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The root does not exist and `create_root_if_missing` is false
    /// - The snapshot prefix is not a valid snapshot name
    /// - The lock file lies inside the root or cannot be opened
    pub fn open(
        root: &Path,
        config: Config,
        provider: Arc<dyn SnapshotProvider>,
    ) -> CoreResult<Self> {
        validate_snapshot_name(&config.snapshot_prefix).map_err(|e| {
            CoreError::invalid_config(format!("snapshot prefix: {e}"))
        })?;

        if config.create_root_if_missing && !root.exists() {
            fs::create_dir_all(root)?;
        }
        let store = FileStore::open(root)?;
        let detector = ConflictDetector::new(store.root());

        let lock_file = match &config.lock_path {
            Some(path) => Some(open_lock_file(path, store.root())?),
            None => None,
        };

        Ok(Self {
            config,
            store,
            detector,
            provider,
            decision: Arc::new(Mutex::new(SnapshotRegistry::default())),
            lock_file,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the file store for reads outside any transaction.
    #[must_use]
    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Returns the canonical root of the tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Begins a new transaction.
    ///
    /// Takes a snapshot of the volume, then fingerprints every file under the
    /// root. Both happen inside the decision region, so no other
    /// transaction's rollback can fall between them.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Snapshot`] if the snapshot cannot be created. If
    /// fingerprinting fails the new snapshot is destroyed before the error is
    /// returned.
    pub fn begin(&self) -> CoreResult<Transaction> {
        let txid = TransactionId::new();
        let name = txid.snapshot_name(&self.config.snapshot_prefix);

        let mut region = self.enter()?;
        let handle = self.provider.create_snapshot(&name)?;

        let baseline = match self.detector.capture_baseline() {
            Ok(baseline) => baseline,
            Err(e) => {
                if let Err(destroy) = self.provider.destroy_snapshot(&handle) {
                    tracing::warn!(
                        txid = %txid,
                        snapshot = %handle,
                        error = %destroy,
                        "failed to destroy snapshot after baseline error"
                    );
                }
                return Err(e);
            }
        };

        region.registry.live.push(LiveSnapshot {
            txid,
            handle: handle.clone(),
        });
        tracing::debug!(txid = %txid, snapshot = %handle, files = baseline.len(), "transaction begun");

        Ok(Transaction::new(
            txid,
            handle,
            baseline,
            self.store.clone(),
            Arc::downgrade(&self.decision),
        ))
    }

    /// Begins a transaction that rolls back if dropped while active.
    ///
    /// # Errors
    ///
    /// As [`TransactionManager::begin`].
    pub fn begin_guarded(&self) -> CoreResult<TransactionGuard<'_>> {
        Ok(TransactionGuard::new(self, self.begin()?))
    }

    /// Commits a transaction.
    ///
    /// If no file outside the transaction's own writes changed since
    /// `begin`, the snapshot is destroyed and the writes stand. Otherwise the
    /// volume is rolled back to the snapshot and [`CoreError::Conflict`] is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidState`] if the transaction is not active
    /// - [`CoreError::Conflict`] if a conflict was detected (already rolled back)
    /// - [`CoreError::Expired`] if the transaction outlived its timeout
    ///   (already rolled back)
    /// - [`CoreError::Snapshot`] if the provider failed; the transaction
    ///   ends in [`TransactionState::Failed`]
    /// - An I/O error if the tree could not be re-read; the transaction
    ///   stays active and may be rolled back
    pub fn commit(&self, txn: &mut Transaction) -> CoreResult<()> {
        txn.ensure_active()?;
        let txid = txn.id();

        let mut region = self.enter()?;
        txn.set_state(TransactionState::Committing);

        if let Some(by) = region.registry.reverted.remove(&txid) {
            txn.set_state(TransactionState::RolledBack);
            tracing::warn!(txid = %txid, by = %by, "transaction was reverted by an earlier rollback");
            return Err(CoreError::Conflict {
                txid,
                report: ConflictReport::reverted(by),
            });
        }

        if let Some(timeout) = self.config.transaction_timeout {
            let elapsed = txn.elapsed();
            if elapsed > timeout {
                tracing::warn!(txid = %txid, ?elapsed, "transaction expired; rolling back");
                self.rollback_locked(&mut region, txn)?;
                return Err(CoreError::Expired { txid, elapsed });
            }
        }

        let report = match self.detector.detect(txn.baseline(), txn.written_paths()) {
            Ok(report) => report,
            Err(e) => {
                txn.set_state(TransactionState::Active);
                return Err(e);
            }
        };

        if !report.is_empty() {
            tracing::warn!(txid = %txid, conflicts = %report, "conflict detected; rolling back");
            self.rollback_locked(&mut region, txn)?;
            return Err(CoreError::Conflict { txid, report });
        }

        let destroyed = self.provider.destroy_snapshot(txn.snapshot());
        region.registry.forget(txid);
        match destroyed {
            Ok(()) => {
                txn.set_state(TransactionState::Committed);
                tracing::debug!(txid = %txid, writes = txn.written_paths().len(), "transaction committed");
                Ok(())
            }
            Err(e) => {
                txn.set_state(TransactionState::Failed);
                Err(e.into())
            }
        }
    }

    /// Abandons a transaction, reverting the whole volume to its snapshot.
    ///
    /// If another transaction's rollback already reverted the volume past
    /// this transaction's snapshot, there is nothing left to undo and this
    /// only marks the transaction rolled back.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidState`] if the transaction is not active
    /// - [`CoreError::Snapshot`] if the provider failed; the transaction
    ///   ends in [`TransactionState::Failed`]
    pub fn rollback(&self, txn: &mut Transaction) -> CoreResult<()> {
        txn.ensure_active()?;
        let mut region = self.enter()?;

        if region.registry.reverted.remove(&txn.id()).is_some() {
            txn.set_state(TransactionState::RolledBack);
            return Ok(());
        }
        self.rollback_locked(&mut region, txn)
    }

    /// Executes a function within a transaction.
    ///
    /// If the function returns `Ok`, the transaction is committed.
    /// If it returns `Err` or panics, the transaction is rolled back.
    ///
    /// # Errors
    ///
    /// Returns the function's error, or any error from begin/commit. A
    /// failed rollback takes precedence over the function's error.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let mut guard = self.begin_guarded()?;
        match f(&mut *guard) {
            Ok(value) => {
                guard.commit()?;
                Ok(value)
            }
            Err(e) => {
                if guard.is_active() {
                    if let Err(rollback) = guard.rollback() {
                        tracing::warn!(error = %e, "rollback failed after transaction error");
                        return Err(rollback);
                    }
                }
                Err(e)
            }
        }
    }

    /// Returns the number of transactions that hold a live snapshot.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.decision.lock().live.len()
    }

    /// Returns the live snapshots of in-flight transactions, oldest first.
    #[must_use]
    pub fn live_snapshots(&self) -> Vec<SnapshotHandle> {
        self.decision
            .lock()
            .live
            .iter()
            .map(|s| s.handle.clone())
            .collect()
    }

    fn enter(&self) -> CoreResult<DecisionRegion<'_>> {
        let registry = self.decision.lock();
        if let Some(file) = &self.lock_file {
            file.lock_exclusive()?;
        }
        Ok(DecisionRegion {
            registry,
            lock_file: self.lock_file.as_ref(),
        })
    }

    fn rollback_locked(
        &self,
        region: &mut DecisionRegion<'_>,
        txn: &mut Transaction,
    ) -> CoreResult<()> {
        let txid = txn.id();

        if let Err(e) = self.provider.rollback(txn.snapshot()) {
            region.registry.forget(txid);
            txn.set_state(TransactionState::Failed);
            return Err(e.into());
        }

        let reverted = region.registry.discard_after(txid);
        if !reverted.is_empty() {
            tracing::warn!(
                txid = %txid,
                reverted = reverted.len(),
                "rollback discarded snapshots of in-flight transactions"
            );
        }

        let destroyed = self.provider.destroy_snapshot(txn.snapshot());
        region.registry.forget(txid);
        match destroyed {
            Ok(()) => {
                txn.set_state(TransactionState::RolledBack);
                tracing::debug!(txid = %txid, "transaction rolled back");
                Ok(())
            }
            Err(e) => {
                txn.set_state(TransactionState::Failed);
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("root", &self.store.root())
            .field("active_count", &self.active_count())
            .finish_non_exhaustive()
    }
}

fn open_lock_file(path: &Path, root: &Path) -> CoreResult<File> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.canonicalize()?,
        _ => std::env::current_dir()?,
    };
    if parent.starts_with(root) {
        return Err(CoreError::invalid_config(format!(
            "lock file {} must be outside the root {}",
            path.display(),
            root.display()
        )));
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::Conflict;
    use snaptx_volume::InMemoryProvider;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_manager() -> (TempDir, Arc<InMemoryProvider>, TransactionManager) {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(InMemoryProvider::new(dir.path()));
        let tm = TransactionManager::open(dir.path(), Config::default(), provider.clone()).unwrap();
        (dir, provider, tm)
    }

    fn write_raw(tm: &TransactionManager, name: &str, content: &str) {
        fs::write(tm.root().join(name), content).unwrap();
    }

    fn read_raw(tm: &TransactionManager, name: &str) -> Option<String> {
        fs::read_to_string(tm.root().join(name)).ok()
    }

    #[test]
    fn begin_creates_snapshot_and_baseline() {
        let (_dir, provider, tm) = create_manager();
        write_raw(&tm, "a.txt", "A");

        let mut txn = tm.begin().unwrap();
        assert!(txn.is_active());
        assert_eq!(txn.baseline().len(), 1);
        assert_eq!(tm.active_count(), 1);
        assert_eq!(provider.snapshot_names(), vec![txn.snapshot().name().to_string()]);
        assert!(txn.snapshot().name().starts_with("snaptx_"));

        tm.rollback(&mut txn).unwrap();
    }

    #[test]
    fn baseline_failure_destroys_snapshot() {
        let (_dir, provider, tm) = create_manager();
        write_raw(&tm, "a.txt", "A");
        tm.detector.inject_capture_failure(true);

        let err = tm.begin().unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
        assert!(provider.snapshot_names().is_empty());
        assert_eq!(tm.active_count(), 0);

        tm.detector.inject_capture_failure(false);
        let mut txn = tm.begin().unwrap();
        assert_eq!(provider.snapshot_names().len(), 1);
        tm.commit(&mut txn).unwrap();
    }

    #[test]
    fn dropped_transaction_releases_registry_entry() {
        let (_dir, _provider, tm) = create_manager();
        let txn = tm.begin().unwrap();
        assert_eq!(tm.active_count(), 1);

        drop(txn);
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn dropped_reverted_transaction_leaves_no_trace() {
        let (_dir, _provider, tm) = create_manager();
        let mut older = tm.begin().unwrap();
        let newer = tm.begin().unwrap();
        tm.rollback(&mut older).unwrap();
        assert_eq!(tm.decision.lock().reverted.len(), 1);

        drop(newer);
        assert!(tm.decision.lock().reverted.is_empty());
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn transaction_outliving_manager_drops_quietly() {
        let (_dir, _provider, tm) = create_manager();
        let txn = tm.begin().unwrap();
        drop(tm);
        drop(txn);
    }

    #[test]
    fn commit_empty_transaction() {
        let (_dir, provider, tm) = create_manager();
        let mut txn = tm.begin().unwrap();
        tm.commit(&mut txn).unwrap();

        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(tm.active_count(), 0);
        assert!(provider.snapshot_names().is_empty());
    }

    #[test]
    fn commit_keeps_own_writes() {
        let (_dir, _provider, tm) = create_manager();
        write_raw(&tm, "a.txt", "old");

        let mut txn = tm.begin().unwrap();
        txn.write("a.txt", "new").unwrap();
        txn.write("b.txt", "created").unwrap();
        tm.commit(&mut txn).unwrap();

        assert_eq!(read_raw(&tm, "a.txt").as_deref(), Some("new"));
        assert_eq!(read_raw(&tm, "b.txt").as_deref(), Some("created"));
    }

    #[test]
    fn commit_keeps_own_delete() {
        let (_dir, _provider, tm) = create_manager();
        write_raw(&tm, "a.txt", "doomed");

        let mut txn = tm.begin().unwrap();
        txn.delete("a.txt").unwrap();
        tm.commit(&mut txn).unwrap();

        assert!(read_raw(&tm, "a.txt").is_none());
    }

    #[test]
    fn external_change_conflicts_and_rolls_back() {
        let (_dir, provider, tm) = create_manager();
        write_raw(&tm, "shared.txt", "A");

        let mut txn = tm.begin().unwrap();
        txn.write("mine.txt", "written").unwrap();
        write_raw(&tm, "shared.txt", "B");

        let err = tm.commit(&mut txn).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(txn.state(), TransactionState::RolledBack);
        assert_eq!(read_raw(&tm, "shared.txt").as_deref(), Some("A"));
        assert!(read_raw(&tm, "mine.txt").is_none());
        assert!(provider.snapshot_names().is_empty());
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn external_delete_conflicts() {
        let (_dir, _provider, tm) = create_manager();
        write_raw(&tm, "shared.txt", "A");

        let mut txn = tm.begin().unwrap();
        fs::remove_file(tm.root().join("shared.txt")).unwrap();

        match tm.commit(&mut txn) {
            Err(CoreError::Conflict { report, .. }) => {
                assert!(matches!(report.conflicts(), [Conflict::Deleted { .. }]));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(read_raw(&tm, "shared.txt").as_deref(), Some("A"));
    }

    #[test]
    fn explicit_rollback_reverts_writes() {
        let (_dir, provider, tm) = create_manager();
        write_raw(&tm, "a.txt", "original");

        let mut txn = tm.begin().unwrap();
        txn.write("a.txt", "scratch").unwrap();
        tm.rollback(&mut txn).unwrap();

        assert_eq!(txn.state(), TransactionState::RolledBack);
        assert_eq!(read_raw(&tm, "a.txt").as_deref(), Some("original"));
        assert!(provider.snapshot_names().is_empty());
    }

    #[test]
    fn cannot_commit_twice() {
        let (_dir, _provider, tm) = create_manager();
        let mut txn = tm.begin().unwrap();
        tm.commit(&mut txn).unwrap();

        let result = tm.commit(&mut txn);
        assert!(matches!(result, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn cannot_rollback_after_commit() {
        let (_dir, _provider, tm) = create_manager();
        let mut txn = tm.begin().unwrap();
        tm.commit(&mut txn).unwrap();

        assert!(matches!(
            tm.rollback(&mut txn),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn cannot_commit_after_conflict() {
        let (_dir, _provider, tm) = create_manager();
        write_raw(&tm, "a.txt", "A");
        let mut txn = tm.begin().unwrap();
        write_raw(&tm, "a.txt", "B");
        assert!(tm.commit(&mut txn).is_err());

        assert!(matches!(
            tm.commit(&mut txn),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[test]
    fn rollback_reverts_transactions_committed_after_snapshot() {
        let (_dir, _provider, tm) = create_manager();
        write_raw(&tm, "p.txt", "p0");
        write_raw(&tm, "q.txt", "q0");

        let mut first = tm.begin().unwrap();

        let mut second = tm.begin().unwrap();
        second.write("q.txt", "q1").unwrap();
        tm.commit(&mut second).unwrap();
        assert_eq!(read_raw(&tm, "q.txt").as_deref(), Some("q1"));

        // `first` baselined q.txt as q0, so its commit conflicts and the
        // volume-wide rollback takes q.txt back to q0 as well.
        let err = tm.commit(&mut first).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(read_raw(&tm, "q.txt").as_deref(), Some("q0"));
    }

    #[test]
    fn rollback_marks_newer_in_flight_transactions_reverted() {
        let (_dir, provider, tm) = create_manager();

        let mut older = tm.begin().unwrap();
        let mut newer = tm.begin().unwrap();
        newer.write("newer.txt", "lost").unwrap();

        tm.rollback(&mut older).unwrap();
        assert!(read_raw(&tm, "newer.txt").is_none());
        assert!(provider.snapshot_names().is_empty());
        assert_eq!(tm.active_count(), 0);

        match tm.commit(&mut newer) {
            Err(CoreError::Conflict { report, .. }) => {
                assert_eq!(report.conflicts(), &[Conflict::Reverted { by: older.id() }]);
            }
            other => panic!("expected reverted conflict, got {other:?}"),
        }
        assert_eq!(newer.state(), TransactionState::RolledBack);
    }

    #[test]
    fn rollback_of_reverted_transaction_needs_no_provider() {
        let (_dir, _provider, tm) = create_manager();
        let mut older = tm.begin().unwrap();
        let mut newer = tm.begin().unwrap();
        tm.rollback(&mut older).unwrap();

        tm.rollback(&mut newer).unwrap();
        assert_eq!(newer.state(), TransactionState::RolledBack);
    }

    #[test]
    fn newer_transaction_commit_leaves_older_snapshot() {
        let (_dir, provider, tm) = create_manager();
        let mut older = tm.begin().unwrap();
        let mut newer = tm.begin().unwrap();

        tm.commit(&mut newer).unwrap();
        assert_eq!(provider.snapshot_names(), vec![older.snapshot().name().to_string()]);

        tm.commit(&mut older).unwrap();
        assert!(provider.snapshot_names().is_empty());
    }

    #[test]
    fn expired_transaction_is_rolled_back() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(InMemoryProvider::new(dir.path()));
        let config = Config::new().transaction_timeout(Duration::from_millis(1));
        let tm = TransactionManager::open(dir.path(), config, provider).unwrap();

        let mut txn = tm.begin().unwrap();
        txn.write("late.txt", "too slow").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let err = tm.commit(&mut txn).unwrap_err();
        assert!(matches!(err, CoreError::Expired { .. }));
        assert_eq!(txn.state(), TransactionState::RolledBack);
        assert!(!tm.root().join("late.txt").exists());
    }

    #[test]
    fn closure_commits_on_ok() {
        let (_dir, _provider, tm) = create_manager();
        let value = tm
            .transaction(|txn| {
                txn.write("a.txt", "from closure")?;
                Ok(42)
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(read_raw(&tm, "a.txt").as_deref(), Some("from closure"));
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn closure_rolls_back_on_err() {
        let (_dir, _provider, tm) = create_manager();
        let result: CoreResult<()> = tm.transaction(|txn| {
            txn.write("a.txt", "discarded")?;
            txn.read("missing.txt")?;
            Ok(())
        });

        assert!(matches!(result, Err(CoreError::NotFound { .. })));
        assert!(read_raw(&tm, "a.txt").is_none());
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn snapshot_names_are_unique() {
        let (_dir, _provider, tm) = create_manager();
        let mut a = tm.begin().unwrap();
        let mut b = tm.begin().unwrap();
        assert_ne!(a.snapshot().name(), b.snapshot().name());
        tm.commit(&mut b).unwrap();
        tm.commit(&mut a).unwrap();
    }

    #[test]
    fn invalid_prefix_rejected() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(InMemoryProvider::new(dir.path()));
        let result = TransactionManager::open(
            dir.path(),
            Config::new().snapshot_prefix("bad prefix"),
            provider,
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn missing_root_created_on_request() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("tree");
        let provider = Arc::new(InMemoryProvider::new(&root));

        assert!(TransactionManager::open(&root, Config::default(), provider.clone()).is_err());
        let tm = TransactionManager::open(&root, Config::new().create_root_if_missing(true), provider)
            .unwrap();
        assert!(tm.root().is_dir());
    }

    #[test]
    fn lock_file_inside_root_rejected() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(InMemoryProvider::new(dir.path()));
        let config = Config::new().lock_path(dir.path().join("LOCK"));
        let result = TransactionManager::open(dir.path(), config, provider);
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn lock_file_serializes_decisions() {
        let dir = TempDir::new().unwrap();
        let lock_dir = TempDir::new().unwrap();
        let provider = Arc::new(InMemoryProvider::new(dir.path()));
        let config = Config::new().lock_path(lock_dir.path().join("snaptx.lock"));
        let tm = TransactionManager::open(dir.path(), config, provider).unwrap();

        let mut txn = tm.begin().unwrap();
        txn.write("a.txt", "locked").unwrap();
        tm.commit(&mut txn).unwrap();
        assert!(lock_dir.path().join("snaptx.lock").exists());
    }
}
