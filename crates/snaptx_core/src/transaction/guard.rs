//! Scope guard that rolls a transaction back unless it finished.

use crate::error::CoreResult;
use crate::transaction::manager::TransactionManager;
use crate::transaction::state::Transaction;
use std::ops::{Deref, DerefMut};

/// A transaction bound to its manager.
///
/// Dropping the guard while the transaction is still active rolls it back,
/// including during a panic. Obtained from
/// [`TransactionManager::begin_guarded`].
pub struct TransactionGuard<'a> {
    manager: &'a TransactionManager,
    txn: Transaction,
}

impl<'a> TransactionGuard<'a> {
    pub(crate) fn new(manager: &'a TransactionManager, txn: Transaction) -> Self {
        Self { manager, txn }
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// As [`TransactionManager::commit`].
    pub fn commit(mut self) -> CoreResult<()> {
        self.manager.commit(&mut self.txn)
    }

    /// Rolls the transaction back.
    ///
    /// # Errors
    ///
    /// As [`TransactionManager::rollback`].
    pub fn rollback(mut self) -> CoreResult<()> {
        self.manager.rollback(&mut self.txn)
    }
}

impl Deref for TransactionGuard<'_> {
    type Target = Transaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}

impl DerefMut for TransactionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.txn
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.txn.is_active() {
            return;
        }
        tracing::warn!(txid = %self.txn.id(), "transaction guard dropped while active; rolling back");
        if let Err(e) = self.manager.rollback(&mut self.txn) {
            tracing::warn!(txid = %self.txn.id(), error = %e, "rollback on drop failed");
        }
    }
}

impl std::fmt::Debug for TransactionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("txn", &self.txn)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::CoreError;
    use crate::transaction::manager::TransactionManager;
    use snaptx_volume::InMemoryProvider;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_manager() -> (TempDir, TransactionManager) {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(InMemoryProvider::new(dir.path()));
        let tm = TransactionManager::open(dir.path(), Config::default(), provider).unwrap();
        (dir, tm)
    }

    #[test]
    fn drop_rolls_back() {
        let (dir, tm) = create_manager();
        {
            let mut guard = tm.begin_guarded().unwrap();
            guard.write("a.txt", "abandoned").unwrap();
            assert_eq!(tm.active_count(), 1);
        }
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn commit_consumes_guard() {
        let (dir, tm) = create_manager();
        let mut guard = tm.begin_guarded().unwrap();
        guard.write("a.txt", "kept").unwrap();
        guard.commit().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "kept");
        assert_eq!(tm.active_count(), 0);
    }

    #[test]
    fn conflicting_commit_does_not_roll_back_twice() {
        let (dir, tm) = create_manager();
        fs::write(dir.path().join("a.txt"), "A").unwrap();

        let guard = tm.begin_guarded().unwrap();
        fs::write(dir.path().join("a.txt"), "B").unwrap();

        assert!(matches!(guard.commit(), Err(CoreError::Conflict { .. })));
        assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "A");
    }

    #[test]
    fn panic_rolls_back() {
        let (dir, tm) = create_manager();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut guard = tm.begin_guarded().unwrap();
            guard.write("a.txt", "never").unwrap();
            panic!("bail out");
        }));

        assert!(result.is_err());
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(tm.active_count(), 0);
    }
}
