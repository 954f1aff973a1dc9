//! Fault injection for snapshot providers.
//!
//! Wraps an [`InMemoryProvider`] and fails chosen operations on demand, so
//! tests can drive the manager down its fatal-error paths.

use parking_lot::Mutex;
use snaptx_volume::{
    InMemoryProvider, SnapshotError, SnapshotHandle, SnapshotProvider, SnapshotResult,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A provider operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    /// `create_snapshot`.
    Create,
    /// `rollback`.
    Rollback,
    /// `destroy_snapshot`.
    Destroy,
}

impl FaultOp {
    fn verb(self) -> &'static str {
        match self {
            Self::Create => "snapshot",
            Self::Rollback => "rollback",
            Self::Destroy => "destroy",
        }
    }
}

/// An in-memory provider whose operations fail while switched off.
#[derive(Debug)]
pub struct FaultyProvider {
    inner: InMemoryProvider,
    failing: Mutex<HashSet<FaultOp>>,
    calls: Mutex<HashMap<FaultOp, usize>>,
}

impl FaultyProvider {
    /// Creates a healthy provider for the tree at `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            inner: InMemoryProvider::new(root),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Makes every later call of `op` fail.
    pub fn fail(&self, op: FaultOp) {
        self.failing.lock().insert(op);
    }

    /// Makes `op` succeed again.
    pub fn heal(&self, op: FaultOp) {
        self.failing.lock().remove(&op);
    }

    /// Returns how many times `op` was called, failed calls included.
    pub fn calls(&self, op: FaultOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    /// Returns the names of live snapshots, oldest first.
    pub fn snapshot_names(&self) -> Vec<String> {
        self.inner.snapshot_names()
    }

    fn check(&self, op: FaultOp, target: &str) -> SnapshotResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if self.failing.lock().contains(&op) {
            return Err(SnapshotError::CommandFailed {
                command: format!("faulty {} {target}", op.verb()),
                status: Some(1),
                stderr: "injected fault".to_string(),
            });
        }
        Ok(())
    }
}

impl SnapshotProvider for FaultyProvider {
    fn create_snapshot(&self, name: &str) -> SnapshotResult<SnapshotHandle> {
        self.check(FaultOp::Create, name)?;
        self.inner.create_snapshot(name)
    }

    fn rollback(&self, handle: &SnapshotHandle) -> SnapshotResult<()> {
        self.check(FaultOp::Rollback, handle.name())?;
        self.inner.rollback(handle)
    }

    fn destroy_snapshot(&self, handle: &SnapshotHandle) -> SnapshotResult<()> {
        self.check(FaultOp::Destroy, handle.name())?;
        self.inner.destroy_snapshot(handle)
    }
}
