//! Baseline capture and commit-time conflict detection.
//!
//! This is read-set validation in the optimistic concurrency control sense:
//! instead of locking files while a transaction runs, every file's
//! fingerprint is recorded at `begin` and compared again at `commit`.
//!
//! Only paths present in the baseline are compared. A file created by
//! someone else after `begin` is invisible to the check.

use crate::error::CoreResult;
use crate::hash::{fingerprint_file, ContentHash};
use crate::types::TransactionId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Fingerprints of every regular file under the root, frozen at `begin`.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    entries: HashMap<PathBuf, ContentHash>,
}

impl Baseline {
    /// Returns the number of files in the baseline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the baseline holds no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the recorded fingerprint for an absolute path.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&ContentHash> {
        self.entries.get(path)
    }

    /// Iterates over `(absolute path, fingerprint)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &ContentHash)> {
        self.entries.iter()
    }
}

/// A single reason a commit cannot stand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// Someone else changed the file's content.
    Modified {
        /// Absolute path of the file.
        path: PathBuf,
        /// Fingerprint recorded at `begin`.
        expected: ContentHash,
        /// Fingerprint found at `commit`.
        actual: ContentHash,
    },
    /// Someone else deleted the file.
    Deleted {
        /// Absolute path of the file.
        path: PathBuf,
    },
    /// Another transaction's rollback reverted the volume past this
    /// transaction's snapshot, undoing its writes.
    Reverted {
        /// The transaction whose rollback did it.
        by: TransactionId,
    },
}

impl Conflict {
    /// Returns the conflicting path, if the conflict concerns one file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Modified { path, .. } | Self::Deleted { path } => Some(path),
            Self::Reverted { .. } => None,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modified { path, .. } => write!(f, "modified {}", path.display()),
            Self::Deleted { path } => write!(f, "deleted {}", path.display()),
            Self::Reverted { by } => write!(f, "reverted by rollback of {by}"),
        }
    }
}

/// Everything that conflicted for one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    conflicts: Vec<Conflict>,
}

impl ConflictReport {
    /// Creates a report for a transaction reverted by another's rollback.
    #[must_use]
    pub fn reverted(by: TransactionId) -> Self {
        Self {
            conflicts: vec![Conflict::Reverted { by }],
        }
    }

    /// Returns true if nothing conflicted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Returns the number of conflicts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Returns the conflicts, sorted by path.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Returns the paths involved in file-level conflicts.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.conflicts.iter().filter_map(Conflict::path)
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.conflicts.len() {
            0 => write!(f, "no conflicts"),
            1 => write!(f, "{}", self.conflicts[0]),
            n => {
                write!(f, "{n} conflicts: ")?;
                for (i, conflict) in self.conflicts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{conflict}")?;
                }
                Ok(())
            }
        }
    }
}

/// Walks a tree to capture baselines and to validate them at commit.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    root: PathBuf,
    #[cfg(test)]
    fail_capture: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl ConflictDetector {
    /// Creates a detector for the tree at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            #[cfg(test)]
            fail_capture: std::sync::Arc::default(),
        }
    }

    /// Makes every later baseline capture fail with an I/O error.
    #[cfg(test)]
    pub(crate) fn inject_capture_failure(&self, fail: bool) {
        self.fail_capture.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hashes every regular file under the root.
    ///
    /// Symlinks are not followed. A file removed between being listed and
    /// being hashed is left out, as if the walk had started a moment later.
    ///
    /// # Errors
    ///
    /// Returns any other walk or read error.
    pub fn capture_baseline(&self) -> CoreResult<Baseline> {
        #[cfg(test)]
        if self.fail_capture.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "injected capture failure",
            )
            .into());
        }
        let mut entries = HashMap::new();
        for entry in WalkDir::new(&self.root).follow_links(false).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(io::Error::from(e).into()),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match fingerprint_file(entry.path()) {
                Ok(hash) => {
                    entries.insert(entry.into_path(), hash);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Baseline { entries })
    }

    /// Compares the current tree against `baseline`.
    ///
    /// Paths in `written` belong to the committing transaction and never
    /// conflict, whatever their content. Every other baseline path conflicts
    /// if its content changed or it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns any read error other than the file being gone.
    pub fn detect(
        &self,
        baseline: &Baseline,
        written: &HashSet<PathBuf>,
    ) -> CoreResult<ConflictReport> {
        let mut conflicts = Vec::new();
        for (path, expected) in baseline.iter() {
            if written.contains(path) {
                continue;
            }
            match fingerprint_file(path) {
                Ok(actual) if actual == *expected => {}
                Ok(actual) => conflicts.push(Conflict::Modified {
                    path: path.clone(),
                    expected: *expected,
                    actual,
                }),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    conflicts.push(Conflict::Deleted { path: path.clone() });
                }
                Err(e) => return Err(e.into()),
            }
        }
        conflicts.sort_by(|a, b| a.path().cmp(&b.path()));
        Ok(ConflictReport { conflicts })
    }
}

fn is_not_found(error: &walkdir::Error) -> bool {
    error
        .io_error()
        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
}
