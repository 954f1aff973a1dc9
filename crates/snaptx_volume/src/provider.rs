//! Snapshot provider trait definition.

use crate::error::{SnapshotError, SnapshotResult};
use std::fmt;

/// Longest snapshot name accepted by [`validate_snapshot_name`].
const MAX_NAME_LEN: usize = 200;

/// A handle to a snapshot that exists on some volume.
///
/// Handles are returned by [`SnapshotProvider::create_snapshot`] and passed
/// back to `rollback`/`destroy_snapshot`. They carry no state of their own;
/// the provider remains the source of truth for whether the snapshot exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotHandle {
    dataset: String,
    name: String,
}

impl SnapshotHandle {
    /// Creates a handle for `name` on `dataset`.
    #[must_use]
    pub fn new(dataset: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            name: name.into(),
        }
    }

    /// Returns the dataset (volume) identifier.
    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Returns the snapshot name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SnapshotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.dataset, self.name)
    }
}

/// A volume that can freeze, revert and release point-in-time images.
///
/// # Invariants
///
/// - `create_snapshot` captures the whole volume at one instant
/// - `rollback` reverts **every** file on the volume to the captured image,
///   including changes made by actors unrelated to the snapshot's owner
/// - Rolling back to a snapshot discards any snapshots created after it
/// - `destroy_snapshot` releases the image and leaves the live volume as is
/// - Each operation either completes or fails; there is no partial effect
///
/// # Implementors
///
/// - [`super::ZfsProvider`] - For ZFS datasets
/// - [`super::InMemoryProvider`] - For testing
pub trait SnapshotProvider: Send + Sync {
    /// Freezes the current state of the volume under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `name` is invalid or already in use
    /// - The underlying volume manager fails
    fn create_snapshot(&self, name: &str) -> SnapshotResult<SnapshotHandle>;

    /// Reverts the entire volume to the state captured by `handle`.
    ///
    /// Snapshots newer than `handle` are destroyed as part of the rollback.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not exist or the volume manager
    /// fails.
    fn rollback(&self, handle: &SnapshotHandle) -> SnapshotResult<()>;

    /// Releases the image captured by `handle`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not exist or the volume manager
    /// fails.
    fn destroy_snapshot(&self, handle: &SnapshotHandle) -> SnapshotResult<()>;
}

/// Checks that `name` is usable as a snapshot name on every provider.
///
/// Names must be non-empty, at most 200 bytes, and consist of ASCII
/// alphanumerics plus `_`, `-`, `.` and `:`.
///
/// # Errors
///
/// Returns [`SnapshotError::InvalidName`] describing the first problem found.
pub fn validate_snapshot_name(name: &str) -> SnapshotResult<()> {
    if name.is_empty() {
        return Err(SnapshotError::invalid_name(name, "name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(SnapshotError::invalid_name(
            name,
            format!("name is longer than {MAX_NAME_LEN} bytes"),
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
    {
        return Err(SnapshotError::invalid_name(
            name,
            format!("character {c:?} is not allowed"),
        ));
    }
    Ok(())
}
