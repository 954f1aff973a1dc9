//! # snaptx Volume
//!
//! Snapshot providers for snaptx.
//!
//! This crate is the lowest layer of snaptx: it knows how to freeze, revert
//! and release a point-in-time image of an entire volume. Providers are
//! **volume-wide** - they know nothing about transactions, hashes or which
//! files a caller touched.
//!
//! ## Design Principles
//!
//! - Providers expose exactly three operations (create, rollback, destroy)
//! - Each operation is atomic from the caller's point of view
//! - Rolling back reverts every file on the volume, not just some of them
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Providers
//!
//! - [`ZfsProvider`] - Drives `zfs snapshot`/`rollback`/`destroy`
//! - [`InMemoryProvider`] - Keeps tree images in memory, for tests and hosts
//!   without a copy-on-write filesystem
//!
//! ## Example
//!
//! ```rust
//! use snaptx_volume::{InMemoryProvider, SnapshotProvider};
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("a.txt"), b"before").unwrap();
//!
//! let provider = InMemoryProvider::new(dir.path());
//! let handle = provider.create_snapshot("s1").unwrap();
//! std::fs::write(dir.path().join("a.txt"), b"after").unwrap();
//!
//! provider.rollback(&handle).unwrap();
//! assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"before");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod provider;
mod zfs;

pub use error::{SnapshotError, SnapshotResult};
pub use memory::InMemoryProvider;
pub use provider::{validate_snapshot_name, SnapshotHandle, SnapshotProvider};
pub use zfs::{ZfsConfig, ZfsProvider};
