//! # snaptx Core
//!
//! Transactions over a plain file tree, fenced by volume snapshots.
//!
//! This crate provides:
//! - Content fingerprints for files ([`fingerprint`])
//! - A file store confined to a root directory ([`FileStore`])
//! - Baseline capture and commit-time conflict detection ([`ConflictDetector`])
//! - The transaction manager ([`TransactionManager`])
//!
//! ## How a transaction works
//!
//! 1. `begin` snapshots the volume and hashes every file under the root.
//! 2. Reads, writes and deletes go straight to the live tree; writes and
//!    deletes are remembered as the transaction's own changes.
//! 3. `commit` re-hashes the baseline files. If any file the transaction did
//!    not touch itself changed or vanished, the whole volume is rolled back to
//!    the snapshot and the commit fails with a conflict. Otherwise the
//!    snapshot is destroyed and the writes stand.
//!
//! ## Known limitations
//!
//! - Rollback is **volume-wide**: it also reverts changes other transactions
//!   committed after this transaction's snapshot was taken.
//! - Files created by other actors after `begin` are not checked; only paths
//!   present in the baseline can conflict.
//! - Every `begin` and `commit` walks and hashes the whole tree.
//!
//! ## Example
//!
//! ```rust
//! use snaptx_core::{Config, TransactionManager};
//! use snaptx_volume::InMemoryProvider;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let provider = Arc::new(InMemoryProvider::new(dir.path()));
//! let tm = TransactionManager::open(dir.path(), Config::default(), provider).unwrap();
//!
//! let mut txn = tm.begin().unwrap();
//! txn.write("hello.txt", "Hello, snapshots!").unwrap();
//! tm.commit(&mut txn).unwrap();
//!
//! assert_eq!(tm.store().read("hello.txt").unwrap(), b"Hello, snapshots!");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod error;
mod hash;
mod store;
mod transaction;
mod types;

pub use config::Config;
pub use conflict::{Baseline, Conflict, ConflictDetector, ConflictReport};
pub use error::{CoreError, CoreResult};
pub use hash::{fingerprint, fingerprint_file, ContentHash};
pub use store::FileStore;
pub use transaction::{Transaction, TransactionGuard, TransactionManager, TransactionState};
pub use types::TransactionId;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
