//! Snapshot-fenced transactions.
//!
//! - **Atomicity**: a transaction's writes stand together or the volume is
//!   reverted to its snapshot
//! - **Isolation**: optimistic; conflicts are detected at commit by content
//!   fingerprints
//! - **Decision**: begin, commit and rollback decisions are serialized

mod guard;
mod manager;
mod state;

pub use guard::TransactionGuard;
pub use manager::TransactionManager;
pub use state::{Transaction, TransactionState};
