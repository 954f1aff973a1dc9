//! # snaptx Testkit
//!
//! Test utilities for snaptx.
//!
//! This crate provides:
//! - Temporary transactional trees backed by the in-memory provider
//! - A snapshot provider with switchable fault injection
//! - Concurrent random-transaction stress runs
//!
//! ## Usage
//!
//! ```rust
//! use snaptx_testkit::prelude::*;
//!
//! with_temp_tree(|tree| {
//!     tree.write_raw("shared.txt", "A");
//!     let mut txn = tree.begin().unwrap();
//!     txn.write("mine.txt", "B").unwrap();
//!     tree.commit(&mut txn).unwrap();
//!     assert_eq!(tree.read_raw("mine.txt").as_deref(), Some("B"));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::stress::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use stress::*;
