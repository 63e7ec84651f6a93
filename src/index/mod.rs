//! Index structures.
//!
//! - [`btree`] - Disk-resident B-tree with insert-or-increment semantics

pub mod btree;
