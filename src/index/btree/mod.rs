//! B-tree index over fixed-width `u64` keys.
//!
//! - [`BTree`] - Search, insert-or-increment, split and dump
//! - [`validate`] - Structure and height checks producing reports
//!
//! Node identity is a [`NodeAddress`](crate::NodeAddress) into the
//! [`NodeStore`](crate::storage::NodeStore); nodes are read, changed and
//! written back within a single operation.

mod tree;
pub mod validate;

pub use tree::BTree;
pub use validate::{predicted_height, HeightReport, StructureReport, Violation, ViolationKind};
