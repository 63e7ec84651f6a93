//! Storage layer - the node file and its formats.
//!
//! This module handles persistent storage:
//! - [`NodeStore`] - Header validation, slot allocation, node I/O
//! - [`StoreHeader`] - The 20-byte file header
//! - [`Node`] / [`Entry`] - Node records and their byte layout
//! - [`StoreStats`] - I/O counters

mod header;
mod node;
mod node_store;
mod stats;

pub use header::StoreHeader;
pub use node::{Entry, Node};
pub use node_store::NodeStore;
pub use stats::{StatsSnapshot, StoreStats};
