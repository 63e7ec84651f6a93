//! GeneBank - A disk-resident B-tree of DNA subsequence frequencies.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            GeneBank                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Input Layer (genbank/)                      │   │
//! │  │    .gbk parser → subsequence counter → 2-bit codec       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │     BTree: search + insert with proactive splits         │   │
//! │  │     Validation: structure walk + height bound            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   NodeStore + StoreHeader + Node codec + Statistics      │   │
//! │  │   [header 20B][node 0][node 1]...  fixed-size records    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (NodeAddress, Error, config)
//! - [`storage`] - File layout and node I/O
//! - [`index`] - The B-tree and its checks
//! - [`genbank`] - GenBank parsing, sequence encoding, file naming
//!
//! # Quick Start
//! ```no_run
//! use genebank::{BTree, BTreeConfig};
//! use genebank::genbank::sequence;
//!
//! let mut tree = BTree::open_or_create("sample.gbk.btree.data.4.2", BTreeConfig::new(4, 2))?;
//! let key = sequence::encode("gatc")?;
//! tree.insert(key)?;
//! assert_eq!(tree.search(key)?.map(|e| e.frequency), Some(1));
//! # Ok::<(), genebank::Error>(())
//! ```

pub mod common;
pub mod genbank;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::{BTreeConfig, Error, NodeAddress, Result};

pub use index::btree::{BTree, HeightReport, StructureReport, Violation, ViolationKind};
pub use storage::{Entry, Node, NodeStore, StatsSnapshot, StoreStats};
