//! Common types and utilities shared across genebank.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration ([`BTreeConfig`]) and format constants
//! - Error types
//! - Node addresses

mod address;
pub mod config;
pub mod error;

pub use address::NodeAddress;
pub use config::BTreeConfig;
pub use error::{Error, Result};
