//! Error types for genebank.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in genebank.
///
/// A search miss is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the backing store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store header was written with a different `k` or `t`.
    #[error("{field} mismatch: store has {stored}, requested {requested}")]
    FormatMismatch {
        field: &'static str,
        stored: i64,
        requested: i64,
    },

    /// A node record could not be parsed, or the tree shape is broken
    /// where the engine needs it to be intact.
    #[error("corrupt node at address {address}: {reason}")]
    CorruptNode { address: u64, reason: String },

    /// The address does not name an allocated node slot.
    #[error("invalid node address: {0}")]
    InvalidAddress(u64),

    /// Rejected configuration value (degree, sequence length, file name).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A sequence symbol outside `a`, `c`, `g`, `t`.
    #[error("invalid sequence symbol: {0:?}")]
    InvalidSymbol(char),
}

impl Error {
    pub(crate) fn corrupt(address: u64, reason: impl Into<String>) -> Self {
        Error::CorruptNode {
            address,
            reason: reason.into(),
        }
    }
}
