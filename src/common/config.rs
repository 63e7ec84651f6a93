//! Configuration for genebank stores.
//!
//! The degree `t` fixes both the header contents and the size of every node
//! record, so it is carried explicitly in [`BTreeConfig`] and handed to each
//! component that needs it.

use crate::common::{Error, Result};

/// Size of the metadata header at the start of every store file.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     validity marker (1234)
/// 4       4     k, sequence length
/// 8       4     t, degree
/// 12      8     root node address
/// ```
pub const HEADER_SIZE: u64 = 20;

/// Marker written at offset 0 of a valid store.
pub const HEADER_MAGIC: i32 = 1234;

/// Block size used to pick a degree when the caller asks for degree 0.
pub const BLOCK_SIZE: u64 = 4096;

/// Smallest legal minimum degree.
pub const MIN_DEGREE: u32 = 2;

/// Largest accepted minimum degree. A node record is then about 2.5 MiB.
pub const MAX_DEGREE: u32 = 1 << 16;

/// Longest sequence whose 2-bit encoding keeps the key's sign bit clear.
pub const MAX_SEQUENCE_LENGTH: u32 = 31;

/// Size in bytes of a node record for degree `t`.
///
/// `leaf(2) + root(2) + n(4) + (2t-1) * (key 8 + freq 4) + 2t * child 8`,
/// which simplifies to `40t - 4`.
#[inline]
pub const fn record_size(degree: u32) -> u64 {
    let t = degree as u64;
    2 + 2 + 4 + 12 * (2 * t - 1) + 8 * (2 * t)
}

/// Largest degree whose node record fits in one [`BLOCK_SIZE`] block.
pub const fn block_optimal_degree() -> u32 {
    // 40t - 4 <= BLOCK_SIZE
    ((BLOCK_SIZE + 4) / 40) as u32
}

/// Parameters of a B-tree store.
///
/// # Example
/// ```
/// use genebank::BTreeConfig;
///
/// let config = BTreeConfig::new(16, 4).with_sync_writes(false);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_keys(), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTreeConfig {
    /// Sequence length `k` in bases. Stored in the header for compatibility.
    pub sequence_length: u32,
    /// Minimum degree `t`.
    pub degree: u32,
    /// Issue an `fsync` at the end of every mutating operation.
    pub sync_writes: bool,
}

impl BTreeConfig {
    /// Create a config with durable writes enabled.
    pub fn new(sequence_length: u32, degree: u32) -> Self {
        Self {
            sequence_length,
            degree,
            sync_writes: true,
        }
    }

    /// Toggle the per-operation `fsync`.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Check that `k` and `t` are usable.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `t` is outside `2..=MAX_DEGREE` or
    /// `k` is outside `1..=31`.
    pub fn validate(&self) -> Result<()> {
        if self.degree < MIN_DEGREE {
            return Err(Error::InvalidConfig(format!(
                "degree must be at least {}, got {}",
                MIN_DEGREE, self.degree
            )));
        }
        if self.degree > MAX_DEGREE {
            return Err(Error::InvalidConfig(format!(
                "degree must be at most {}, got {}",
                MAX_DEGREE, self.degree
            )));
        }
        if self.sequence_length == 0 || self.sequence_length > MAX_SEQUENCE_LENGTH {
            return Err(Error::InvalidConfig(format!(
                "sequence length must be between 1 and {}, got {}",
                MAX_SEQUENCE_LENGTH, self.sequence_length
            )));
        }
        Ok(())
    }

    /// Maximum keys per node, `2t - 1`.
    #[inline]
    pub fn max_keys(&self) -> usize {
        2 * self.degree as usize - 1
    }

    /// Minimum keys per non-root node, `t - 1`.
    #[inline]
    pub fn min_keys(&self) -> usize {
        self.degree as usize - 1
    }

    /// Maximum children per node, `2t`.
    #[inline]
    pub fn max_children(&self) -> usize {
        2 * self.degree as usize
    }

    /// Size in bytes of one node slot.
    #[inline]
    pub fn record_size(&self) -> u64 {
        record_size(self.degree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size() {
        assert_eq!(record_size(2), 76);
        assert_eq!(record_size(4), 156);
        assert_eq!(record_size(102), 4076);
    }

    #[test]
    fn test_block_optimal_degree() {
        let t = block_optimal_degree();
        assert_eq!(t, 102);
        assert!(record_size(t) <= BLOCK_SIZE);
        assert!(record_size(t + 1) > BLOCK_SIZE);
    }

    #[test]
    fn test_validate() {
        assert!(BTreeConfig::new(16, 2).validate().is_ok());
        assert!(BTreeConfig::new(31, 102).validate().is_ok());
        assert!(matches!(
            BTreeConfig::new(16, 1).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(BTreeConfig::new(16, MAX_DEGREE).validate().is_ok());
        assert!(matches!(
            BTreeConfig::new(16, MAX_DEGREE + 1).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            BTreeConfig::new(8, 1 << 30).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            BTreeConfig::new(0, 4).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            BTreeConfig::new(32, 4).validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_capacity_helpers() {
        let config = BTreeConfig::new(10, 3);
        assert_eq!(config.max_keys(), 5);
        assert_eq!(config.min_keys(), 2);
        assert_eq!(config.max_children(), 6);
        assert!(config.sync_writes);
        assert!(!config.with_sync_writes(false).sync_writes);
    }
}
