//! Pre-counting of fixed-length subsequences.
//!
//! Counting in memory first lets the tree take one
//! [`insert_count`](crate::BTree::insert_count) per distinct key instead of
//! one insert per occurrence.

use std::collections::HashMap;

use crate::common::{Error, Result};
use crate::genbank::sequence::{base_code, MAX_BASES};

/// Counts every length-`k` window of the sequences it is fed.
///
/// Windows containing a symbol other than `a`, `c`, `g`, `t` (typically `n`
/// for an unknown base) are skipped.
///
/// # Example
/// ```
/// use genebank::genbank::aggregate::SubsequenceCounter;
/// use genebank::genbank::sequence::encode;
///
/// let mut counter = SubsequenceCounter::new(2).unwrap();
/// counter.add_sequence("acacn");
/// assert_eq!(counter.count(encode("ac").unwrap()), 2);
/// assert_eq!(counter.count(encode("ca").unwrap()), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SubsequenceCounter {
    length: usize,
    mask: u64,
    counts: HashMap<u64, u32>,
    windows: u64,
}

impl SubsequenceCounter {
    /// Create a counter for windows of `length` bases.
    ///
    /// # Errors
    /// `Error::InvalidConfig` unless `1 <= length <= 32`.
    pub fn new(length: usize) -> Result<Self> {
        if length == 0 || length > MAX_BASES {
            return Err(Error::InvalidConfig(format!(
                "subsequence length must be between 1 and {}, got {}",
                MAX_BASES, length
            )));
        }
        let mask = if length == MAX_BASES {
            u64::MAX
        } else {
            (1u64 << (2 * length)) - 1
        };

        Ok(Self {
            length,
            mask,
            counts: HashMap::new(),
            windows: 0,
        })
    }

    /// Count every valid window of `sequence`.
    pub fn add_sequence(&mut self, sequence: &str) {
        let mut key = 0u64;
        let mut run = 0usize;

        for &byte in sequence.as_bytes() {
            match base_code(byte) {
                Some(code) => {
                    key = ((key << 2) | code) & self.mask;
                    run += 1;
                    if run >= self.length {
                        *self.counts.entry(key).or_insert(0) += 1;
                        self.windows += 1;
                    }
                }
                None => {
                    key = 0;
                    run = 0;
                }
            }
        }
    }

    /// Occurrences of `key` seen so far.
    pub fn count(&self, key: u64) -> u32 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Number of distinct subsequences.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// Number of windows counted, duplicates included.
    pub fn windows(&self) -> u64 {
        self.windows
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Iterate over `(key, count)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u32)> + '_ {
        self.counts.iter().map(|(&k, &c)| (k, c))
    }

    pub fn into_counts(self) -> HashMap<u64, u32> {
        self.counts
    }
}
