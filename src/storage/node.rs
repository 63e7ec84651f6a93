//! Node - the in-memory view of one B-tree node slot.
//!
//! A [`Node`] is materialized from its fixed-size record, mutated by the
//! engine and written back to the same address. Nodes never outlive the
//! operation that read them.

use crate::common::config::record_size;
use crate::common::{Error, NodeAddress, Result};

/// One key with its occurrence count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Encoded subsequence.
    pub key: u64,
    /// Number of times the key was inserted.
    pub frequency: i32,
}

impl Entry {
    /// Key written into unused slots.
    pub const SENTINEL_KEY: u64 = 0xadde_eeee_adde_aaaa;
    /// Frequency written into unused slots.
    pub const SENTINEL_FREQUENCY: i32 = 0xdead_beef_u32 as i32;

    /// Create a new entry.
    #[inline]
    pub fn new(key: u64, frequency: i32) -> Self {
        Self { key, frequency }
    }
}

/// A B-tree node.
///
/// `keys` holds exactly `n` entries in ascending order. `children` holds the
/// logical child sequence: empty for a leaf, `n + 1` present addresses for a
/// well-formed internal node. A slot whose on-disk pointer is `-1` decodes to
/// `None`, so a damaged node shows its holes instead of hiding them.
///
/// # Record Layout (big-endian)
/// ```text
/// Offset              Size        Field
/// ------              ----        -----
/// 0                   2           leaf flag ('L' or 'I')
/// 2                   2           root flag ('R' or 'N')
/// 4                   4           n
/// 8                   12*(2t-1)   keys: (u64 key, i32 frequency) per slot
/// 8 + 12*(2t-1)       8*2t        child addresses, -1 when absent
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    address: NodeAddress,
    pub(crate) is_leaf: bool,
    pub(crate) is_root: bool,
    pub(crate) keys: Vec<Entry>,
    pub(crate) children: Vec<Option<NodeAddress>>,
}

impl Node {
    const OFFSET_LEAF: usize = 0;
    const OFFSET_ROOT: usize = 2;
    const OFFSET_COUNT: usize = 4;
    const OFFSET_KEYS: usize = 8;
    const ENTRY_SIZE: usize = 12;
    const CHILD_SIZE: usize = 8;

    const FLAG_LEAF: u16 = b'L' as u16;
    const FLAG_INTERNAL: u16 = b'I' as u16;
    const FLAG_ROOT: u16 = b'R' as u16;
    const FLAG_NOT_ROOT: u16 = b'N' as u16;

    /// Create an empty node at `address`.
    pub fn new(address: NodeAddress, is_leaf: bool) -> Self {
        Self {
            address,
            is_leaf,
            is_root: false,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Slot this node lives in.
    #[inline]
    pub fn address(&self) -> NodeAddress {
        self.address
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Number of keys, `n`.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The `n` stored entries.
    #[inline]
    pub fn keys(&self) -> &[Entry] {
        &self.keys
    }

    /// The logical child sequence.
    #[inline]
    pub fn children(&self) -> &[Option<NodeAddress>] {
        &self.children
    }

    /// Child at `index`, or `None` if absent.
    #[inline]
    pub fn child(&self, index: usize) -> Option<NodeAddress> {
        self.children.get(index).copied().flatten()
    }

    /// Number of present child pointers.
    pub fn child_count(&self) -> usize {
        self.children.iter().filter(|c| c.is_some()).count()
    }

    /// Look for `key` in this node.
    ///
    /// Returns `Ok(i)` on an exact match, or `Err(i)` with the index of the
    /// first key greater than `key` (the child to descend into).
    #[inline]
    pub fn find(&self, key: u64) -> std::result::Result<usize, usize> {
        self.keys.binary_search_by(|e| e.key.cmp(&key))
    }

    /// Serialize into a full record for degree `t`, padding unused key and
    /// child slots with sentinels.
    pub fn encode(&self, degree: u32) -> Vec<u8> {
        let max_keys = 2 * degree as usize - 1;
        let max_children = 2 * degree as usize;
        debug_assert!(self.keys.len() <= max_keys, "node over capacity");
        debug_assert!(self.children.len() <= max_children, "too many children");

        let mut buf = Vec::with_capacity(record_size(degree) as usize);

        let leaf = if self.is_leaf {
            Self::FLAG_LEAF
        } else {
            Self::FLAG_INTERNAL
        };
        let root = if self.is_root {
            Self::FLAG_ROOT
        } else {
            Self::FLAG_NOT_ROOT
        };
        buf.extend_from_slice(&leaf.to_be_bytes());
        buf.extend_from_slice(&root.to_be_bytes());
        buf.extend_from_slice(&(self.keys.len() as i32).to_be_bytes());

        for slot in 0..max_keys {
            let (key, freq) = match self.keys.get(slot) {
                Some(e) => (e.key, e.frequency),
                None => (Entry::SENTINEL_KEY, Entry::SENTINEL_FREQUENCY),
            };
            buf.extend_from_slice(&key.to_be_bytes());
            buf.extend_from_slice(&freq.to_be_bytes());
        }

        for slot in 0..max_children {
            let raw = NodeAddress::to_raw(self.children.get(slot).copied().flatten());
            buf.extend_from_slice(&raw.to_be_bytes());
        }

        buf
    }

    /// Parse a record read from `address`.
    ///
    /// # Errors
    /// Returns `Error::CorruptNode` if the record is short, a flag is not
    /// recognized, or `n` is outside `0..=2t-1`.
    pub fn decode(address: NodeAddress, data: &[u8], degree: u32) -> Result<Self> {
        let max_keys = 2 * degree as usize - 1;
        let max_children = 2 * degree as usize;
        let expected = record_size(degree) as usize;
        if data.len() < expected {
            return Err(Error::corrupt(
                address.0,
                format!("record is {} bytes, expected {}", data.len(), expected),
            ));
        }

        let is_leaf = match read_u16(data, Self::OFFSET_LEAF) {
            Self::FLAG_LEAF => true,
            Self::FLAG_INTERNAL => false,
            other => {
                return Err(Error::corrupt(
                    address.0,
                    format!("unknown leaf flag {:#06x}", other),
                ))
            }
        };
        let is_root = match read_u16(data, Self::OFFSET_ROOT) {
            Self::FLAG_ROOT => true,
            Self::FLAG_NOT_ROOT => false,
            other => {
                return Err(Error::corrupt(
                    address.0,
                    format!("unknown root flag {:#06x}", other),
                ))
            }
        };

        let n = read_i32(data, Self::OFFSET_COUNT);
        let n = match usize::try_from(n) {
            Ok(n) if n <= max_keys => n,
            _ => {
                return Err(Error::corrupt(
                    address.0,
                    format!("key count {} outside 0..={}", n, max_keys),
                ))
            }
        };

        let keys = (0..n)
            .map(|slot| {
                let off = Self::OFFSET_KEYS + slot * Self::ENTRY_SIZE;
                Entry::new(read_u64(data, off), read_i32(data, off + 8))
            })
            .collect();

        let children_offset = Self::OFFSET_KEYS + max_keys * Self::ENTRY_SIZE;
        let mut children: Vec<Option<NodeAddress>> = (0..max_children)
            .map(|slot| {
                let off = children_offset + slot * Self::CHILD_SIZE;
                NodeAddress::from_raw(read_u64(data, off) as i64)
            })
            .collect();
        while children.last() == Some(&None) {
            children.pop();
        }

        Ok(Self {
            address,
            is_leaf,
            is_root,
            keys,
            children,
        })
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    i32::from_be_bytes(bytes)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

// ============================================================================
// TESTS
// ============================================================================
