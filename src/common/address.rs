//! Node address type.

use std::fmt;

/// Identifies a node slot in the backing store by its byte offset.
///
/// Addresses are the only form of node identity: children are stored as
/// addresses and every in-memory [`Node`](crate::Node) is a transient view
/// of the slot it names.
///
/// On disk an absent child is written as `-1`; in memory it is `None`.
///
/// # Example
/// ```
/// use genebank::NodeAddress;
///
/// let addr = NodeAddress::new(20);
/// assert_eq!(addr.offset(), 20);
/// assert_eq!(NodeAddress::from_raw(-1), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress(pub u64);

impl NodeAddress {
    /// On-disk encoding of "no child".
    pub const ABSENT_RAW: i64 = -1;

    /// Create a new NodeAddress.
    #[inline]
    pub fn new(offset: u64) -> Self {
        NodeAddress(offset)
    }

    /// Byte offset of the slot.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.0
    }

    /// Decode an on-disk child pointer. Negative values mean no child.
    #[inline]
    pub fn from_raw(raw: i64) -> Option<Self> {
        u64::try_from(raw).ok().map(NodeAddress)
    }

    /// Encode an optional child pointer for disk.
    #[inline]
    pub fn to_raw(addr: Option<Self>) -> i64 {
        match addr {
            Some(a) => a.0 as i64,
            None => Self::ABSENT_RAW,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
