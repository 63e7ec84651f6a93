//! Store header.
//!
//! Every store file starts with a [`StoreHeader`] containing:
//! - a validity marker
//! - the sequence length `k` and degree `t` the file was built with
//! - the address of the current root node

use crate::common::config::{HEADER_MAGIC, HEADER_SIZE};
use crate::common::NodeAddress;

/// Metadata stored at the beginning of the store file.
///
/// # Layout (20 bytes, big-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     magic (1234)
/// 4       4     sequence_length (k)
/// 8       4     degree (t)
/// 12      8     root address
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    /// Sequence length `k`.
    pub sequence_length: i32,
    /// Minimum degree `t`.
    pub degree: i32,
    /// Address of the root node.
    pub root: NodeAddress,
}

impl StoreHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = HEADER_SIZE as usize;

    /// Offset of each field within the header.
    pub const OFFSET_MAGIC: usize = 0;
    pub const OFFSET_SEQUENCE_LENGTH: usize = 4;
    pub const OFFSET_DEGREE: usize = 8;
    pub const OFFSET_ROOT: usize = 12;

    /// Header for a fresh store whose root sits right after the header.
    pub fn new(sequence_length: u32, degree: u32) -> Self {
        Self {
            sequence_length: sequence_length as i32,
            degree: degree as i32,
            root: NodeAddress::new(HEADER_SIZE),
        }
    }

    /// Parse a header, returning `None` when the marker is missing or the
    /// root pointer is negative.
    ///
    /// # Panics
    /// Panics if `data.len() < StoreHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        assert!(data.len() >= Self::SIZE, "buffer too small for StoreHeader");

        if read_i32(data, Self::OFFSET_MAGIC) != HEADER_MAGIC {
            return None;
        }

        let root = NodeAddress::from_raw(read_i64(data, Self::OFFSET_ROOT))?;

        Some(Self {
            sequence_length: read_i32(data, Self::OFFSET_SEQUENCE_LENGTH),
            degree: read_i32(data, Self::OFFSET_DEGREE),
            root,
        })
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < StoreHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for StoreHeader");

        data[Self::OFFSET_MAGIC..Self::OFFSET_MAGIC + 4]
            .copy_from_slice(&HEADER_MAGIC.to_be_bytes());
        data[Self::OFFSET_SEQUENCE_LENGTH..Self::OFFSET_SEQUENCE_LENGTH + 4]
            .copy_from_slice(&self.sequence_length.to_be_bytes());
        data[Self::OFFSET_DEGREE..Self::OFFSET_DEGREE + 4]
            .copy_from_slice(&self.degree.to_be_bytes());
        data[Self::OFFSET_ROOT..Self::OFFSET_ROOT + 8]
            .copy_from_slice(&NodeAddress::to_raw(Some(self.root)).to_be_bytes());
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        self.write_to(&mut buf);
        buf
    }
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    i32::from_be_bytes(bytes)
}

fn read_i64(data: &[u8], offset: usize) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    i64::from_be_bytes(bytes)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_new() {
        let header = StoreHeader::new(16, 4);
        assert_eq!(header.sequence_length, 16);
        assert_eq!(header.degree, 4);
        assert_eq!(header.root, NodeAddress::new(20));
    }

    #[test]
    fn test_header_roundtrip() {
        let original = StoreHeader {
            sequence_length: 31,
            degree: 102,
            root: NodeAddress::new(0x1234_5678),
        };

        let recovered = StoreHeader::from_bytes(&original.to_bytes()).unwrap();
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_header_byte_layout() {
        let header = StoreHeader {
            sequence_length: 0x0102_0304,
            degree: 2,
            root: NodeAddress::new(0x0807_0605_0403_0201),
        };
        let buffer = header.to_bytes();

        // Big-endian throughout
        assert_eq!(&buffer[0..4], &[0, 0, 0x04, 0xD2]); // 1234
        assert_eq!(&buffer[4..8], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&buffer[8..12], &[0, 0, 0, 2]);
        assert_eq!(buffer[12], 0x08); // root MSB
        assert_eq!(buffer[19], 0x01); // root LSB
    }

    #[test]
    fn test_header_rejects_missing_magic() {
        let mut buffer = StoreHeader::new(8, 3).to_bytes();
        buffer[3] ^= 0xFF;
        assert!(StoreHeader::from_bytes(&buffer).is_none());
        assert!(StoreHeader::from_bytes(&[0u8; StoreHeader::SIZE]).is_none());
    }

    #[test]
    fn test_header_rejects_negative_root() {
        let mut buffer = StoreHeader::new(8, 3).to_bytes();
        buffer[12..20].copy_from_slice(&(-1i64).to_be_bytes());
        assert!(StoreHeader::from_bytes(&buffer).is_none());
    }
}
