//! Node Store - fixed-size node slots behind a small header.
//!
//! The [`NodeStore`] handles all direct file operations:
//! - Creating or validating the store header
//! - Allocating node slots
//! - Reading and writing node records
//! - Persisting the root pointer

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::common::config::HEADER_SIZE;
use crate::common::{BTreeConfig, Error, NodeAddress, Result};
use crate::storage::header::StoreHeader;
use crate::storage::node::Node;
use crate::storage::stats::StoreStats;

/// Manages the backing file of one B-tree.
///
/// # File Layout
/// ```text
/// ┌──────────┬──────────┬──────────┬─────────┬──────────┐
/// │  Header  │  Slot 0  │  Slot 1  │  ...    │  Slot N  │
/// │  (20 B)  │ (40t-4)  │ (40t-4)  │         │ (40t-4)  │
/// └──────────┴──────────┴──────────┴─────────┴──────────┘
/// Offset: 0   20        20+R       ...       20+N×R
/// ```
///
/// A node's address is the byte offset of its slot. Slots are never freed,
/// so the allocator is a cursor that only moves forward.
///
/// # Thread Safety
/// The file sits behind a `Mutex` so `read_node` can take `&self` and keep
/// each seek+read pair atomic. Mutations take `&mut self`: one writer per
/// store, and nothing guards against a second process opening the file.
///
/// # Durability
/// Writes go straight to the file. When `sync_writes` is set, [`sync`]
/// issues an `fsync`; the engine calls it once per mutating operation.
///
/// [`sync`]: NodeStore::sync
pub struct NodeStore {
    file: Mutex<File>,
    config: BTreeConfig,
    record_size: u64,
    /// Current root, mirrored from the header.
    root: NodeAddress,
    /// Next free slot.
    next_address: u64,
    /// True if this open initialized the file.
    created: bool,
    stats: StoreStats,
}

impl NodeStore {
    /// Open the store at `path`, initializing it if it is missing or has no
    /// recognizable header.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `config` is rejected by
    ///   [`BTreeConfig::validate`]
    /// - `Error::FormatMismatch` if the header's `k` or `t` differ from
    ///   `config`
    /// - `Error::CorruptNode` if the header's root pointer is not a slot
    /// - `Error::Io` on any file error
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: &BTreeConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let file_size = file.metadata()?.len();
        let header = if file_size >= HEADER_SIZE {
            let mut buf = [0u8; StoreHeader::SIZE];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf)?;
            StoreHeader::from_bytes(&buf)
        } else {
            None
        };

        let mut store = Self {
            file: Mutex::new(file),
            config: *config,
            record_size: config.record_size(),
            root: NodeAddress::new(HEADER_SIZE),
            next_address: HEADER_SIZE,
            created: false,
            stats: StoreStats::new(),
        };

        match header {
            Some(header) => store.load(header, file_size)?,
            None => {
                if file_size > 0 {
                    tracing::warn!(
                        path = %path.display(),
                        file_size,
                        "no valid store header, reinitializing"
                    );
                }
                store.initialize()?;
                tracing::info!(
                    path = %path.display(),
                    k = config.sequence_length,
                    t = config.degree,
                    "created block file"
                );
            }
        }

        Ok(store)
    }

    /// Truncate the file and write a fresh header. The root slot becomes the
    /// allocator's first address.
    fn initialize(&mut self) -> Result<()> {
        let header = StoreHeader::new(self.config.sequence_length, self.config.degree);
        let file = self.file.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.to_bytes())?;

        self.root = header.root;
        self.next_address = header.root.0;
        self.created = true;
        Ok(())
    }

    /// Adopt an existing header after checking it against the config.
    fn load(&mut self, header: StoreHeader, file_size: u64) -> Result<()> {
        if header.sequence_length != self.config.sequence_length as i32 {
            return Err(Error::FormatMismatch {
                field: "sequence length",
                stored: header.sequence_length.into(),
                requested: self.config.sequence_length.into(),
            });
        }
        if header.degree != self.config.degree as i32 {
            return Err(Error::FormatMismatch {
                field: "degree",
                stored: header.degree.into(),
                requested: self.config.degree.into(),
            });
        }

        let body = file_size - HEADER_SIZE;
        let node_count = body / self.record_size;
        if body % self.record_size != 0 {
            tracing::warn!(
                trailing_bytes = body % self.record_size,
                "ignoring partial node slot at end of file"
            );
        }

        self.next_address = HEADER_SIZE + node_count * self.record_size;
        self.root = header.root;

        if node_count == 0 {
            // Header written but the root never was.
            if header.root.0 != HEADER_SIZE {
                return Err(Error::corrupt(header.root.0, "root pointer in empty store"));
            }
            self.created = true;
        } else if !self.is_allocated(header.root) {
            return Err(Error::corrupt(
                header.root.0,
                "root pointer outside allocated slots",
            ));
        }

        tracing::info!(
            k = self.config.sequence_length,
            t = self.config.degree,
            root = header.root.0,
            node_count,
            "opened block file"
        );
        Ok(())
    }

    // ========================================================================
    // Slot allocation
    // ========================================================================

    /// Hand out the next free slot.
    ///
    /// The slot only reaches the file once a node is written to it.
    pub fn allocate(&mut self) -> NodeAddress {
        let address = NodeAddress::new(self.next_address);
        self.next_address += self.record_size;
        self.stats.nodes_allocated.fetch_add(1, Ordering::Relaxed);
        address
    }

    /// Whether `address` is the start of a slot the allocator has handed out.
    pub fn is_allocated(&self, address: NodeAddress) -> bool {
        address.0 >= HEADER_SIZE
            && address.0 < self.next_address
            && (address.0 - HEADER_SIZE) % self.record_size == 0
    }

    // ========================================================================
    // Node I/O
    // ========================================================================

    /// Read the node stored at `address`.
    ///
    /// Reading never consumes a slot.
    ///
    /// # Errors
    /// - `Error::InvalidAddress` if `address` is not an allocated slot
    /// - `Error::CorruptNode` if the record is truncated or unparseable
    /// - `Error::Io` on other read failures
    pub fn read_node(&self, address: NodeAddress) -> Result<Node> {
        if !self.is_allocated(address) {
            return Err(Error::InvalidAddress(address.0));
        }

        let mut buf = vec![0u8; self.record_size as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(address.0))?;
            file.read_exact(&mut buf).map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => Error::corrupt(address.0, "truncated record"),
                _ => Error::Io(e),
            })?;
        }
        self.stats.nodes_read.fetch_add(1, Ordering::Relaxed);

        Node::decode(address, &buf, self.config.degree)
    }

    /// Overwrite the full slot at `node.address()`.
    ///
    /// # Errors
    /// - `Error::InvalidAddress` if the node's address was never allocated
    /// - `Error::Io` on write failure
    pub fn write_node(&mut self, node: &Node) -> Result<()> {
        let address = node.address();
        if !self.is_allocated(address) {
            return Err(Error::InvalidAddress(address.0));
        }

        let bytes = node.encode(self.config.degree);
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(address.0))?;
        file.write_all(&bytes)?;
        self.stats.nodes_written.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(address = address.0, n = node.len(), "wrote node");
        Ok(())
    }

    /// Persist a new root address into the header.
    pub fn update_root_pointer(&mut self, address: NodeAddress) -> Result<()> {
        if !self.is_allocated(address) {
            return Err(Error::InvalidAddress(address.0));
        }

        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(StoreHeader::OFFSET_ROOT as u64))?;
        file.write_all(&NodeAddress::to_raw(Some(address)).to_be_bytes())?;
        self.root = address;
        self.stats.root_updates.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(root = address.0, "updated root pointer");
        Ok(())
    }

    /// Flush file contents to disk when `sync_writes` is enabled.
    pub fn sync(&mut self) -> Result<()> {
        if self.config.sync_writes {
            self.file.get_mut().sync_data()?;
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Root address recorded in the header.
    #[inline]
    pub fn root(&self) -> NodeAddress {
        self.root
    }

    /// Number of slots handed out so far.
    #[inline]
    pub fn node_count(&self) -> u64 {
        (self.next_address - HEADER_SIZE) / self.record_size
    }

    /// Size of one node slot in bytes.
    #[inline]
    pub fn record_size(&self) -> u64 {
        self.record_size
    }

    /// True if this open initialized an empty store.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.created
    }

    #[inline]
    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::node::Entry;
    use tempfile::tempdir;

    fn config(t: u32) -> BTreeConfig {
        BTreeConfig::new(8, t).with_sync_writes(false)
    }

    fn leaf_at(address: NodeAddress, keys: &[u64]) -> Node {
        let mut node = Node::new(address, true);
        node.keys = keys.iter().map(|&k| Entry::new(k, 1)).collect();
        node
    }

    #[test]
    fn test_create_new_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.btree");

        let store = NodeStore::open_or_create(&path, &config(3)).unwrap();
        assert!(store.is_new());
        assert_eq!(store.root(), NodeAddress::new(HEADER_SIZE));
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.record_size(), 116);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_SIZE);
    }

    #[test]
    fn test_allocator_starts_at_root() {
        let dir = tempdir().unwrap();
        let mut store = NodeStore::open_or_create(dir.path().join("a"), &config(2)).unwrap();

        assert_eq!(store.allocate(), NodeAddress::new(20));
        assert_eq!(store.allocate(), NodeAddress::new(96));
        assert_eq!(store.allocate(), NodeAddress::new(172));
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.stats().snapshot().nodes_allocated, 3);
    }

    #[test]
    fn test_write_and_read_node() {
        let dir = tempdir().unwrap();
        let mut store = NodeStore::open_or_create(dir.path().join("a"), &config(2)).unwrap();

        let address = store.allocate();
        let node = leaf_at(address, &[3, 9, 27]);
        store.write_node(&node).unwrap();

        let read = store.read_node(address).unwrap();
        assert_eq!(read, node);
        assert_eq!(store.node_count(), 1);

        // Reading does not move the allocator
        assert_eq!(store.allocate(), NodeAddress::new(96));
    }

    #[test]
    fn test_reopen_resumes_after_last_slot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a");

        {
            let mut store = NodeStore::open_or_create(&path, &config(2)).unwrap();
            for keys in [&[1u64][..], &[2], &[3]] {
                let address = store.allocate();
                store.write_node(&leaf_at(address, keys)).unwrap();
            }
            store.update_root_pointer(NodeAddress::new(96)).unwrap();
        }

        let mut store = NodeStore::open_or_create(&path, &config(2)).unwrap();
        assert!(!store.is_new());
        assert_eq!(store.node_count(), 3);
        assert_eq!(store.root(), NodeAddress::new(96));
        assert_eq!(store.read_node(NodeAddress::new(172)).unwrap().keys()[0].key, 3);
        assert_eq!(store.allocate(), NodeAddress::new(20 + 3 * 76));
    }

    #[test]
    fn test_format_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a");
        {
            let mut store = NodeStore::open_or_create(&path, &config(3)).unwrap();
            let address = store.allocate();
            store.write_node(&leaf_at(address, &[])).unwrap();
        }

        let err = NodeStore::open_or_create(&path, &config(4)).err().unwrap();
        assert!(matches!(
            err,
            Error::FormatMismatch {
                field: "degree",
                stored: 3,
                requested: 4
            }
        ));

        let other_k = BTreeConfig::new(9, 3).with_sync_writes(false);
        let err = NodeStore::open_or_create(&path, &other_k).err().unwrap();
        assert!(matches!(
            err,
            Error::FormatMismatch {
                field: "sequence length",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_header_is_reinitialized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a");
        std::fs::write(&path, vec![0xAB; 500]).unwrap();

        let store = NodeStore::open_or_create(&path, &config(2)).unwrap();
        assert!(store.is_new());
        assert_eq!(store.node_count(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_SIZE);
    }

    #[test]
    fn test_read_invalid_address() {
        let dir = tempdir().unwrap();
        let mut store = NodeStore::open_or_create(dir.path().join("a"), &config(2)).unwrap();
        let address = store.allocate();
        store.write_node(&leaf_at(address, &[1])).unwrap();

        for bad in [0, 19, 21, 96, 10_000] {
            assert!(matches!(
                store.read_node(NodeAddress::new(bad)),
                Err(Error::InvalidAddress(a)) if a == bad
            ));
        }
    }

    #[test]
    fn test_read_allocated_but_unwritten_is_truncated() {
        let dir = tempdir().unwrap();
        let mut store = NodeStore::open_or_create(dir.path().join("a"), &config(2)).unwrap();
        let address = store.allocate();

        assert!(matches!(
            store.read_node(address),
            Err(Error::CorruptNode { address: 20, .. })
        ));
    }

    #[test]
    fn test_write_unallocated_fails() {
        let dir = tempdir().unwrap();
        let mut store = NodeStore::open_or_create(dir.path().join("a"), &config(2)).unwrap();
        let node = leaf_at(NodeAddress::new(20), &[1]);
        assert!(matches!(store.write_node(&node), Err(Error::InvalidAddress(20))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempdir().unwrap();
        for bad in [BTreeConfig::new(8, 1), BTreeConfig::new(8, 1 << 30)] {
            assert!(matches!(
                NodeStore::open_or_create(dir.path().join("a"), &bad),
                Err(Error::InvalidConfig(_))
            ));
        }
    }
}
