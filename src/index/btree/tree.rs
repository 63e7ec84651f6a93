//! B-tree engine over a [`NodeStore`].
//!
//! Nodes are fetched from disk one at a time along a root-to-leaf path,
//! mutated, and written straight back. Full nodes are split on the way down,
//! so an insert never has to walk back up.

use std::io::Write;
use std::path::Path;

use crate::common::{BTreeConfig, Error, NodeAddress, Result};
use crate::storage::{Entry, Node, NodeStore, StoreStats};

/// A disk-resident B-tree of `(key, frequency)` entries.
///
/// # Usage
/// ```no_run
/// use genebank::{BTree, BTreeConfig};
///
/// let mut tree = BTree::open_or_create("seqs.btree", BTreeConfig::new(8, 4))?;
/// tree.insert(42)?;
/// tree.insert(42)?;
/// assert_eq!(tree.search(42)?.map(|e| e.frequency), Some(2));
/// # Ok::<(), genebank::Error>(())
/// ```
///
/// # Thread Safety
/// Single writer. Lookups take `&self`, inserts take `&mut self`; two
/// processes must never open the same file for writing.
pub struct BTree {
    pub(super) store: NodeStore,
    config: BTreeConfig,
    /// Distinct keys in the tree.
    num_keys: u64,
}

impl BTree {
    /// Open the tree stored at `path`, creating an empty one if needed.
    ///
    /// A new store gets an empty leaf root in its first slot. An existing
    /// store has its keys counted so [`num_keys`](Self::num_keys) survives a
    /// reopen.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for an unusable `k` or `t`
    /// - `Error::FormatMismatch` if the file was built with another `k`/`t`
    /// - `Error::CorruptNode` / `Error::InvalidAddress` if the existing tree
    ///   cannot be walked
    /// - `Error::Io` on file errors
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: BTreeConfig) -> Result<Self> {
        let store = NodeStore::open_or_create(path, &config)?;
        let mut tree = Self {
            store,
            config,
            num_keys: 0,
        };

        if tree.store.is_new() {
            let address = tree.store.allocate();
            let mut root = Node::new(address, true);
            root.is_root = true;
            tree.store.write_node(&root)?;
            tree.store.sync()?;
        } else {
            tree.num_keys = tree.count_keys()?;
            tracing::debug!(num_keys = tree.num_keys, "counted stored keys");
        }

        Ok(tree)
    }

    // ========================================================================
    // Public API: Lookup
    // ========================================================================

    /// Look up `key`. A miss is `Ok(None)`.
    ///
    /// # Errors
    /// `Error::CorruptNode` if the descent meets a missing child.
    pub fn search(&self, key: u64) -> Result<Option<Entry>> {
        Ok(self.locate(key)?.map(|(node, i)| node.keys[i]))
    }

    /// Find the node holding `key` and its index within that node.
    pub fn locate(&self, key: u64) -> Result<Option<(Node, usize)>> {
        let mut node = self.store.read_node(self.store.root())?;
        let mut depth = 1;

        loop {
            let index = match node.find(key) {
                Ok(i) => return Ok(Some((node, i))),
                Err(_) if node.is_leaf() => return Ok(None),
                Err(i) => i,
            };

            let child = node.child(index).ok_or_else(|| {
                Error::corrupt(
                    node.address().0,
                    format!("missing child {} during search", index),
                )
            })?;

            depth += 1;
            if depth > self.store.node_count() {
                return Err(Error::corrupt(child.0, "cycle in child pointers"));
            }
            node = self.store.read_node(child)?;
        }
    }

    // ========================================================================
    // Public API: Insert
    // ========================================================================

    /// Insert one occurrence of `key`.
    ///
    /// Returns the key's frequency after the insert.
    pub fn insert(&mut self, key: u64) -> Result<i32> {
        self.insert_count(key, 1)
    }

    /// Insert `count` occurrences of `key` in a single descent.
    ///
    /// An existing key has its frequency raised in place; a new key enters
    /// with frequency `count` and bumps [`num_keys`](Self::num_keys).
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `count < 1`, plus any store error.
    pub fn insert_count(&mut self, key: u64, count: i32) -> Result<i32> {
        if count < 1 {
            return Err(Error::InvalidConfig(format!(
                "insert count must be positive, got {}",
                count
            )));
        }

        if let Some((mut node, i)) = self.locate(key)? {
            let entry = &mut node.keys[i];
            entry.frequency = entry.frequency.saturating_add(count);
            let frequency = entry.frequency;
            self.store.write_node(&node)?;
            self.store.sync()?;
            return Ok(frequency);
        }

        let entry = Entry::new(key, count);
        let root = self.store.read_node(self.store.root())?;

        let start = if root.len() == self.config.max_keys() {
            self.grow_root(root)?
        } else {
            root
        };
        self.insert_nonfull(start, entry)?;

        self.num_keys += 1;
        self.store.sync()?;
        Ok(count)
    }

    /// Put a fresh root above the full `old_root` and split it.
    fn grow_root(&mut self, mut old_root: Node) -> Result<Node> {
        let mut new_root = Node::new(self.store.allocate(), false);
        new_root.is_root = true;
        new_root.children.push(Some(old_root.address()));
        old_root.is_root = false;

        self.split_child(&mut new_root, 0, old_root)?;
        self.store.update_root_pointer(new_root.address())?;

        tracing::debug!(root = new_root.address().0, "tree grew a level");
        Ok(new_root)
    }

    /// Insert `entry` below `node`, which must have room for one more key.
    ///
    /// Any full child on the way down is split before it is entered.
    fn insert_nonfull(&mut self, mut node: Node, entry: Entry) -> Result<()> {
        loop {
            // The caller searched first, so an exact hit means the file changed
            // under us.
            let index = match node.find(entry.key) {
                Err(slot) => slot,
                Ok(_) => {
                    return Err(Error::corrupt(
                        node.address().0,
                        format!("key {} already present during insert", entry.key),
                    ))
                }
            };

            if node.is_leaf() {
                node.keys.insert(index, entry);
                self.store.write_node(&node)?;
                return Ok(());
            }

            let child_address = node.child(index).ok_or_else(|| {
                Error::corrupt(
                    node.address().0,
                    format!("missing child {} during insert", index),
                )
            })?;
            let child = self.store.read_node(child_address)?;

            node = if child.len() == self.config.max_keys() {
                let (left, right) = self.split_child(&mut node, index, child)?;
                if node.keys[index].key < entry.key {
                    right
                } else {
                    left
                }
            } else {
                child
            };
        }
    }

    /// Split the full `child` found at `parent.children[index]`.
    ///
    /// The median moves up into `parent.keys[index]` and a new right sibling
    /// takes the top `t - 1` keys (and top `t` children). All three nodes are
    /// written back. Returns `(child, sibling)`.
    fn split_child(
        &mut self,
        parent: &mut Node,
        index: usize,
        mut child: Node,
    ) -> Result<(Node, Node)> {
        let t = self.config.degree as usize;

        if child.len() != self.config.max_keys() {
            return Err(Error::corrupt(
                child.address().0,
                format!("split of non-full node with {} keys", child.len()),
            ));
        }
        if !child.is_leaf() && child.children.len() != self.config.max_children() {
            return Err(Error::corrupt(
                child.address().0,
                format!("full internal node has {} children", child.children.len()),
            ));
        }
        if parent.children.len() <= index {
            return Err(Error::corrupt(
                parent.address().0,
                format!("split of child {} beyond parent's children", index),
            ));
        }

        let mut sibling = Node::new(self.store.allocate(), child.is_leaf());
        sibling.keys = child.keys.split_off(t);
        if !child.is_leaf() {
            sibling.children = child.children.split_off(t);
        }
        let median = child.keys.pop().ok_or_else(|| {
            Error::corrupt(child.address().0, "no median key to promote")
        })?;

        parent.keys.insert(index, median);
        parent.children.insert(index + 1, Some(sibling.address()));

        self.store.write_node(&child)?;
        self.store.write_node(&sibling)?;
        self.store.write_node(parent)?;

        tracing::debug!(
            parent = parent.address().0,
            left = child.address().0,
            right = sibling.address().0,
            median = median.key,
            "split node"
        );
        Ok((child, sibling))
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Write a human-readable, indented pre-order listing of every node.
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "number of keys = {}", self.num_keys)?;

        let mut stack = vec![(self.store.root(), 0usize)];
        while let Some((address, depth)) = stack.pop() {
            let node = self.store.read_node(address)?;

            let keys = node
                .keys()
                .iter()
                .map(|e| e.key.to_string())
                .collect::<Vec<_>>()
                .join(",");
            let children = node
                .children()
                .iter()
                .map(|c| NodeAddress::to_raw(*c).to_string())
                .collect::<Vec<_>>()
                .join(",");

            writeln!(
                out,
                "{:indent$}(address = {}, root = {}, leaf = {}, n = {}, nc = {}) |{}| {{{}}}",
                "",
                address,
                if node.is_root() { 'R' } else { 'N' },
                if node.is_leaf() { 'L' } else { 'I' },
                node.len(),
                node.child_count(),
                keys,
                children,
                indent = depth * 4,
            )?;

            for child in node.children().iter().rev().flatten() {
                stack.push((*child, depth + 1));
            }
        }
        Ok(())
    }

    /// Sum the key counts of every reachable node.
    fn count_keys(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut visited = 0u64;
        let mut stack = vec![self.store.root()];

        while let Some(address) = stack.pop() {
            visited += 1;
            if visited > self.store.node_count() {
                return Err(Error::corrupt(address.0, "cycle in child pointers"));
            }
            let node = self.store.read_node(address)?;
            total += node.len() as u64;
            if !node.is_leaf() {
                stack.extend(node.children().iter().flatten());
            }
        }
        Ok(total)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of distinct keys stored.
    #[inline]
    pub fn num_keys(&self) -> u64 {
        self.num_keys
    }

    /// Number of node slots in the file.
    #[inline]
    pub fn node_count(&self) -> u64 {
        self.store.node_count()
    }

    #[inline]
    pub fn root_address(&self) -> NodeAddress {
        self.store.root()
    }

    /// Read the current root node.
    pub fn root_node(&self) -> Result<Node> {
        self.store.read_node(self.store.root())
    }

    /// Read any node by address.
    pub fn node(&self, address: NodeAddress) -> Result<Node> {
        self.store.read_node(address)
    }

    #[inline]
    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> &StoreStats {
        self.store.stats()
    }
}
