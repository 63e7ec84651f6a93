//! Structural validation of a stored B-tree.
//!
//! These checks walk the whole tree and collect every problem they find
//! instead of stopping at the first. They are diagnostics: the engine does
//! not call them on its own.

use std::collections::HashSet;
use std::fmt;

use crate::common::{Error, NodeAddress, Result};
use crate::index::btree::BTree;
use crate::storage::Node;

/// One broken invariant at one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub address: NodeAddress,
    pub kind: ViolationKind,
}

/// What was wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// `n` outside the range allowed for this node.
    KeyCount { n: usize, min: usize, max: usize },
    /// Internal node without exactly `n + 1` children.
    ChildCount { expected: usize, found: usize },
    /// A child slot within `0..=n` of an internal node is empty.
    MissingChild { index: usize },
    /// Leaf with child pointers.
    LeafHasChildren { count: usize },
    /// `keys[index]` is not greater than `keys[index - 1]`.
    KeysOutOfOrder { index: usize },
    /// Key outside the range its parent's separators allow.
    KeyOutOfRange {
        index: usize,
        key: u64,
        lower: Option<u64>,
        upper: Option<u64>,
    },
    /// Root flag disagrees with the node's position.
    RootFlag { expected: bool },
    /// Leaf at a different depth than the first leaf found.
    LeafDepth { depth: usize, expected: usize },
    /// Node reached a second time.
    Revisited,
    /// Child pointer that could not be read as a node.
    Unreadable { reason: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}: ", self.address)?;
        match &self.kind {
            ViolationKind::KeyCount { n, min, max } => {
                write!(f, "holds {} keys, expected {}..={}", n, min, max)
            }
            ViolationKind::ChildCount { expected, found } => {
                write!(f, "has {} children, expected {}", found, expected)
            }
            ViolationKind::MissingChild { index } => write!(f, "child {} is missing", index),
            ViolationKind::LeafHasChildren { count } => {
                write!(f, "leaf has {} children", count)
            }
            ViolationKind::KeysOutOfOrder { index } => {
                write!(f, "key {} is not above key {}", index, index - 1)
            }
            ViolationKind::KeyOutOfRange {
                index,
                key,
                lower,
                upper,
            } => write!(
                f,
                "key {} ({}) outside ({}, {}]",
                index,
                key,
                lower.map_or("-inf".to_string(), |v| v.to_string()),
                upper.map_or("+inf".to_string(), |v| v.to_string()),
            ),
            ViolationKind::RootFlag { expected: true } => write!(f, "root is not flagged as root"),
            ViolationKind::RootFlag { expected: false } => write!(f, "non-root flagged as root"),
            ViolationKind::LeafDepth { depth, expected } => {
                write!(f, "leaf at depth {}, expected {}", depth, expected)
            }
            ViolationKind::Revisited => write!(f, "reached more than once"),
            ViolationKind::Unreadable { reason } => write!(f, "unreadable: {}", reason),
        }
    }
}

/// Result of [`BTree::check_structure`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureReport {
    /// Nodes successfully read and checked.
    pub nodes_checked: u64,
    /// Keys seen across those nodes.
    pub keys_checked: u64,
    pub violations: Vec<Violation>,
}

impl StructureReport {
    /// True when no violation was found.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    fn push(&mut self, address: NodeAddress, kind: ViolationKind) {
        let violation = Violation { address, kind };
        tracing::warn!(%violation, "b-tree invariant violated");
        self.violations.push(violation);
    }
}

/// Result of [`BTree::check_height`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightReport {
    /// Levels from root to leaf; a lone leaf root has height 1.
    pub actual: usize,
    /// Upper bound predicted from the key count and degree.
    pub predicted: usize,
    pub num_keys: u64,
    pub degree: u32,
}

impl HeightReport {
    pub fn within_bound(&self) -> bool {
        self.actual <= self.predicted
    }
}

impl fmt::Display for HeightReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "height {} (predicted <= {} for n={}, t={})",
            self.actual, self.predicted, self.num_keys, self.degree
        )
    }
}

/// Largest height, in levels, a B-tree of degree `t` holding `num_keys` keys
/// can have.
///
/// The classic bound `h <= log_t((n + 1) / 2)` counts edges from the root;
/// adding one converts it to levels.
pub fn predicted_height(num_keys: u64, degree: u32) -> usize {
    if num_keys <= 1 {
        return 1;
    }
    // (n + 1) / 2 without overflowing at u64::MAX
    let half = u128::from(num_keys / 2 + num_keys % 2);
    let t = u128::from(degree.max(2));

    let mut edges = 0;
    let mut power = t;
    while power <= half {
        power *= t;
        edges += 1;
    }
    edges + 1
}

/// A node queued for checking, with the key range its parent allows.
struct Pending {
    address: NodeAddress,
    depth: usize,
    /// Exclusive lower bound.
    lower: Option<u64>,
    /// Inclusive upper bound.
    upper: Option<u64>,
}

impl BTree {
    /// Walk every node reachable from the root and report each broken
    /// invariant.
    ///
    /// Unreadable children are reported and skipped. Only a failure to read
    /// the root, or an I/O error, is returned as `Err`.
    pub fn check_structure(&self) -> Result<StructureReport> {
        let mut report = StructureReport::default();
        let mut visited = HashSet::new();
        let mut leaf_depth: Option<usize> = None;

        let root = self.store.root();
        let mut stack = vec![Pending {
            address: root,
            depth: 1,
            lower: None,
            upper: None,
        }];

        while let Some(pending) = stack.pop() {
            if !visited.insert(pending.address) {
                report.push(pending.address, ViolationKind::Revisited);
                continue;
            }

            let node = match self.store.read_node(pending.address) {
                Ok(node) => node,
                Err(e @ Error::Io(_)) => return Err(e),
                Err(e) if pending.address == root => return Err(e),
                Err(e) => {
                    report.push(
                        pending.address,
                        ViolationKind::Unreadable {
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };
            report.nodes_checked += 1;
            report.keys_checked += node.len() as u64;

            self.check_node(&node, &pending, pending.address == root, &mut report);

            if node.is_leaf() {
                match leaf_depth {
                    None => leaf_depth = Some(pending.depth),
                    Some(expected) if expected != pending.depth => report.push(
                        node.address(),
                        ViolationKind::LeafDepth {
                            depth: pending.depth,
                            expected,
                        },
                    ),
                    Some(_) => {}
                }
                continue;
            }

            // Push in reverse so children are visited left to right.
            for index in (0..=node.len()).rev() {
                let Some(child) = node.child(index) else {
                    report.push(node.address(), ViolationKind::MissingChild { index });
                    continue;
                };
                let lower = match index {
                    0 => pending.lower,
                    _ => Some(node.keys()[index - 1].key),
                };
                let upper = if index < node.len() {
                    Some(node.keys()[index].key)
                } else {
                    pending.upper
                };
                stack.push(Pending {
                    address: child,
                    depth: pending.depth + 1,
                    lower,
                    upper,
                });
            }
        }

        tracing::debug!(
            nodes = report.nodes_checked,
            keys = report.keys_checked,
            violations = report.violations.len(),
            "structure check finished"
        );
        Ok(report)
    }

    /// Checks local to one node: counts, flags, ordering and parent range.
    fn check_node(&self, node: &Node, pending: &Pending, is_root: bool, report: &mut StructureReport) {
        let address = node.address();
        let n = node.len();
        let max = self.config().max_keys();

        if node.is_root() != is_root {
            report.push(address, ViolationKind::RootFlag { expected: is_root });
        }

        let min = match (is_root, node.is_leaf()) {
            (true, true) => 0,
            (true, false) => 1,
            (false, _) => self.config().min_keys(),
        };
        if n < min || n > max {
            report.push(address, ViolationKind::KeyCount { n, min, max });
        }

        if node.is_leaf() {
            let count = node.child_count();
            if count > 0 {
                report.push(address, ViolationKind::LeafHasChildren { count });
            }
        } else {
            let found = node.child_count();
            if found != n + 1 || node.children().len() != n + 1 {
                report.push(
                    address,
                    ViolationKind::ChildCount {
                        expected: n + 1,
                        found,
                    },
                );
            }
        }

        let keys = node.keys();
        for index in 1..n {
            if keys[index].key <= keys[index - 1].key {
                report.push(address, ViolationKind::KeysOutOfOrder { index });
            }
        }

        for (index, entry) in keys.iter().enumerate() {
            let below = pending.lower.is_some_and(|lo| entry.key <= lo);
            let above = pending.upper.is_some_and(|hi| entry.key > hi);
            if below || above {
                report.push(
                    address,
                    ViolationKind::KeyOutOfRange {
                        index,
                        key: entry.key,
                        lower: pending.lower,
                        upper: pending.upper,
                    },
                );
            }
        }
    }

    /// Compare the actual height with [`predicted_height`].
    pub fn check_height(&self) -> Result<HeightReport> {
        let report = HeightReport {
            actual: self.height()?,
            predicted: predicted_height(self.num_keys(), self.config().degree),
            num_keys: self.num_keys(),
            degree: self.config().degree,
        };

        if report.within_bound() {
            tracing::info!(%report, "height is good");
        } else {
            tracing::warn!(%report, "wrong height");
        }
        Ok(report)
    }

    /// Height of the tree: a leaf is 1, an internal node is one more than its
    /// tallest child.
    pub fn height(&self) -> Result<usize> {
        let root = self.store.read_node(self.store.root())?;
        self.subtree_height(&root, 1)
    }

    fn subtree_height(&self, node: &Node, depth: u64) -> Result<usize> {
        if node.is_leaf() {
            return Ok(1);
        }
        if depth > self.node_count() {
            return Err(Error::corrupt(node.address().0, "cycle in child pointers"));
        }

        let mut tallest = 0;
        for index in 0..=node.len() {
            let child = node.child(index).ok_or_else(|| {
                Error::corrupt(
                    node.address().0,
                    format!("missing child {} while measuring height", index),
                )
            })?;
            let child = self.store.read_node(child)?;
            tallest = tallest.max(self.subtree_height(&child, depth + 1)?);
        }
        Ok(tallest + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::BTreeConfig;
    use crate::storage::Entry;
    use tempfile::{tempdir, TempDir};

    fn create_tree(t: u32) -> (BTree, TempDir) {
        let dir = tempdir().unwrap();
        let config = BTreeConfig::new(16, t).with_sync_writes(false);
        let tree = BTree::open_or_create(dir.path().join("test.btree"), config).unwrap();
        (tree, dir)
    }

    fn kinds(report: &StructureReport) -> Vec<&ViolationKind> {
        report.violations.iter().map(|v| &v.kind).collect()
    }

    /// Root with keys [50] over two leaves, all written by hand.
    fn two_level(tree: &mut BTree, left: &[u64], right: &[u64]) -> (Node, Node, Node) {
        let left_addr = tree.store.allocate();
        let right_addr = tree.store.allocate();

        let mut l = Node::new(left_addr, true);
        l.keys = left.iter().map(|&k| Entry::new(k, 1)).collect();
        let mut r = Node::new(right_addr, true);
        r.keys = right.iter().map(|&k| Entry::new(k, 1)).collect();

        let mut root = tree.root_node().unwrap();
        root.is_leaf = false;
        root.keys = vec![Entry::new(50, 1)];
        root.children = vec![Some(left_addr), Some(right_addr)];

        tree.store.write_node(&l).unwrap();
        tree.store.write_node(&r).unwrap();
        tree.store.write_node(&root).unwrap();
        (root, l, r)
    }

    #[test]
    fn test_predicted_height() {
        assert_eq!(predicted_height(0, 2), 1);
        assert_eq!(predicted_height(1, 2), 1);
        assert_eq!(predicted_height(3, 2), 2);
        assert_eq!(predicted_height(4, 2), 2);
        assert_eq!(predicted_height(8, 2), 3);
        assert_eq!(predicted_height(1000, 4), 5);
        assert_eq!(predicted_height(u64::MAX, 2), 64);
    }

    #[test]
    fn test_empty_tree_is_valid() {
        let (tree, _dir) = create_tree(2);
        let report = tree.check_structure().unwrap();
        assert!(report.is_valid());
        assert_eq!(report.nodes_checked, 1);

        let height = tree.check_height().unwrap();
        assert_eq!(height.actual, 1);
        assert!(height.within_bound());
    }

    #[test]
    fn test_grown_tree_is_valid() {
        let (mut tree, _dir) = create_tree(2);
        for key in 0..100u64 {
            tree.insert((key * 7919) % 1000).unwrap();
        }
        let report = tree.check_structure().unwrap();
        assert!(report.is_valid(), "{:?}", report.violations);
        assert_eq!(report.keys_checked, tree.num_keys());
        assert_eq!(report.nodes_checked, tree.node_count());
        assert!(tree.check_height().unwrap().within_bound());
    }

    #[test]
    fn test_detects_underfull_child() {
        let (mut tree, _dir) = create_tree(3);
        two_level(&mut tree, &[10, 20], &[60]);

        let report = tree.check_structure().unwrap();
        assert_eq!(
            kinds(&report),
            vec![&ViolationKind::KeyCount { n: 1, min: 2, max: 5 }]
        );
    }

    #[test]
    fn test_detects_key_out_of_range() {
        let (mut tree, _dir) = create_tree(2);
        let (_, _, right) = two_level(&mut tree, &[10], &[40]);

        let report = tree.check_structure().unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].address, right.address());
        assert_eq!(
            report.violations[0].kind,
            ViolationKind::KeyOutOfRange {
                index: 0,
                key: 40,
                lower: Some(50),
                upper: None
            }
        );
    }

    #[test]
    fn test_detects_equal_key_in_right_subtree() {
        let (mut tree, _dir) = create_tree(2);
        two_level(&mut tree, &[10], &[50]);

        let report = tree.check_structure().unwrap();
        assert!(matches!(
            kinds(&report)[..],
            [ViolationKind::KeyOutOfRange { key: 50, .. }]
        ));
    }

    #[test]
    fn test_detects_unsorted_keys_and_leaf_children() {
        let (mut tree, _dir) = create_tree(3);
        let mut root = tree.root_node().unwrap();
        root.keys = vec![Entry::new(9, 1), Entry::new(3, 1), Entry::new(3, 1)];
        root.children = vec![None, Some(NodeAddress::new(20))];
        tree.store.write_node(&root).unwrap();

        let report = tree.check_structure().unwrap();
        assert!(kinds(&report).contains(&&ViolationKind::LeafHasChildren { count: 1 }));
        assert!(kinds(&report).contains(&&ViolationKind::KeysOutOfOrder { index: 1 }));
        assert!(kinds(&report).contains(&&ViolationKind::KeysOutOfOrder { index: 2 }));
    }

    #[test]
    fn test_detects_missing_child_and_keeps_going() {
        let (mut tree, _dir) = create_tree(2);
        let (mut root, left, _) = two_level(&mut tree, &[10], &[60]);
        root.children[1] = None;
        tree.store.write_node(&root).unwrap();

        let report = tree.check_structure().unwrap();
        assert!(kinds(&report).contains(&&ViolationKind::MissingChild { index: 1 }));
        assert!(kinds(&report).contains(&&ViolationKind::ChildCount {
            expected: 2,
            found: 1
        }));
        // the left leaf was still checked
        assert_eq!(report.nodes_checked, 2);
        assert!(report.violations.iter().all(|v| v.address != left.address()));
        assert!(tree.check_height().is_err());
    }

    #[test]
    fn test_detects_root_flag_and_revisit() {
        let (mut tree, _dir) = create_tree(2);
        let (mut root, mut left, _) = two_level(&mut tree, &[10], &[60]);
        left.is_root = true;
        tree.store.write_node(&left).unwrap();
        root.children[1] = Some(left.address());
        root.keys[0].key = 5;
        tree.store.write_node(&root).unwrap();

        let report = tree.check_structure().unwrap();
        let found = kinds(&report);
        assert!(found.contains(&&ViolationKind::RootFlag { expected: false }));
        assert!(found.contains(&&ViolationKind::Revisited));
    }

    #[test]
    fn test_detects_unreadable_child() {
        let (mut tree, _dir) = create_tree(2);
        let (mut root, _, _) = two_level(&mut tree, &[10], &[60]);
        root.children[1] = Some(NodeAddress::new(21));
        tree.store.write_node(&root).unwrap();

        let report = tree.check_structure().unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].address, NodeAddress::new(21));
        assert!(matches!(
            report.violations[0].kind,
            ViolationKind::Unreadable { .. }
        ));
    }

    #[test]
    fn test_detects_uneven_leaf_depth() {
        let (mut tree, _dir) = create_tree(2);
        let (mut root, _, _) = two_level(&mut tree, &[10], &[60]);

        // Replace the right leaf with an internal node over two leaves.
        let a = tree.store.allocate();
        let b = tree.store.allocate();
        let mid = tree.store.allocate();
        let mut la = Node::new(a, true);
        la.keys = vec![Entry::new(55, 1)];
        let mut lb = Node::new(b, true);
        lb.keys = vec![Entry::new(70, 1)];
        let mut m = Node::new(mid, false);
        m.keys = vec![Entry::new(60, 1)];
        m.children = vec![Some(a), Some(b)];
        for node in [&la, &lb, &m] {
            tree.store.write_node(node).unwrap();
        }
        root.children[1] = Some(mid);
        tree.store.write_node(&root).unwrap();

        let report = tree.check_structure().unwrap();
        assert_eq!(
            kinds(&report),
            vec![
                &ViolationKind::LeafDepth {
                    depth: 3,
                    expected: 2
                },
                &ViolationKind::LeafDepth {
                    depth: 3,
                    expected: 2
                },
            ]
        );
        assert_eq!(tree.height().unwrap(), 3);
    }

    #[test]
    fn test_violation_display() {
        let v = Violation {
            address: NodeAddress::new(96),
            kind: ViolationKind::KeyCount { n: 0, min: 1, max: 3 },
        };
        assert_eq!(v.to_string(), "node 96: holds 0 keys, expected 1..=3");
    }
}
