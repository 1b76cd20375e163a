//! Chronological flight history kept in an AVL tree.
//!
//! Nodes live in an index arena and both insertion and traversal walk the
//! tree with an explicit stack. Entries are keyed by `(timestamp, sequence)`:
//! the sequence is a per-tree insertion counter, so flights sharing a
//! timestamp keep their insertion order no matter how the tree rotates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One landed (or crashed) flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: u64,
    pub sequence: u64,
    pub flight_id: String,
}

impl HistoryEntry {
    fn key(&self) -> (u64, u64) {
        (self.timestamp, self.sequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone)]
struct AvlNode {
    entry: HistoryEntry,
    left: Option<usize>,
    right: Option<usize>,
    height: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FlightHistory {
    nodes: Vec<AvlNode>,
    root: Option<usize>,
    next_sequence: u64,
}

impl FlightHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Height of the tree (0 when empty).
    pub fn height(&self) -> u32 {
        self.height_of(self.root)
    }

    /// Record `flight_id` as arriving at `timestamp`.
    pub fn insert(&mut self, flight_id: impl Into<String>, timestamp: u64) {
        let entry = HistoryEntry {
            timestamp,
            sequence: self.next_sequence,
            flight_id: flight_id.into(),
        };
        self.next_sequence += 1;
        let key = entry.key();
        tracing::debug!(flight_id = %entry.flight_id, timestamp, "history entry added");

        let index = self.nodes.len();
        self.nodes.push(AvlNode {
            entry,
            left: None,
            right: None,
            height: 1,
        });

        let mut path: Vec<(usize, Side)> = Vec::new();
        let mut cursor = self.root;
        while let Some(current) = cursor {
            let node = &self.nodes[current];
            let side = if key < node.entry.key() {
                Side::Left
            } else {
                Side::Right
            };
            path.push((current, side));
            cursor = match side {
                Side::Left => node.left,
                Side::Right => node.right,
            };
        }

        // Re-link and rebalance bottom-up; each level may hand back a new
        // subtree root after rotating.
        let mut subtree = index;
        for &(parent, side) in path.iter().rev() {
            self.set_child(parent, side, Some(subtree));
            subtree = self.rebalance(parent, key);
        }
        self.root = Some(subtree);
    }

    /// Entries in chronological order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            history: self,
            stack: Vec::new(),
            cursor: self.root,
        }
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        let mut cursor = self.root?;
        while let Some(right) = self.nodes[cursor].right {
            cursor = right;
        }
        Some(&self.nodes[cursor].entry)
    }

    /// Detach every entry. Aircraft are owned by the registry and stay put.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    fn height_of(&self, node: Option<usize>) -> u32 {
        node.map(|idx| self.nodes[idx].height).unwrap_or(0)
    }

    fn balance_factor(&self, idx: usize) -> i64 {
        let node = &self.nodes[idx];
        i64::from(self.height_of(node.left)) - i64::from(self.height_of(node.right))
    }

    fn update_height(&mut self, idx: usize) {
        let node = &self.nodes[idx];
        let height = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.nodes[idx].height = height;
    }

    fn set_child(&mut self, parent: usize, side: Side, child: Option<usize>) {
        match side {
            Side::Left => self.nodes[parent].left = child,
            Side::Right => self.nodes[parent].right = child,
        }
    }

    fn rotate_right(&mut self, y: usize) -> usize {
        let Some(x) = self.nodes[y].left else {
            return y;
        };
        let t2 = self.nodes[x].right;
        self.nodes[x].right = Some(y);
        self.nodes[y].left = t2;
        self.update_height(y);
        self.update_height(x);
        x
    }

    fn rotate_left(&mut self, x: usize) -> usize {
        let Some(y) = self.nodes[x].right else {
            return x;
        };
        let t2 = self.nodes[y].left;
        self.nodes[y].left = Some(x);
        self.nodes[x].right = t2;
        self.update_height(x);
        self.update_height(y);
        y
    }

    /// Restore the AVL invariant at `idx` after `key` was inserted below it.
    fn rebalance(&mut self, idx: usize, key: (u64, u64)) -> usize {
        self.update_height(idx);
        let balance = self.balance_factor(idx);

        if balance > 1 {
            if let Some(left) = self.nodes[idx].left {
                if key.cmp(&self.nodes[left].entry.key()) == Ordering::Greater {
                    let rotated = self.rotate_left(left);
                    self.nodes[idx].left = Some(rotated);
                }
                return self.rotate_right(idx);
            }
        } else if balance < -1 {
            if let Some(right) = self.nodes[idx].right {
                if key.cmp(&self.nodes[right].entry.key()) == Ordering::Less {
                    let rotated = self.rotate_right(right);
                    self.nodes[idx].right = Some(rotated);
                }
                return self.rotate_left(idx);
            }
        }
        idx
    }
}

/// In-order iterator over a [`FlightHistory`].
pub struct Iter<'a> {
    history: &'a FlightHistory,
    stack: Vec<usize>,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a HistoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let history = self.history;
        while let Some(idx) = self.cursor {
            self.stack.push(idx);
            self.cursor = history.nodes[idx].left;
        }
        let idx = self.stack.pop()?;
        let node = &history.nodes[idx];
        self.cursor = node.right;
        Some(&node.entry)
    }
}

impl<'a> IntoIterator for &'a FlightHistory {
    type Item = &'a HistoryEntry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
