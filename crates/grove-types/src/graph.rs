use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::key::Key;
use crate::tag::TagName;

/// A slice of the predecessor DAG exchanged during synchronization.
///
/// `nodes` is the set of keys being transferred; `edges` is the
/// predecessor relation restricted to those nodes (plus, on pull, edges
/// into the receiver's frontier). Edge order is meaningful on the wire:
/// pulls emit edges in BFS discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// Keys carried by this slice.
    pub nodes: BTreeSet<Key>,
    /// Predecessor edges `(key, pred)`.
    pub edges: Vec<(Key, Key)>,
}

impl Graph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from parts.
    pub fn from_parts(nodes: BTreeSet<Key>, edges: Vec<(Key, Key)>) -> Self {
        Self { nodes, edges }
    }

    /// Returns `true` if the slice carries no nodes and no edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Number of nodes carried.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if `key` is carried by this slice.
    pub fn contains_node(&self, key: &Key) -> bool {
        self.nodes.contains(key)
    }

    /// Returns `true` if every edge endpoint is in `nodes` or satisfies
    /// `known`, i.e. the slice is closed relative to a receiver that
    /// already holds the `known` keys.
    pub fn closed_under(&self, mut known: impl FnMut(&Key) -> bool) -> bool {
        self.edges
            .iter()
            .flat_map(|(a, b)| [a, b])
            .all(|k| self.nodes.contains(k) || known(k))
    }

    /// The predecessor set of `key` as carried by this slice.
    pub fn preds_of(&self, key: &Key) -> BTreeSet<Key> {
        self.edges
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, p)| *p)
            .collect()
    }
}

/// An ordered list of `(tag, heads)` pairs with no tag repeated.
pub type TagBundle = Vec<(TagName, BTreeSet<Key>)>;

#[cfg(test)]
mod tests {
    use super::*;

    fn k(byte: u8) -> Key {
        Key::from_hash([byte; 32])
    }

    #[test]
    fn empty_graph() {
        let g = Graph::new();
        assert!(g.is_empty());
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn closed_when_endpoints_are_nodes() {
        let g = Graph::from_parts([k(1), k(2)].into(), vec![(k(2), k(1))]);
        assert!(g.closed_under(|_| false));
    }

    #[test]
    fn closed_via_known_fallback() {
        let g = Graph::from_parts([k(2)].into(), vec![(k(2), k(1))]);
        assert!(!g.closed_under(|_| false));
        assert!(g.closed_under(|key| *key == k(1)));
    }

    #[test]
    fn preds_of_collects_edge_targets() {
        let g = Graph::from_parts(
            [k(1), k(2), k(3)].into(),
            vec![(k(3), k(1)), (k(3), k(2)), (k(2), k(1))],
        );
        assert_eq!(g.preds_of(&k(3)), [k(1), k(2)].into());
        assert_eq!(g.preds_of(&k(1)), BTreeSet::new());
    }
}
