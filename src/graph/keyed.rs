//! Directed graph addressed by [`NodeKey`] instead of arena indices
//!
//! Backed by a `petgraph` `StableDiGraph` so that node removal keeps the
//! remaining indices valid. Petgraph reuses freed slots, so nodes and edges
//! also carry an insertion sequence number; every iterator below yields in
//! insertion order, which is what "first outgoing edge" refers to.

use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::types::NodeKey;

use super::{EdgeRecord, NodeRecord};

#[derive(Debug, Clone)]
struct NodeEntry {
    key: NodeKey,
    seq: u64,
    record: NodeRecord,
}

#[derive(Debug, Clone)]
struct EdgeEntry {
    seq: u64,
    record: EdgeRecord,
}

/// Node/edge counts for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_mergers: usize,
    pub num_divisions: usize,
}

/// Keyed directed graph without parallel edges
#[derive(Debug, Clone, Default)]
pub struct KeyedGraph {
    graph: StableDiGraph<NodeEntry, EdgeEntry>,
    lookup: HashMap<NodeKey, NodeIndex>,
    next_seq: u64,
}

impl KeyedGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Number of nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether a node exists
    #[inline]
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.lookup.contains_key(key)
    }

    /// Add a node; returns `false` and leaves the graph untouched if it exists
    pub fn add_node(&mut self, key: NodeKey, record: NodeRecord) -> bool {
        if self.lookup.contains_key(&key) {
            return false;
        }
        let seq = self.bump();
        let idx = self.graph.add_node(NodeEntry { key, seq, record });
        self.lookup.insert(key, idx);
        true
    }

    /// Node attributes
    pub fn node(&self, key: &NodeKey) -> Option<&NodeRecord> {
        let idx = *self.lookup.get(key)?;
        self.graph.node_weight(idx).map(|n| &n.record)
    }

    /// Mutable node attributes
    pub fn node_mut(&mut self, key: &NodeKey) -> Option<&mut NodeRecord> {
        let idx = *self.lookup.get(key)?;
        self.graph.node_weight_mut(idx).map(|n| &mut n.record)
    }

    /// Remove a node and all incident edges
    pub fn remove_node(&mut self, key: &NodeKey) -> Option<NodeRecord> {
        let idx = self.lookup.remove(key)?;
        self.graph.remove_node(idx).map(|n| n.record)
    }

    fn find_edge(&self, from: &NodeKey, to: &NodeKey) -> Option<EdgeIndex> {
        let a = *self.lookup.get(from)?;
        let b = *self.lookup.get(to)?;
        self.graph.find_edge(a, b)
    }

    /// Whether the edge `from -> to` exists
    #[inline]
    pub fn contains_edge(&self, from: &NodeKey, to: &NodeKey) -> bool {
        self.find_edge(from, to).is_some()
    }

    /// Add an edge between existing nodes
    ///
    /// Returns `false` if an endpoint is missing or the edge already exists.
    pub fn add_edge(&mut self, from: &NodeKey, to: &NodeKey, record: EdgeRecord) -> bool {
        let (Some(&a), Some(&b)) = (self.lookup.get(from), self.lookup.get(to)) else {
            return false;
        };
        if self.graph.find_edge(a, b).is_some() {
            return false;
        }
        let seq = self.bump();
        self.graph.add_edge(a, b, EdgeEntry { seq, record });
        true
    }

    /// Remove the edge `from -> to`
    pub fn remove_edge(&mut self, from: &NodeKey, to: &NodeKey) -> Option<EdgeRecord> {
        let e = self.find_edge(from, to)?;
        self.graph.remove_edge(e).map(|e| e.record)
    }

    /// Edge attributes
    pub fn edge(&self, from: &NodeKey, to: &NodeKey) -> Option<&EdgeRecord> {
        let e = self.find_edge(from, to)?;
        self.graph.edge_weight(e).map(|e| &e.record)
    }

    /// Mutable edge attributes
    pub fn edge_mut(&mut self, from: &NodeKey, to: &NodeKey) -> Option<&mut EdgeRecord> {
        let e = self.find_edge(from, to)?;
        self.graph.edge_weight_mut(e).map(|e| &mut e.record)
    }

    fn neighbors(&self, key: &NodeKey, dir: Direction) -> Vec<NodeKey> {
        let Some(&idx) = self.lookup.get(key) else {
            return Vec::new();
        };
        let mut adjacent: Vec<(u64, NodeKey)> = self
            .graph
            .edges_directed(idx, dir)
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.weight().seq, self.graph[other].key)
            })
            .collect();
        adjacent.sort_unstable_by_key(|&(seq, _)| seq);
        adjacent.into_iter().map(|(_, k)| k).collect()
    }

    /// Targets of outgoing edges, in edge insertion order
    pub fn successors(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Sources of incoming edges, in edge insertion order
    pub fn predecessors(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.neighbors(key, Direction::Incoming)
    }

    /// Number of outgoing edges
    pub fn out_degree(&self, key: &NodeKey) -> usize {
        self.lookup.get(key).map_or(0, |&idx| {
            self.graph.edges_directed(idx, Direction::Outgoing).count()
        })
    }

    /// Number of incoming edges
    pub fn in_degree(&self, key: &NodeKey) -> usize {
        self.lookup.get(key).map_or(0, |&idx| {
            self.graph.edges_directed(idx, Direction::Incoming).count()
        })
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> Vec<(NodeKey, &NodeRecord)> {
        let mut nodes: Vec<&NodeEntry> = self
            .graph
            .node_indices()
            .map(|idx| &self.graph[idx])
            .collect();
        nodes.sort_unstable_by_key(|n| n.seq);
        nodes.into_iter().map(|n| (n.key, &n.record)).collect()
    }

    /// All node keys in insertion order
    pub fn node_keys(&self) -> Vec<NodeKey> {
        self.nodes().into_iter().map(|(k, _)| k).collect()
    }

    /// Node, edge, merger and division counts
    pub fn summary(&self) -> GraphSummary {
        let nodes = self.nodes();
        GraphSummary {
            num_nodes: nodes.len(),
            num_edges: self.edge_count(),
            num_mergers: nodes.iter().filter(|(_, n)| n.is_merger()).count(),
            num_divisions: nodes.iter().filter(|(_, n)| n.is_division).count(),
        }
    }

    /// All edges in insertion order
    pub fn edges(&self) -> Vec<(NodeKey, NodeKey, &EdgeRecord)> {
        let mut edges: Vec<(u64, NodeKey, NodeKey, &EdgeRecord)> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let entry = &self.graph[e];
                Some((entry.seq, self.graph[a].key, self.graph[b].key, &entry.record))
            })
            .collect();
        edges.sort_unstable_by_key(|&(seq, ..)| seq);
        edges.into_iter().map(|(_, a, b, r)| (a, b, r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(t: usize, l: u32) -> NodeKey {
        NodeKey::label(t, l)
    }

    #[test]
    fn test_neighbors_follow_insertion_order() {
        let mut g = KeyedGraph::new();
        for k in [key(0, 1), key(1, 3), key(1, 2)] {
            g.add_node(k, NodeRecord::default());
        }
        g.add_edge(&key(0, 1), &key(1, 3), EdgeRecord::default());
        g.add_edge(&key(0, 1), &key(1, 2), EdgeRecord::default());
        assert_eq!(g.successors(&key(0, 1)), vec![key(1, 3), key(1, 2)]);
        assert_eq!(g.predecessors(&key(1, 2)), vec![key(0, 1)]);
    }

    #[test]
    fn test_no_parallel_edges_and_missing_endpoints() {
        let mut g = KeyedGraph::new();
        g.add_node(key(0, 1), NodeRecord::default());
        g.add_node(key(1, 1), NodeRecord::default());
        assert!(g.add_edge(&key(0, 1), &key(1, 1), EdgeRecord::default()));
        assert!(!g.add_edge(&key(0, 1), &key(1, 1), EdgeRecord::default()));
        assert!(!g.add_edge(&key(0, 1), &key(5, 5), EdgeRecord::default()));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut g = KeyedGraph::new();
        for k in [key(0, 1), key(1, 1), key(2, 1)] {
            g.add_node(k, NodeRecord::default());
        }
        g.add_edge(&key(0, 1), &key(1, 1), EdgeRecord::default());
        g.add_edge(&key(1, 1), &key(2, 1), EdgeRecord::default());
        assert!(g.remove_node(&key(1, 1)).is_some());
        assert!(!g.contains(&key(1, 1)));
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.out_degree(&key(0, 1)), 0);

        // Re-added nodes go to the end of the iteration order
        g.add_node(key(1, 1), NodeRecord::default());
        assert_eq!(g.node_keys().last(), Some(&key(1, 1)));
    }
}
