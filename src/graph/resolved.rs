//! Mutable working graph that divisions and mergers are resolved on

use serde::Serialize;

use crate::error::ResolveError;
use crate::types::NodeKey;

use super::keyed::{GraphSummary, KeyedGraph};
use super::unresolved::UnresolvedGraph;
use super::{EdgeRecord, NodeRecord};

/// Resolved graph under construction
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    graph: KeyedGraph,
    num_division_copies: usize,
}

/// Serializable view of one edge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSnapshot {
    pub from: NodeKey,
    pub to: NodeKey,
    pub energy: f64,
    pub capacity: u32,
    pub flow: u32,
}

/// Serializable view of the whole graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<(NodeKey, NodeRecord)>,
    pub edges: Vec<EdgeSnapshot>,
}

impl ResolvedGraph {
    /// Start from a copy of the unresolved graph
    pub fn from_unresolved(unresolved: &UnresolvedGraph) -> Self {
        Self {
            graph: unresolved.graph().clone(),
            num_division_copies: 0,
        }
    }

    /// Underlying keyed graph
    #[inline]
    pub fn graph(&self) -> &KeyedGraph {
        &self.graph
    }

    #[inline]
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.graph.contains(key)
    }

    #[inline]
    pub fn node(&self, key: &NodeKey) -> Option<&NodeRecord> {
        self.graph.node(key)
    }

    #[inline]
    pub fn node_mut(&mut self, key: &NodeKey) -> Option<&mut NodeRecord> {
        self.graph.node_mut(key)
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[inline]
    pub fn predecessors(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.graph.predecessors(key)
    }

    #[inline]
    pub fn successors(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.graph.successors(key)
    }

    #[inline]
    pub fn in_degree(&self, key: &NodeKey) -> usize {
        self.graph.in_degree(key)
    }

    #[inline]
    pub fn out_degree(&self, key: &NodeKey) -> usize {
        self.graph.out_degree(key)
    }

    /// Allocate the key of the next division duplicate
    pub fn next_division_copy(&mut self, timestep: usize) -> NodeKey {
        let key = NodeKey::division_copy(timestep, self.num_division_copies);
        self.num_division_copies += 1;
        key
    }

    /// Number of division duplicates created so far
    #[inline]
    pub fn num_division_copies(&self) -> usize {
        self.num_division_copies
    }

    /// Add a node; `false` if the key is taken
    pub fn add_node(&mut self, key: NodeKey, record: NodeRecord) -> bool {
        self.graph.add_node(key, record)
    }

    /// Add an edge with default attributes
    pub fn add_edge(&mut self, from: &NodeKey, to: &NodeKey) -> bool {
        self.graph.add_edge(from, to, EdgeRecord::default())
    }

    /// Re-attach the edge `from -> to` so that it starts at `new_from`
    pub fn move_edge(
        &mut self,
        from: &NodeKey,
        to: &NodeKey,
        new_from: &NodeKey,
    ) -> Result<(), ResolveError> {
        let record = self.graph.remove_edge(from, to).ok_or_else(|| {
            ResolveError::invariant(format!("cannot move missing edge {} -> {}", from, to))
        })?;
        if !self.graph.add_edge(new_from, to, record) {
            return Err(ResolveError::invariant(format!(
                "cannot attach edge {} -> {}",
                new_from, to
            )));
        }
        Ok(())
    }

    /// Remove a node and its edges
    pub fn remove_node(&mut self, key: &NodeKey) -> Option<NodeRecord> {
        self.graph.remove_node(key)
    }

    /// Replace `original` by `replacements`, each receiving a copy of every
    /// current in- and out-edge of `original`
    pub fn expand_node(
        &mut self,
        original: &NodeKey,
        replacements: &[NodeKey],
    ) -> Result<(), ResolveError> {
        if !self.graph.contains(original) {
            return Err(ResolveError::invariant(format!(
                "cannot expand missing node {}",
                original
            )));
        }
        let predecessors = self.graph.predecessors(original);
        let successors = self.graph.successors(original);

        for key in replacements {
            if !self.graph.add_node(*key, NodeRecord::derived_from(*original)) {
                return Err(ResolveError::invariant(format!(
                    "node {} already exists while expanding {}",
                    key, original
                )));
            }
            for pred in &predecessors {
                self.graph.add_edge(pred, key, EdgeRecord::default());
            }
            for succ in &successors {
                self.graph.add_edge(key, succ, EdgeRecord::default());
            }
        }

        self.graph.remove_node(original);
        log::debug!(
            "Expanded {} into {} nodes ({} in, {} out edges each)",
            original,
            replacements.len(),
            predecessors.len(),
            successors.len()
        );
        Ok(())
    }

    /// Nodes of one frame, in insertion order
    pub fn nodes_at(&self, timestep: usize) -> Vec<NodeKey> {
        self.graph
            .node_keys()
            .into_iter()
            .filter(|k| k.timestep == timestep)
            .collect()
    }

    /// All node keys in insertion order
    #[inline]
    pub fn node_keys(&self) -> Vec<NodeKey> {
        self.graph.node_keys()
    }

    /// All edges in insertion order
    #[inline]
    pub fn edges(&self) -> Vec<(NodeKey, NodeKey, &EdgeRecord)> {
        self.graph.edges()
    }

    #[inline]
    pub fn edge(&self, from: &NodeKey, to: &NodeKey) -> Option<&EdgeRecord> {
        self.graph.edge(from, to)
    }

    #[inline]
    pub fn edge_mut(&mut self, from: &NodeKey, to: &NodeKey) -> Option<&mut EdgeRecord> {
        self.graph.edge_mut(from, to)
    }

    /// Counts for reporting
    #[inline]
    pub fn summary(&self) -> GraphSummary {
        self.graph.summary()
    }

    /// Serializable copy of nodes and edges
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self
                .graph
                .nodes()
                .into_iter()
                .map(|(k, n)| (k, n.clone()))
                .collect(),
            edges: self
                .graph
                .edges()
                .into_iter()
                .map(|(from, to, e)| EdgeSnapshot {
                    from,
                    to,
                    energy: e.energy,
                    capacity: e.capacity,
                    flow: e.flow,
                })
                .collect(),
        }
    }
}
