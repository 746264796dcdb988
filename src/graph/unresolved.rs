//! Graph of mergers and their direct neighbors
//!
//! A link enters the graph if its source at `t - 1` or its destination at
//! `t` is a merger. Both endpoints become nodes tagged with their division
//! flag and object count.

use crate::error::ResolveError;
use crate::index::TimestepIndex;
use crate::types::{Label, NodeKey};

use super::keyed::{GraphSummary, KeyedGraph};
use super::{EdgeRecord, NodeRecord};

/// Read-only snapshot of the merger neighborhood
#[derive(Debug, Clone, Default)]
pub struct UnresolvedGraph {
    graph: KeyedGraph,
}

impl UnresolvedGraph {
    /// Build the graph from the per-timestep index
    pub fn build(index: &TimestepIndex) -> Result<Self, ResolveError> {
        let mut graph = KeyedGraph::new();

        for &t in &index.timesteps {
            let Some(prev) = t.checked_sub(1) else {
                continue;
            };
            for &(a, b) in index.links_at(t) {
                if !(index.is_merger(prev, a) || index.is_merger(t, b)) {
                    continue;
                }
                let source = NodeKey::label(prev, a);
                let target = NodeKey::label(t, b);
                for (key, label) in [(source, a), (target, b)] {
                    if !graph.contains(&key) {
                        graph.add_node(key, Self::node_record(index, key.timestep, label)?);
                    }
                }
                graph.add_edge(&source, &target, EdgeRecord::default());
            }
        }

        let built = Self { graph };
        let summary = built.summary();
        log::info!(
            "Unresolved graph: {} nodes ({} mergers, {} divisions), {} edges",
            summary.num_nodes,
            summary.num_mergers,
            summary.num_divisions,
            summary.num_edges
        );
        Ok(built)
    }

    fn node_record(
        index: &TimestepIndex,
        timestep: usize,
        label: Label,
    ) -> Result<NodeRecord, ResolveError> {
        let is_division = index.is_dividing(timestep, label);
        let merger_count = index.merger_count(timestep, label).unwrap_or(1);
        if is_division && merger_count > 1 {
            return Err(ResolveError::invariant(format!(
                "node {} is both a division and a merger of {} objects",
                NodeKey::label(timestep, label),
                merger_count
            )));
        }
        Ok(NodeRecord {
            is_division,
            merger_count,
            ..NodeRecord::default()
        })
    }

    /// Wrap an already assembled graph
    pub fn from_graph(graph: KeyedGraph) -> Self {
        Self { graph }
    }

    /// Underlying keyed graph
    #[inline]
    pub fn graph(&self) -> &KeyedGraph {
        &self.graph
    }

    /// Whether the node exists
    #[inline]
    pub fn contains(&self, key: &NodeKey) -> bool {
        self.graph.contains(key)
    }

    /// Node attributes
    #[inline]
    pub fn node(&self, key: &NodeKey) -> Option<&NodeRecord> {
        self.graph.node(key)
    }

    /// Sources of incoming edges
    #[inline]
    pub fn predecessors(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.graph.predecessors(key)
    }

    /// Targets of outgoing edges
    #[inline]
    pub fn successors(&self, key: &NodeKey) -> Vec<NodeKey> {
        self.graph.successors(key)
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

    /// Counts for reporting
    #[inline]
    pub fn summary(&self) -> GraphSummary {
        self.graph.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn index(
        timesteps: &[usize],
        mergers: &[(usize, Label, u32)],
        links: &[(usize, Label, Label)],
        divisions: &[(usize, Label, [Label; 2])],
    ) -> TimestepIndex {
        let mut idx = TimestepIndex {
            timesteps: timesteps.to_vec(),
            mergers: timesteps.iter().map(|&t| (t, BTreeMap::new())).collect(),
            detections: timesteps.iter().map(|&t| (t, Vec::new())).collect(),
            links: timesteps.iter().map(|&t| (t, Vec::new())).collect(),
            divisions: timesteps.iter().map(|&t| (t, BTreeMap::new())).collect(),
            with_divisions: !divisions.is_empty(),
        };
        for &(t, l, c) in mergers {
            idx.mergers.get_mut(&t).unwrap().insert(l, c);
        }
        for &(t, a, b) in links {
            idx.links.get_mut(&t).unwrap().push((a, b));
        }
        for &(t, p, c) in divisions {
            idx.divisions.get_mut(&t).unwrap().insert(p, c);
        }
        idx
    }

    #[test]
    fn test_only_merger_links_are_kept() {
        // 0:1 -> 1:1 (merger) -> 2:1, and an unrelated chain 0:2 -> 1:2 -> 2:2
        let idx = index(
            &[0, 1, 2],
            &[(1, 1, 2)],
            &[(1, 1, 1), (1, 2, 2), (2, 1, 1), (2, 2, 2)],
            &[],
        );
        let g = UnresolvedGraph::build(&idx).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.node(&NodeKey::label(1, 1)).unwrap().merger_count, 2);
        assert_eq!(g.node(&NodeKey::label(0, 1)).unwrap().merger_count, 1);
        assert!(!g.contains(&NodeKey::label(1, 2)));
    }

    #[test]
    fn test_division_flag_on_parent() {
        // 0:1 divides into 1:1 and 1:2, 1:1 is a merger
        let idx = index(
            &[0, 1],
            &[(1, 1, 2)],
            &[(1, 1, 1), (1, 1, 2)],
            &[(1, 1, [1, 2])],
        );
        let g = UnresolvedGraph::build(&idx).unwrap();
        assert!(g.node(&NodeKey::label(0, 1)).unwrap().is_division);
        assert!(!g.node(&NodeKey::label(1, 1)).unwrap().is_division);
        // 1:2 is not adjacent to a merger
        assert!(!g.contains(&NodeKey::label(1, 2)));
    }

    #[test]
    fn test_division_and_merger_is_rejected() {
        // 0:1 is a merger of 2 and also divides
        let idx = index(
            &[0, 1],
            &[(0, 1, 2)],
            &[(1, 1, 1), (1, 1, 2)],
            &[(1, 1, [1, 2])],
        );
        let err = UnresolvedGraph::build(&idx).unwrap_err();
        assert!(matches!(err, ResolveError::InvariantViolation { .. }));
    }

    #[test]
    fn test_without_divisions_no_node_is_flagged() {
        let idx = index(&[0, 1], &[(0, 1, 3)], &[(1, 1, 1), (1, 1, 2)], &[]);
        let g = UnresolvedGraph::build(&idx).unwrap();
        assert_eq!(g.summary().num_divisions, 0);
        assert_eq!(g.summary().num_mergers, 1);
    }
}
