//! Min-cost max-flow matching on the resolved graph
//!
//! Every resolved node becomes two flow nodes, an in-half and an out-half,
//! joined by one arc of capacity `edge_capacity`, so an object takes part in
//! at most one accepted incoming and one outgoing match. Resolved edges run
//! from out-half to in-half. A source and a sink terminal are added: nodes
//! without incoming edges are fed from the source, nodes without outgoing
//! edges drain into the sink. The flow on every edge is written back onto
//! the graph; edges carrying flow are the accepted matches.

pub mod network;

use std::collections::HashMap;

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::graph::ResolvedGraph;
use crate::types::NodeKey;

pub use network::{ArcId, FlowNetwork, FlowSolution};

/// Flow carried by one edge of the resolved graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeFlow {
    pub from: NodeKey,
    pub to: NodeKey,
    pub flow: u32,
}

/// Outcome of the flow solve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowAssignment {
    /// Units sent from source to sink
    pub total_flow: u32,
    /// Total energy of the flow
    pub total_cost: f64,
    /// Flow of every resolved graph edge, in edge order
    pub edge_flows: Vec<EdgeFlow>,
    /// Edges carrying flow
    pub matches: Vec<(NodeKey, NodeKey)>,
    /// Nodes receiving flow from the source
    pub sources: Vec<NodeKey>,
    /// Nodes sending flow into the sink
    pub sinks: Vec<NodeKey>,
}

impl FlowAssignment {
    /// Accepted successor of a node, if any
    pub fn matched_successor(&self, key: &NodeKey) -> Option<NodeKey> {
        self.matches
            .iter()
            .find(|(from, _)| from == key)
            .map(|(_, to)| *to)
    }

    /// Accepted predecessor of a node, if any
    pub fn matched_predecessor(&self, key: &NodeKey) -> Option<NodeKey> {
        self.matches
            .iter()
            .find(|(_, to)| to == key)
            .map(|(from, _)| *from)
    }
}

/// Solve min-cost max-flow on the resolved graph and annotate edge flows
pub fn solve_flow(
    resolved: &mut ResolvedGraph,
    config: &ResolverConfig,
) -> Result<FlowAssignment, ResolveError> {
    let keys = resolved.node_keys();
    let position: HashMap<NodeKey, usize> =
        keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    let in_half = |i: usize| 2 * i;
    let out_half = |i: usize| 2 * i + 1;

    let mut network = FlowNetwork::new(2 * keys.len());
    let source = network.add_node();
    let sink = network.add_node();

    for i in 0..keys.len() {
        network.add_arc(in_half(i), out_half(i), config.edge_capacity, 0.0);
    }

    let mut edge_arcs = Vec::with_capacity(resolved.edge_count());
    for (from, to, record) in resolved.edges() {
        let (Some(&u), Some(&v)) = (position.get(&from), position.get(&to)) else {
            return Err(ResolveError::invariant(format!(
                "edge {} -> {} references a missing node",
                from, to
            )));
        };
        if !record.energy.is_finite() {
            return Err(ResolveError::invariant(format!(
                "edge {} -> {} has non-finite energy {}",
                from, to, record.energy
            )));
        }
        let arc = network.add_arc(out_half(u), in_half(v), record.capacity, record.energy);
        edge_arcs.push((from, to, arc));
    }

    let mut source_arcs = Vec::new();
    let mut sink_arcs = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        if resolved.in_degree(key) == 0 {
            let arc =
                network.add_arc(source, in_half(i), config.edge_capacity, config.terminal_energy);
            source_arcs.push((*key, arc));
        }
        if resolved.out_degree(key) == 0 {
            let arc =
                network.add_arc(out_half(i), sink, config.edge_capacity, config.terminal_energy);
            sink_arcs.push((*key, arc));
        }
    }
    log::debug!(
        "Flow network: {} nodes, {} edges, {} source arcs, {} sink arcs",
        network.num_nodes(),
        edge_arcs.len(),
        source_arcs.len(),
        sink_arcs.len()
    );

    let solution = network.min_cost_max_flow(source, sink)?;

    let mut edge_flows = Vec::with_capacity(edge_arcs.len());
    let mut matches = Vec::new();
    for (from, to, arc) in edge_arcs {
        let flow = network.flow(arc);
        if let Some(edge) = resolved.edge_mut(&from, &to) {
            edge.flow = flow;
        }
        if flow > 0 {
            log::trace!("Match {} -> {} (flow {})", from, to, flow);
            matches.push((from, to));
        }
        edge_flows.push(EdgeFlow { from, to, flow });
    }

    let carrying = |arcs: Vec<(NodeKey, ArcId)>| -> Vec<NodeKey> {
        arcs.into_iter()
            .filter(|(_, arc)| network.flow(*arc) > 0)
            .map(|(key, _)| key)
            .collect()
    };
    let assignment = FlowAssignment {
        total_flow: solution.flow,
        total_cost: solution.cost,
        edge_flows,
        matches,
        sources: carrying(source_arcs),
        sinks: carrying(sink_arcs),
    };

    log::info!(
        "Min-cost max-flow: flow {} at cost {:.4} ({} matches, {} augmentations)",
        assignment.total_flow,
        assignment.total_cost,
        assignment.matches.len(),
        solution.augmentations
    );
    Ok(assignment)
}
