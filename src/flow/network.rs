//! Residual flow network with integer capacities and real costs
//!
//! Min-cost max-flow by successive shortest augmenting paths. Paths are
//! found with a queue based Bellman-Ford search, so negative arc costs are
//! allowed as long as no negative-cost cycle is reachable from the source.

use std::collections::VecDeque;

use crate::error::ResolveError;

/// Costs closer than this are treated as equal
const COST_EPSILON: f64 = 1e-12;

/// Handle of a forward arc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcId {
    node: usize,
    slot: usize,
}

#[derive(Debug, Clone)]
struct Arc {
    to: usize,
    capacity: u32,
    residual: u32,
    cost: f64,
    /// Slot of the paired arc in the adjacency list of `to`
    rev: usize,
}

/// Result of [`FlowNetwork::min_cost_max_flow`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSolution {
    /// Units sent from source to sink
    pub flow: u32,
    /// Sum of cost times flow over all arcs
    pub cost: f64,
    /// Number of augmenting paths used
    pub augmentations: usize,
}

/// Directed network stored as adjacency lists of residual arcs
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    adjacency: Vec<Vec<Arc>>,
}

impl FlowNetwork {
    /// Network with `num_nodes` nodes and no arcs
    pub fn new(num_nodes: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); num_nodes],
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    /// Add a node, returning its index
    pub fn add_node(&mut self) -> usize {
        self.adjacency.push(Vec::new());
        self.adjacency.len() - 1
    }

    /// Add an arc and its zero-capacity reverse arc
    pub fn add_arc(&mut self, from: usize, to: usize, capacity: u32, cost: f64) -> ArcId {
        let slot = self.adjacency[from].len();
        let rev = self.adjacency[to].len() + usize::from(from == to);
        self.adjacency[from].push(Arc {
            to,
            capacity,
            residual: capacity,
            cost,
            rev,
        });
        self.adjacency[to].push(Arc {
            to: from,
            capacity: 0,
            residual: 0,
            cost: -cost,
            rev: slot,
        });
        ArcId { node: from, slot }
    }

    /// Flow currently assigned to a forward arc
    #[inline]
    pub fn flow(&self, id: ArcId) -> u32 {
        let arc = &self.adjacency[id.node][id.slot];
        arc.capacity - arc.residual
    }

    /// Cheapest path distances from `source` in the residual network and
    /// the arc used to reach every node
    fn shortest_paths(
        &self,
        source: usize,
    ) -> Result<(Vec<f64>, Vec<Option<(usize, usize)>>), ResolveError> {
        let n = self.num_nodes();
        let mut dist = vec![f64::INFINITY; n];
        let mut parent = vec![None; n];
        let mut in_queue = vec![false; n];
        let mut enqueued = vec![0usize; n];
        let mut queue = VecDeque::new();

        dist[source] = 0.0;
        queue.push_back(source);
        in_queue[source] = true;

        while let Some(u) = queue.pop_front() {
            in_queue[u] = false;
            for (slot, arc) in self.adjacency[u].iter().enumerate() {
                if arc.residual == 0 {
                    continue;
                }
                let candidate = dist[u] + arc.cost;
                if candidate < dist[arc.to] - COST_EPSILON {
                    dist[arc.to] = candidate;
                    parent[arc.to] = Some((u, slot));
                    if !in_queue[arc.to] {
                        enqueued[arc.to] += 1;
                        if enqueued[arc.to] > n {
                            return Err(ResolveError::NegativeCycle { num_nodes: n });
                        }
                        in_queue[arc.to] = true;
                        queue.push_back(arc.to);
                    }
                }
            }
        }
        Ok((dist, parent))
    }

    /// Send as much flow as possible from `source` to `sink` at minimum cost
    pub fn min_cost_max_flow(
        &mut self,
        source: usize,
        sink: usize,
    ) -> Result<FlowSolution, ResolveError> {
        let mut solution = FlowSolution {
            flow: 0,
            cost: 0.0,
            augmentations: 0,
        };
        if source == sink {
            return Ok(solution);
        }

        loop {
            let (dist, parent) = self.shortest_paths(source)?;
            if !dist[sink].is_finite() {
                break;
            }

            // Bottleneck along the path
            let mut bottleneck = u32::MAX;
            let mut v = sink;
            while let Some((u, slot)) = parent[v] {
                bottleneck = bottleneck.min(self.adjacency[u][slot].residual);
                v = u;
            }

            let mut v = sink;
            while let Some((u, slot)) = parent[v] {
                let rev = self.adjacency[u][slot].rev;
                self.adjacency[u][slot].residual -= bottleneck;
                self.adjacency[v][rev].residual += bottleneck;
                v = u;
            }

            log::trace!(
                "Augmented {} units along a path of cost {:.4}",
                bottleneck,
                dist[sink]
            );
            solution.flow += bottleneck;
            solution.cost += f64::from(bottleneck) * dist[sink];
            solution.augmentations += 1;
        }
        Ok(solution)
    }
}
