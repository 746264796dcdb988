//! Observability for merger resolving.
//!
//! The [`PipelineReporter`] trait receives callbacks after each stage of
//! [`MergerResolvingPipeline`](crate::pipeline::MergerResolvingPipeline)
//! without polluting the stages themselves.
//!
//! - [`NoOpReporter`] - empty callbacks, optimized away
//! - [`DebugReporter`] - captures snapshots for tests and research
//! - [`LoggingReporter`] - forwards events to the `log` facade
//! - [`CompositeReporter`] - fans events out to two reporters

use crate::costs::CostSummary;
use crate::flow::FlowAssignment;
use crate::graph::{GraphSnapshot, GraphSummary, ResolvedGraph, UnresolvedGraph};
use crate::index::TimestepIndex;
use crate::types::{NodeKey, ShapeFit};

// ============================================================================
// PipelineReporter Trait
// ============================================================================

/// Observability trait for pipeline execution.
///
/// All methods have default empty implementations, so you only need to
/// override the events you care about. Callbacks take `&mut self`; data is
/// passed by reference and must be cloned to be kept.
///
/// # Example
///
/// ```
/// use merger_resolver_rs::reporter::PipelineReporter;
/// use merger_resolver_rs::types::{NodeKey, ShapeFit};
///
/// struct MergerCounter {
///     mergers: usize,
/// }
///
/// impl PipelineReporter for MergerCounter {
///     fn on_merger_resolved(
///         &mut self,
///         _node: &NodeKey,
///         _replacements: &[NodeKey],
///         _fits: &[ShapeFit],
///     ) {
///         self.mergers += 1;
///     }
/// }
/// ```
pub trait PipelineReporter {
    /// Called after the per-timestep index is built.
    fn on_index_built(&mut self, _index: &TimestepIndex) {}

    /// Called after the unresolved merger graph is built.
    fn on_unresolved_graph(&mut self, _graph: &UnresolvedGraph) {}

    /// Called after division parents are split.
    fn on_divisions_split(&mut self, _graph: &ResolvedGraph) {}

    /// Called after one detection was fitted.
    ///
    /// `replacements` is empty when the detection holds a single object.
    fn on_merger_resolved(
        &mut self,
        _node: &NodeKey,
        _replacements: &[NodeKey],
        _fits: &[ShapeFit],
    ) {
    }

    /// Called after all detections of a frame are resolved and their
    /// features computed.
    fn on_frame_resolved(&mut self, _timestep: usize, _graph: &ResolvedGraph) {}

    /// Called after edge energies are annotated.
    fn on_costs_annotated(&mut self, _summary: &CostSummary, _graph: &ResolvedGraph) {}

    /// Called after the flow is solved and written back.
    fn on_flow_solved(&mut self, _assignment: &FlowAssignment) {}
}

// ============================================================================
// NoOpReporter
// ============================================================================

/// Reporter that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl NoOpReporter {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineReporter for NoOpReporter {}

// ============================================================================
// DebugReporter
// ============================================================================

/// One fitted detection as seen by [`DebugReporter`]
#[derive(Debug, Clone, PartialEq)]
pub struct MergerEvent {
    pub node: NodeKey,
    pub replacements: Vec<NodeKey>,
    pub fits: Vec<ShapeFit>,
}

/// Reporter that captures every event.
///
/// Graph snapshots are cloned, which is fine for tests and small inputs.
#[derive(Debug, Clone, Default)]
pub struct DebugReporter {
    timesteps: Vec<usize>,
    unresolved: Option<GraphSummary>,
    split: Option<GraphSnapshot>,
    mergers: Vec<MergerEvent>,
    frames: Vec<(usize, GraphSummary)>,
    costs: Option<(CostSummary, GraphSnapshot)>,
    assignment: Option<FlowAssignment>,
}

impl DebugReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Timesteps of the index
    pub fn timesteps(&self) -> &[usize] {
        &self.timesteps
    }

    pub fn unresolved_summary(&self) -> Option<&GraphSummary> {
        self.unresolved.as_ref()
    }

    /// Resolved graph right after division splitting
    pub fn split_snapshot(&self) -> Option<&GraphSnapshot> {
        self.split.as_ref()
    }

    pub fn merger_events(&self) -> &[MergerEvent] {
        &self.mergers
    }

    /// Graph counts after every processed frame
    pub fn frame_events(&self) -> &[(usize, GraphSummary)] {
        &self.frames
    }

    pub fn costs(&self) -> Option<&(CostSummary, GraphSnapshot)> {
        self.costs.as_ref()
    }

    pub fn assignment(&self) -> Option<&FlowAssignment> {
        self.assignment.as_ref()
    }

    pub fn total_events(&self) -> usize {
        usize::from(!self.timesteps.is_empty())
            + usize::from(self.unresolved.is_some())
            + usize::from(self.split.is_some())
            + self.mergers.len()
            + self.frames.len()
            + usize::from(self.costs.is_some())
            + usize::from(self.assignment.is_some())
    }
}

impl PipelineReporter for DebugReporter {
    fn on_index_built(&mut self, index: &TimestepIndex) {
        self.timesteps = index.timesteps.clone();
    }

    fn on_unresolved_graph(&mut self, graph: &UnresolvedGraph) {
        self.unresolved = Some(graph.summary());
    }

    fn on_divisions_split(&mut self, graph: &ResolvedGraph) {
        self.split = Some(graph.snapshot());
    }

    fn on_merger_resolved(&mut self, node: &NodeKey, replacements: &[NodeKey], fits: &[ShapeFit]) {
        self.mergers.push(MergerEvent {
            node: *node,
            replacements: replacements.to_vec(),
            fits: fits.to_vec(),
        });
    }

    fn on_frame_resolved(&mut self, timestep: usize, graph: &ResolvedGraph) {
        self.frames.push((timestep, graph.summary()));
    }

    fn on_costs_annotated(&mut self, summary: &CostSummary, graph: &ResolvedGraph) {
        self.costs = Some((*summary, graph.snapshot()));
    }

    fn on_flow_solved(&mut self, assignment: &FlowAssignment) {
        self.assignment = Some(assignment.clone());
    }
}

// ============================================================================
// LoggingReporter
// ============================================================================

/// Reporter that logs events via the `log` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReporter {
    verbose: bool,
}

impl LoggingReporter {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    /// Also log every fitted detection and every match
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl PipelineReporter for LoggingReporter {
    fn on_index_built(&mut self, index: &TimestepIndex) {
        log::info!("Index built: {} timesteps", index.timesteps.len());
    }

    fn on_unresolved_graph(&mut self, graph: &UnresolvedGraph) {
        let s = graph.summary();
        log::info!(
            "Merger graph: {} nodes, {} edges, {} mergers",
            s.num_nodes,
            s.num_edges,
            s.num_mergers
        );
    }

    fn on_divisions_split(&mut self, graph: &ResolvedGraph) {
        log::debug!("Divisions split: {} duplicates", graph.num_division_copies());
    }

    fn on_merger_resolved(&mut self, node: &NodeKey, replacements: &[NodeKey], fits: &[ShapeFit]) {
        if self.verbose {
            log::info!(
                "Resolved {} into {} objects ({} new nodes)",
                node,
                fits.len(),
                replacements.len()
            );
            for (i, fit) in fits.iter().enumerate() {
                log::debug!(
                    "  Fit {}: weight={:.1}, mean={:?}",
                    i,
                    fit.weight,
                    fit.mean.as_slice()
                );
            }
        } else {
            log::debug!("Resolved {} into {} objects", node, fits.len());
        }
    }

    fn on_frame_resolved(&mut self, timestep: usize, graph: &ResolvedGraph) {
        log::trace!(
            "Frame {} done: resolved graph has {} nodes",
            timestep,
            graph.node_count()
        );
    }

    fn on_costs_annotated(&mut self, summary: &CostSummary, _graph: &ResolvedGraph) {
        log::debug!(
            "Costs: {} edges, {} fallback",
            summary.num_edges,
            summary.num_fallback
        );
    }

    fn on_flow_solved(&mut self, assignment: &FlowAssignment) {
        log::info!(
            "Flow solved: {} units, cost {:.4}, {} matches",
            assignment.total_flow,
            assignment.total_cost,
            assignment.matches.len()
        );
        if self.verbose {
            for (from, to) in &assignment.matches {
                log::debug!("  {} -> {}", from, to);
            }
        }
    }
}

// ============================================================================
// CompositeReporter
// ============================================================================

/// Reporter that forwards every event to two reporters.
#[derive(Debug, Clone)]
pub struct CompositeReporter<A: PipelineReporter, B: PipelineReporter> {
    first: A,
    second: B,
}

impl<A: PipelineReporter, B: PipelineReporter> CompositeReporter<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: PipelineReporter, B: PipelineReporter> PipelineReporter for CompositeReporter<A, B> {
    fn on_index_built(&mut self, index: &TimestepIndex) {
        self.first.on_index_built(index);
        self.second.on_index_built(index);
    }

    fn on_unresolved_graph(&mut self, graph: &UnresolvedGraph) {
        self.first.on_unresolved_graph(graph);
        self.second.on_unresolved_graph(graph);
    }

    fn on_divisions_split(&mut self, graph: &ResolvedGraph) {
        self.first.on_divisions_split(graph);
        self.second.on_divisions_split(graph);
    }

    fn on_merger_resolved(&mut self, node: &NodeKey, replacements: &[NodeKey], fits: &[ShapeFit]) {
        self.first.on_merger_resolved(node, replacements, fits);
        self.second.on_merger_resolved(node, replacements, fits);
    }

    fn on_frame_resolved(&mut self, timestep: usize, graph: &ResolvedGraph) {
        self.first.on_frame_resolved(timestep, graph);
        self.second.on_frame_resolved(timestep, graph);
    }

    fn on_costs_annotated(&mut self, summary: &CostSummary, graph: &ResolvedGraph) {
        self.first.on_costs_annotated(summary, graph);
        self.second.on_costs_annotated(summary, graph);
    }

    fn on_flow_solved(&mut self, assignment: &FlowAssignment) {
        self.first.on_flow_solved(assignment);
        self.second.on_flow_solved(assignment);
    }
}
