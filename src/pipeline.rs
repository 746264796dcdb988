//! End-to-end merger resolving
//!
//! [`MergerResolvingPipeline::run`] chains the stages:
//!
//! 1. traxel/unique-id mapping (and tracklet validation)
//! 2. per-timestep index of detections, mergers, links and divisions
//! 3. unresolved merger graph
//! 4. division splitting into the resolved graph
//! 5. per-frame merger expansion and feature computation
//! 6. edge energies
//! 7. min-cost max-flow

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::costs::{annotate_edge_costs, CostSummary};
use crate::error::ResolveError;
use crate::expand::MergerExpander;
use crate::flow::{solve_flow, FlowAssignment};
use crate::graph::{
    split_divisions, FitStore, GraphSnapshot, GraphSummary, ResolvedGraph, UnresolvedGraph,
};
use crate::index::{TimestepIndex, TraxelMapping};
use crate::model::{HypothesesModel, TrackingResult};
use crate::plugins::PluginRegistry;
use crate::reporter::{NoOpReporter, PipelineReporter};
use crate::types::{LabelImage, NodeKey, ObjectFeatures, ShapeFit};

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct ResolutionOutput {
    pub mapping: TraxelMapping,
    pub index: TimestepIndex,
    /// Merger graph as chosen by the solver
    pub unresolved: UnresolvedGraph,
    /// Graph with divisions split, mergers expanded and flows annotated
    pub resolved: ResolvedGraph,
    /// Fits per unresolved node
    pub fits: FitStore,
    /// Features per resolved node
    pub features: BTreeMap<NodeKey, ObjectFeatures>,
    /// Relabeled frames, if retained
    pub label_images: BTreeMap<usize, LabelImage>,
    pub costs: CostSummary,
    pub assignment: FlowAssignment,
}

/// Fits of one unresolved node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitRecord {
    pub node: NodeKey,
    pub fits: Vec<ShapeFit>,
}

/// Features of one resolved node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub node: NodeKey,
    pub features: ObjectFeatures,
}

/// JSON friendly summary of a [`ResolutionOutput`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionReport {
    pub version: String,
    pub timesteps: Vec<usize>,
    pub unresolved: GraphSummary,
    pub resolved: GraphSnapshot,
    pub fits: Vec<FitRecord>,
    pub features: Vec<FeatureRecord>,
    pub costs: CostSummary,
    pub assignment: FlowAssignment,
}

impl ResolutionOutput {
    /// Build the serializable report
    pub fn report(&self) -> ResolutionReport {
        ResolutionReport {
            version: crate::VERSION.to_string(),
            timesteps: self.index.timesteps.clone(),
            unresolved: self.unresolved.summary(),
            resolved: self.resolved.snapshot(),
            fits: self
                .fits
                .iter()
                .map(|(node, fits)| FitRecord {
                    node: *node,
                    fits: fits.to_vec(),
                })
                .collect(),
            features: self
                .features
                .iter()
                .map(|(node, features)| FeatureRecord {
                    node: *node,
                    features: features.clone(),
                })
                .collect(),
            costs: self.costs,
            assignment: self.assignment.clone(),
        }
    }
}

/// Merger resolving pipeline
#[derive(Debug, Clone, Default)]
pub struct MergerResolvingPipeline {
    config: ResolverConfig,
}

impl MergerResolvingPipeline {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Run all stages without a reporter
    pub fn run_silent(
        &self,
        model: &HypothesesModel,
        result: &TrackingResult,
        registry: &PluginRegistry,
    ) -> Result<ResolutionOutput, ResolveError> {
        self.run(model, result, registry, &mut NoOpReporter)
    }

    /// Run all stages
    pub fn run<R: PipelineReporter>(
        &self,
        model: &HypothesesModel,
        result: &TrackingResult,
        registry: &PluginRegistry,
        reporter: &mut R,
    ) -> Result<ResolutionOutput, ResolveError> {
        self.config.validate()?;
        log::debug!("Running with {:?}", registry);

        let mapping = TraxelMapping::from_model(model)?;
        if self.config.validate_tracklets {
            mapping.validate_contiguity()?;
        }

        let index = TimestepIndex::build(&mapping, result)?;
        reporter.on_index_built(&index);

        let unresolved = UnresolvedGraph::build(&index)?;
        reporter.on_unresolved_graph(&unresolved);

        let mut resolved = split_divisions(&unresolved)?;
        reporter.on_divisions_split(&resolved);

        let expansion = MergerExpander::new(registry, &self.config).run(
            &index,
            &unresolved,
            &mut resolved,
            reporter,
        )?;

        let costs =
            annotate_edge_costs(&mut resolved, &expansion.features, registry, &self.config)?;
        reporter.on_costs_annotated(&costs, &resolved);

        let assignment = solve_flow(&mut resolved, &self.config)?;
        reporter.on_flow_solved(&assignment);

        Ok(ResolutionOutput {
            mapping,
            index,
            unresolved,
            resolved,
            fits: expansion.fits,
            features: expansion.features,
            label_images: expansion.label_images,
            costs,
            assignment,
        })
    }
}
