//! Per-frame merger expansion
//!
//! Frames are visited in ascending order. In each frame every detection
//! still present in the resolved graph is fitted by the merger resolver,
//! using the fits of its unresolved predecessors as initialization. A
//! detection holding `count > 1` objects is relabeled in the label image and
//! replaced in the resolved graph by `count` new nodes that inherit its
//! current edges. Object features of the frame's resolved nodes are computed
//! right away, after which the frame's images are dropped (unless retained).

use std::collections::{BTreeMap, HashSet};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::ResolverConfig;
use crate::error::{PluginError, ResolveError};
use crate::graph::{FitStore, ResolvedGraph, UnresolvedGraph};
use crate::index::TimestepIndex;
use crate::plugins::PluginRegistry;
use crate::reporter::PipelineReporter;
use crate::types::{Fits, Label, LabelImage, NodeKey, ObjectFeatures, RawImage, ShapeFit};

/// Everything the expansion produces besides the rewired graph
#[derive(Debug, Clone, Default)]
pub struct ExpansionOutput {
    /// Fits of every processed detection, keyed by its unresolved node
    pub fits: FitStore,
    /// Object features of every resolved node
    pub features: BTreeMap<NodeKey, ObjectFeatures>,
    /// Relabeled label images (only with `retain_label_images`)
    pub label_images: BTreeMap<usize, LabelImage>,
    /// Frames whose images were loaded
    pub frames_loaded: Vec<usize>,
    /// Number of mergers replaced by sub-objects
    pub num_expanded: usize,
}

/// Runs the per-frame expansion with a fixed plugin set
#[derive(Debug, Clone, Copy)]
pub struct MergerExpander<'a> {
    registry: &'a PluginRegistry,
    config: &'a ResolverConfig,
}

fn plugin_failure(plugin: &str, context: String, err: PluginError) -> ResolveError {
    let err = ResolveError::plugin(plugin, context, err);
    log::error!("{}", err);
    err
}

impl<'a> MergerExpander<'a> {
    pub fn new(registry: &'a PluginRegistry, config: &'a ResolverConfig) -> Self {
        Self { registry, config }
    }

    /// Expand all mergers of `resolved`, frame by frame
    pub fn run<R: PipelineReporter>(
        &self,
        index: &TimestepIndex,
        unresolved: &UnresolvedGraph,
        resolved: &mut ResolvedGraph,
        reporter: &mut R,
    ) -> Result<ExpansionOutput, ResolveError> {
        let provider = self.registry.image_provider();
        let mut output = ExpansionOutput::default();
        let mut ndims = None;

        for &t in &index.timesteps {
            if self.config.skip_empty_frames && resolved.nodes_at(t).is_empty() {
                log::debug!("Frame {}: no merger related nodes, skipping", t);
                continue;
            }

            let mut label_image = provider.label_image(t).map_err(|e| {
                plugin_failure(provider.name(), format!("label image of frame {}", t), e)
            })?;
            output.num_expanded += self.resolve_frame(
                t,
                index,
                unresolved,
                resolved,
                &mut label_image,
                &mut output.fits,
                reporter,
            )?;

            let frame_ndims = match ndims {
                Some(n) => n,
                None => {
                    let n = self.spatial_dims()?;
                    ndims = Some(n);
                    n
                }
            };
            self.frame_features(t, frame_ndims, resolved, &label_image, &mut output.features)?;

            output.frames_loaded.push(t);
            reporter.on_frame_resolved(t, resolved);
            if self.config.retain_label_images {
                output.label_images.insert(t, label_image);
            }
        }

        log::info!(
            "Expanded {} mergers over {} frames, resolved graph has {} nodes and {} edges",
            output.num_expanded,
            output.frames_loaded.len(),
            resolved.node_count(),
            resolved.edge_count()
        );
        Ok(output)
    }

    /// Number of spatial axes longer than one pixel
    fn spatial_dims(&self) -> Result<usize, ResolveError> {
        let provider = self.registry.image_provider();
        let shape = provider
            .image_shape()
            .map_err(|e| plugin_failure(provider.name(), "image shape".to_string(), e))?;
        let ndims = shape.iter().filter(|&&s| s > 1).count();
        log::debug!(
            "Image shape {:?} ({}D), object feature plugins: {:?}",
            shape,
            ndims,
            self.registry.object_feature_plugins_for(ndims)
        );
        Ok(ndims)
    }

    /// Fit every detection of one frame; returns the number of expansions
    #[allow(clippy::too_many_arguments)]
    fn resolve_frame<R: PipelineReporter>(
        &self,
        timestep: usize,
        index: &TimestepIndex,
        unresolved: &UnresolvedGraph,
        resolved: &mut ResolvedGraph,
        label_image: &mut LabelImage,
        fits: &mut FitStore,
        reporter: &mut R,
    ) -> Result<usize, ResolveError> {
        let resolver = self.registry.merger_resolver();
        let max_label = label_image.iter().copied().max().unwrap_or(0);
        let mut next_id = max_label.checked_add(1).ok_or_else(|| {
            ResolveError::invariant(format!("frame {} has no free label left", timestep))
        })?;
        let mut visited = HashSet::new();
        let mut expanded = 0;

        for &label in index.detections_at(timestep) {
            let node = NodeKey::label(timestep, label);
            if !visited.insert(label) || !resolved.contains(&node) {
                continue;
            }
            let count = index.merger_count(timestep, label).unwrap_or(1);

            let initializations: Vec<ShapeFit> = unresolved
                .predecessors(&node)
                .iter()
                .filter_map(|pred| fits.get(pred))
                .flat_map(|f| f.iter().cloned())
                .collect();

            // Labels next_id..end go to the sub-objects
            let end = next_id.checked_add(count.saturating_sub(1)).ok_or_else(|| {
                ResolveError::invariant(format!(
                    "frame {} has no {} free labels left for node {}",
                    timestep, count, node
                ))
            })?;

            let fitted = resolver
                .resolve_merger(label_image, label, next_id, count, &initializations)
                .map_err(|e| {
                    plugin_failure(
                        resolver.name(),
                        format!("frame {}, node {}, count {}", timestep, node, count),
                        e,
                    )
                })?;
            if fitted.len() != count as usize {
                return Err(ResolveError::invariant(format!(
                    "resolver '{}' returned {} fits for node {} with {} objects",
                    resolver.name(),
                    fitted.len(),
                    node,
                    count
                )));
            }

            let replacements: Vec<NodeKey> = if count > 1 {
                let keys: Vec<NodeKey> = (next_id..=end)
                    .map(|label| NodeKey::label(timestep, label))
                    .collect();
                resolved.expand_node(&node, &keys)?;
                next_id = end.saturating_add(1);
                expanded += 1;
                keys
            } else {
                Vec::new()
            };

            reporter.on_merger_resolved(&node, &replacements, &fitted);
            fits.insert(node, Fits::from_vec(fitted));
        }
        Ok(expanded)
    }

    /// Label a resolved node occupies in the label image
    fn feature_label(resolved: &ResolvedGraph, key: &NodeKey) -> Option<Label> {
        key.as_label().or_else(|| {
            resolved
                .node(key)
                .and_then(|n| n.origin)
                .and_then(|origin| origin.as_label())
        })
    }

    fn frame_features(
        &self,
        timestep: usize,
        ndims: usize,
        resolved: &ResolvedGraph,
        label_image: &LabelImage,
        features: &mut BTreeMap<NodeKey, ObjectFeatures>,
    ) -> Result<(), ResolveError> {
        let nodes = resolved.nodes_at(timestep);
        if nodes.is_empty() {
            return Ok(());
        }
        let provider = self.registry.image_provider();
        let raw: RawImage = provider.raw_image(timestep).map_err(|e| {
            plugin_failure(provider.name(), format!("raw image of frame {}", timestep), e)
        })?;

        let targets: Vec<(NodeKey, Label)> = nodes
            .into_iter()
            .filter_map(|key| match Self::feature_label(resolved, &key) {
                Some(label) => Some((key, label)),
                None => {
                    log::warn!("Node {} has no label, skipping its features", key);
                    None
                }
            })
            .collect();

        type Computed = Result<(NodeKey, ObjectFeatures), ResolveError>;
        let compute = |(key, label): &(NodeKey, Label)| -> Computed {
            let mask = label_image.mapv(|v| Label::from(v == *label));
            let object = self
                .registry
                .compute_object_features(ndims, &raw, &mask, timestep)
                .map_err(|e| {
                    log::error!("Features of node {}: {}", key, e);
                    e
                })?;
            Ok((*key, object))
        };

        #[cfg(feature = "rayon")]
        let computed = targets
            .par_iter()
            .map(compute)
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(not(feature = "rayon"))]
        let computed = targets
            .iter()
            .map(compute)
            .collect::<Result<Vec<_>, _>>()?;

        log::trace!("Frame {}: features of {} nodes", timestep, computed.len());
        features.extend(computed);
        Ok(())
    }
}
