//! Transition energies and capacities of resolved edges

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::graph::ResolvedGraph;
use crate::plugins::PluginRegistry;
use crate::types::{NodeKey, ObjectFeatures};

/// How the edge energies were obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CostSummary {
    /// Edges annotated
    pub num_edges: usize,
    /// Edges that received the fallback energy
    pub num_fallback: usize,
}

/// Energy of a transition between two objects
///
/// The weighted sum of the transition feature vector when weights, features
/// and transition plugins are all available, otherwise `None`.
pub fn transition_energy(
    a: Option<&ObjectFeatures>,
    b: Option<&ObjectFeatures>,
    registry: &PluginRegistry,
    config: &ResolverConfig,
) -> Result<Option<f64>, ResolveError> {
    if config.transition_weights.is_empty() || !registry.has_transition_features() {
        return Ok(None);
    }
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(None);
    };
    let vector = registry.transition_feature_vector(a, b, &config.selected_features)?;
    if vector.is_empty() {
        return Ok(None);
    }
    if vector.len() != config.transition_weights.len() {
        return Err(ResolveError::malformed(format!(
            "{} transition weights configured for {} transition features ({})",
            config.transition_weights.len(),
            vector.len(),
            registry
                .transition_feature_names(a, b, &config.selected_features)
                .join(", ")
        )));
    }
    Ok(Some(
        vector
            .iter()
            .zip(&config.transition_weights)
            .map(|(v, w)| v * w)
            .sum(),
    ))
}

/// Set energy and capacity of every resolved edge
pub fn annotate_edge_costs(
    resolved: &mut ResolvedGraph,
    features: &BTreeMap<NodeKey, ObjectFeatures>,
    registry: &PluginRegistry,
    config: &ResolverConfig,
) -> Result<CostSummary, ResolveError> {
    let endpoints: Vec<(NodeKey, NodeKey)> = resolved
        .edges()
        .into_iter()
        .map(|(from, to, _)| (from, to))
        .collect();

    let mut summary = CostSummary::default();
    for (from, to) in endpoints {
        let energy = transition_energy(features.get(&from), features.get(&to), registry, config)?;
        if energy.is_none() {
            summary.num_fallback += 1;
        }
        if let Some(edge) = resolved.edge_mut(&from, &to) {
            edge.energy = energy.unwrap_or(config.fallback_energy);
            edge.capacity = config.edge_capacity;
            log::trace!("Edge {} -> {}: energy {:.4}", from, to, edge.energy);
        }
        summary.num_edges += 1;
    }

    log::info!(
        "Annotated {} edges ({} with fallback energy {})",
        summary.num_edges,
        summary.num_fallback,
        config.fallback_energy
    );
    Ok(summary)
}
