//! Splitting of dividing parents
//!
//! A parent with two outgoing links gets a duplicate node; one of the two
//! links (the first one inserted) is moved onto the duplicate so that each
//! child is reached from its own copy of the parent.

use crate::error::ResolveError;

use super::resolved::ResolvedGraph;
use super::unresolved::UnresolvedGraph;
use super::NodeRecord;

/// Create the initial resolved graph, with division parents split
pub fn split_divisions(unresolved: &UnresolvedGraph) -> Result<ResolvedGraph, ResolveError> {
    let mut resolved = ResolvedGraph::from_unresolved(unresolved);

    for (parent, record) in unresolved.graph().nodes() {
        if !record.is_division {
            continue;
        }
        let children = unresolved.successors(&parent);
        if children.len() != 2 {
            log::warn!(
                "Division {} has {} outgoing edges in the merger graph, leaving it unsplit",
                parent,
                children.len()
            );
            continue;
        }

        let duplicate = resolved.next_division_copy(parent.timestep);
        resolved.add_node(duplicate, NodeRecord::derived_from(parent));
        resolved.move_edge(&parent, &children[0], &duplicate)?;
        if let Some(node) = resolved.node_mut(&parent) {
            node.duplicate = Some(duplicate);
        }
        log::debug!(
            "Split division {}: {} -> {}, {} -> {}",
            parent,
            duplicate,
            children[0],
            parent,
            children[1]
        );
    }

    log::info!(
        "Split {} division nodes",
        resolved.num_division_copies()
    );
    Ok(resolved)
}
