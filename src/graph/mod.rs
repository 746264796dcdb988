//! Merger-resolving graphs
//!
//! Two generations of the same graph are involved:
//!
//! - [`UnresolvedGraph`] - mergers and their direct neighbors as the solver
//!   chose them. Immutable once built; fitted shapes are kept beside it in a
//!   [`FitStore`].
//! - [`ResolvedGraph`] - the working copy. Division parents are split by
//!   [`split_divisions`], mergers are expanded into sub-objects, and edge
//!   costs and flows are annotated on it.

pub mod division;
pub mod keyed;
pub mod resolved;
pub mod unresolved;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Fits, NodeKey};

pub use division::split_divisions;
pub use keyed::{GraphSummary, KeyedGraph};
pub use resolved::{EdgeSnapshot, GraphSnapshot, ResolvedGraph};
pub use unresolved::UnresolvedGraph;

/// Fitted shapes written back per unresolved node, read as priors by the
/// next frame
pub type FitStore = BTreeMap<NodeKey, Fits>;

/// Node attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Parent of an active division
    pub is_division: bool,
    /// Number of objects the detection contains (1 = not a merger)
    pub merger_count: u32,
    /// Node this one was duplicated or split from
    pub origin: Option<NodeKey>,
    /// Duplicate created for a split division parent
    pub duplicate: Option<NodeKey>,
}

impl Default for NodeRecord {
    fn default() -> Self {
        Self {
            is_division: false,
            merger_count: 1,
            origin: None,
            duplicate: None,
        }
    }
}

impl NodeRecord {
    /// Ordinary node derived from `origin`
    pub fn derived_from(origin: NodeKey) -> Self {
        Self {
            origin: Some(origin),
            ..Self::default()
        }
    }

    /// Whether this node stands for more than one object
    #[inline]
    pub fn is_merger(&self) -> bool {
        self.merger_count > 1
    }
}

/// Edge attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Transition cost
    pub energy: f64,
    /// Flow capacity
    pub capacity: u32,
    /// Flow assigned by the solver
    pub flow: u32,
}

impl Default for EdgeRecord {
    fn default() -> Self {
        Self {
            energy: 0.0,
            capacity: 1,
            flow: 0,
        }
    }
}
