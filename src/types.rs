//! Core value types shared by every stage
//!
//! Identifiers are small `Copy` keys so that both graph generations can
//! refer to the same detection without sharing node storage.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::{DMatrix, DVector};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Solver-side identifier of a detection (possibly a whole tracklet)
pub type UniqueId = u64;

/// Segmentation label of one object within a frame
pub type Label = u32;

/// Labeled segmentation of one frame (0 is background)
pub type LabelImage = ArrayD<Label>;

/// Raw intensities of one frame
pub type RawImage = ArrayD<f32>;

/// Per-object feature dictionary (scalars are stored as length-1 vectors)
pub type ObjectFeatures = BTreeMap<String, Vec<f64>>;

/// Fitted shapes of one detection (one entry per contained object)
pub type Fits = SmallVec<[ShapeFit; 4]>;

/// A single detection, identified by frame and local label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraxelId {
    /// Frame index
    pub timestep: usize,
    /// Label of the detection within its frame
    pub index: Label,
}

impl TraxelId {
    /// Create a new traxel id
    pub fn new(timestep: usize, index: Label) -> Self {
        Self { timestep, index }
    }
}

impl fmt::Display for TraxelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.timestep, self.index)
    }
}

/// Frame-local part of a graph node key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeLocal {
    /// A segmentation label (original detection or split sub-object)
    Label(Label),
    /// The n-th duplicate created for a dividing parent
    DivisionCopy(usize),
}

/// Key of a node in the unresolved or resolved graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// Frame index
    pub timestep: usize,
    /// Label or synthetic duplicate index
    pub local: NodeLocal,
}

impl NodeKey {
    /// Key of a labeled object
    pub fn label(timestep: usize, label: Label) -> Self {
        Self {
            timestep,
            local: NodeLocal::Label(label),
        }
    }

    /// Key of a division duplicate
    pub fn division_copy(timestep: usize, n: usize) -> Self {
        Self {
            timestep,
            local: NodeLocal::DivisionCopy(n),
        }
    }

    /// Segmentation label, if this key refers to one
    #[inline]
    pub fn as_label(&self) -> Option<Label> {
        match self.local {
            NodeLocal::Label(l) => Some(l),
            NodeLocal::DivisionCopy(_) => None,
        }
    }
}

impl From<TraxelId> for NodeKey {
    fn from(id: TraxelId) -> Self {
        NodeKey::label(id.timestep, id.index)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local {
            NodeLocal::Label(l) => write!(f, "({}, {})", self.timestep, l),
            NodeLocal::DivisionCopy(n) => write!(f, "({}, div-{})", self.timestep, n),
        }
    }
}

/// Shape fitted to one object inside a (possibly merged) region
///
/// Represented as a weighted Gaussian over pixel coordinates, which is
/// what the fit of the next frame uses as its prior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeFit {
    /// Relative size of the object (pixel count)
    pub weight: f64,
    /// Center in pixel coordinates
    pub mean: DVector<f64>,
    /// Spatial spread in pixel coordinates
    pub covariance: DMatrix<f64>,
}

impl ShapeFit {
    /// Create a new shape fit
    pub fn new(weight: f64, mean: DVector<f64>, covariance: DMatrix<f64>) -> Self {
        Self {
            weight,
            mean,
            covariance,
        }
    }

    /// Spatial dimensionality
    #[inline]
    pub fn ndim(&self) -> usize {
        self.mean.len()
    }
}
