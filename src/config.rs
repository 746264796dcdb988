//! Configuration types
//!
//! [`ResolverConfig`] controls the pipeline and the edge cost model,
//! [`KMeansConfig`] the bundled merger resolver. Both deserialize from JSON
//! with every field optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Transition energy used when no feature based energy is available
    pub fallback_energy: f64,
    /// Weights applied to the transition feature vector
    pub transition_weights: Vec<f64>,
    /// Feature names handed to transition feature plugins
    pub selected_features: Vec<String>,
    /// Capacity of every transition and terminal arc
    pub edge_capacity: u32,
    /// Energy of arcs from the source and into the sink
    pub terminal_energy: f64,
    /// Reject tracklets that skip a timestep
    pub validate_tracklets: bool,
    /// Do not load frames without any resolved node
    pub skip_empty_frames: bool,
    /// Keep the relabeled label images in the output
    pub retain_label_images: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fallback_energy: 0.5,
            transition_weights: Vec::new(),
            selected_features: vec!["RegionCenter".to_string()],
            edge_capacity: 1,
            terminal_energy: 0.0,
            validate_tracklets: true,
            skip_empty_frames: true,
            retain_label_images: false,
        }
    }
}

impl ResolverConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self, ResolveError> {
        let text = std::fs::read_to_string(path).map_err(|e| ResolveError::Io {
            path: path.display().to_string(),
            description: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Parse from a JSON string
    pub fn from_json_str(text: &str) -> Result<Self, ResolveError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ResolveError> {
        if !self.fallback_energy.is_finite() || !self.terminal_energy.is_finite() {
            return Err(ResolveError::malformed("energies must be finite"));
        }
        if self.edge_capacity == 0 {
            return Err(ResolveError::malformed("edge capacity must be positive"));
        }
        if self.transition_weights.iter().any(|w| !w.is_finite()) {
            return Err(ResolveError::malformed("transition weights must be finite"));
        }
        Ok(())
    }

    pub fn with_fallback_energy(mut self, energy: f64) -> Self {
        self.fallback_energy = energy;
        self
    }

    pub fn with_transition_weights(mut self, weights: Vec<f64>) -> Self {
        self.transition_weights = weights;
        self
    }

    pub fn with_selected_features(mut self, features: Vec<String>) -> Self {
        self.selected_features = features;
        self
    }

    pub fn with_terminal_energy(mut self, energy: f64) -> Self {
        self.terminal_energy = energy;
        self
    }

    pub fn with_validate_tracklets(mut self, validate: bool) -> Self {
        self.validate_tracklets = validate;
        self
    }

    pub fn with_skip_empty_frames(mut self, skip: bool) -> Self {
        self.skip_empty_frames = skip;
        self
    }

    pub fn with_retain_label_images(mut self, retain: bool) -> Self {
        self.retain_label_images = retain;
        self
    }
}

/// Parameters of the k-means merger resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Maximum number of Lloyd iterations
    pub max_iterations: usize,
    /// Stop once no center moves further than this (in pixels)
    pub tolerance: f64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-3,
        }
    }
}

impl KMeansConfig {
    /// Create a new k-means configuration
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }
}
