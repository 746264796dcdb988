//! Plugin interfaces and the registry the pipeline calls through
//!
//! One trait per plugin category:
//!
//! - [`ImageProvider`] - label and raw frames
//! - [`MergerResolver`] - splits a merged region into `count` objects
//! - [`ObjectFeaturePlugin`] - per-object features from a binary mask
//! - [`TransitionFeaturePlugin`] - feature vector of a pair of objects
//!
//! Implementations are registered explicitly on a [`PluginRegistry`];
//! object-feature plugins are selected by the dimensionality they declare.

pub mod features;
pub mod kmeans;
pub mod provider;
pub mod transition;

use crate::error::{PluginError, ResolveError};
use crate::types::{Label, LabelImage, ObjectFeatures, RawImage, ShapeFit};

pub use features::RegionFeatures;
pub use kmeans::KMeansMergerResolver;
pub use provider::{save_label_png, InMemoryImageProvider, PngSequenceProvider};
pub use transition::TransitionFeaturesDistance;

/// Source of label and raw image frames
pub trait ImageProvider: Send + Sync {
    /// Labeled segmentation of one frame
    fn label_image(&self, timestep: usize) -> Result<LabelImage, PluginError>;

    /// Raw intensities of one frame
    fn raw_image(&self, timestep: usize) -> Result<RawImage, PluginError>;

    /// Spatial shape of a frame (without the time axis)
    fn image_shape(&self) -> Result<Vec<usize>, PluginError>;

    /// Get provider name
    fn name(&self) -> &'static str;
}

/// Shape fitting inside merged regions
pub trait MergerResolver: Send + Sync {
    /// Fit `count` objects into the region labeled `label`
    ///
    /// When `count > 1` the region is relabeled in place with
    /// `next_free_id .. next_free_id + count`. `initializations` are the
    /// fits of the linked objects in the previous frame.
    ///
    /// # Returns
    /// Exactly `count` fits, in the order of the new labels
    fn resolve_merger(
        &self,
        label_image: &mut LabelImage,
        label: Label,
        next_free_id: Label,
        count: u32,
        initializations: &[ShapeFit],
    ) -> Result<Vec<ShapeFit>, PluginError>;

    /// Get resolver name
    fn name(&self) -> &'static str;
}

/// Per-object feature computation
pub trait ObjectFeaturePlugin: Send + Sync {
    /// Whether the plugin handles data with `ndims` spatial dimensions
    fn supports_dimensions(&self, ndims: usize) -> bool;

    /// Feature names to drop from the merged feature map
    fn omitted_features(&self) -> Vec<String> {
        Vec::new()
    }

    /// Features of the object marked with 1 in `mask`
    fn compute_features(
        &self,
        raw: &RawImage,
        mask: &LabelImage,
        timestep: usize,
    ) -> Result<ObjectFeatures, PluginError>;

    /// Get plugin name
    fn name(&self) -> &'static str;
}

/// Feature vector construction for a transition between two objects
pub trait TransitionFeaturePlugin: Send + Sync {
    /// Feature values for the pair, restricted to `selected` features
    fn construct_feature_vector(
        &self,
        a: &ObjectFeatures,
        b: &ObjectFeatures,
        selected: &[String],
    ) -> Result<Vec<f64>, PluginError>;

    /// Human readable names of the values returned above
    fn feature_names(
        &self,
        a: &ObjectFeatures,
        b: &ObjectFeatures,
        selected: &[String],
    ) -> Vec<String>;

    /// Get plugin name
    fn name(&self) -> &'static str;
}

/// Explicitly registered plugin set
pub struct PluginRegistry {
    image_provider: Box<dyn ImageProvider>,
    merger_resolver: Box<dyn MergerResolver>,
    object_features: Vec<Box<dyn ObjectFeaturePlugin>>,
    transition_features: Vec<Box<dyn TransitionFeaturePlugin>>,
}

impl PluginRegistry {
    /// Registry with the two mandatory plugins and no feature plugins
    pub fn new(
        image_provider: impl ImageProvider + 'static,
        merger_resolver: impl MergerResolver + 'static,
    ) -> Self {
        Self {
            image_provider: Box::new(image_provider),
            merger_resolver: Box::new(merger_resolver),
            object_features: Vec::new(),
            transition_features: Vec::new(),
        }
    }

    /// Registry with the bundled feature plugins
    pub fn with_default_features(
        image_provider: impl ImageProvider + 'static,
        merger_resolver: impl MergerResolver + 'static,
    ) -> Self {
        Self::new(image_provider, merger_resolver)
            .with_object_features(RegionFeatures)
            .with_transition_features(TransitionFeaturesDistance)
    }

    /// Register an object feature plugin
    pub fn with_object_features(mut self, plugin: impl ObjectFeaturePlugin + 'static) -> Self {
        self.object_features.push(Box::new(plugin));
        self
    }

    /// Register a transition feature plugin
    pub fn with_transition_features(
        mut self,
        plugin: impl TransitionFeaturePlugin + 'static,
    ) -> Self {
        self.transition_features.push(Box::new(plugin));
        self
    }

    #[inline]
    pub fn image_provider(&self) -> &dyn ImageProvider {
        self.image_provider.as_ref()
    }

    #[inline]
    pub fn merger_resolver(&self) -> &dyn MergerResolver {
        self.merger_resolver.as_ref()
    }

    /// Whether any transition feature plugin is registered
    #[inline]
    pub fn has_transition_features(&self) -> bool {
        !self.transition_features.is_empty()
    }

    /// Names of the object feature plugins applicable to `ndims`
    pub fn object_feature_plugins_for(&self, ndims: usize) -> Vec<&'static str> {
        self.object_features
            .iter()
            .filter(|p| p.supports_dimensions(ndims))
            .map(|p| p.name())
            .collect()
    }

    /// Merge the features of every plugin that supports `ndims`
    pub fn compute_object_features(
        &self,
        ndims: usize,
        raw: &RawImage,
        mask: &LabelImage,
        timestep: usize,
    ) -> Result<ObjectFeatures, ResolveError> {
        let mut merged = ObjectFeatures::new();
        let mut omitted = Vec::new();
        for plugin in self
            .object_features
            .iter()
            .filter(|p| p.supports_dimensions(ndims))
        {
            let features = plugin.compute_features(raw, mask, timestep).map_err(|e| {
                ResolveError::plugin(plugin.name(), format!("frame {}", timestep), e)
            })?;
            merged.extend(features);
            omitted.extend(plugin.omitted_features());
        }
        for name in &omitted {
            merged.remove(name);
        }
        Ok(merged)
    }

    /// Concatenated transition feature vector of all registered plugins
    pub fn transition_feature_vector(
        &self,
        a: &ObjectFeatures,
        b: &ObjectFeatures,
        selected: &[String],
    ) -> Result<Vec<f64>, ResolveError> {
        let mut vector = Vec::new();
        for plugin in &self.transition_features {
            let values = plugin
                .construct_feature_vector(a, b, selected)
                .map_err(|e| ResolveError::plugin(plugin.name(), "transition features", e))?;
            vector.extend(values);
        }
        Ok(vector)
    }

    /// Concatenated transition feature names of all registered plugins
    pub fn transition_feature_names(
        &self,
        a: &ObjectFeatures,
        b: &ObjectFeatures,
        selected: &[String],
    ) -> Vec<String> {
        self.transition_features
            .iter()
            .flat_map(|p| p.feature_names(a, b, selected))
            .collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("image_provider", &self.image_provider.name())
            .field("merger_resolver", &self.merger_resolver.name())
            .field(
                "object_features",
                &self.object_features.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "transition_features",
                &self
                    .transition_features
                    .iter()
                    .map(|p| p.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    struct ConstantFeatures {
        dims: usize,
        value: f64,
    }

    impl ObjectFeaturePlugin for ConstantFeatures {
        fn supports_dimensions(&self, ndims: usize) -> bool {
            ndims == self.dims
        }

        fn omitted_features(&self) -> Vec<String> {
            vec!["Internal".to_string()]
        }

        fn compute_features(
            &self,
            _raw: &RawImage,
            _mask: &LabelImage,
            _timestep: usize,
        ) -> Result<ObjectFeatures, PluginError> {
            let mut f = ObjectFeatures::new();
            f.insert("Constant".to_string(), vec![self.value]);
            f.insert("Internal".to_string(), vec![0.0]);
            Ok(f)
        }

        fn name(&self) -> &'static str {
            "constant"
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new(InMemoryImageProvider::new(), KMeansMergerResolver::default())
            .with_object_features(ConstantFeatures { dims: 2, value: 2.0 })
            .with_object_features(ConstantFeatures { dims: 3, value: 3.0 })
    }

    #[test]
    fn test_plugins_selected_by_dimension() {
        let reg = registry();
        let raw = ArrayD::zeros(IxDyn(&[2, 2]));
        let mask = ArrayD::zeros(IxDyn(&[2, 2]));
        let f = reg.compute_object_features(2, &raw, &mask, 0).unwrap();
        assert_eq!(f["Constant"], vec![2.0]);
        assert!(!f.contains_key("Internal"));
        assert!(reg.object_feature_plugins_for(4).is_empty());
    }

    #[test]
    fn test_empty_transition_vector_without_plugins() {
        let reg = registry();
        assert!(!reg.has_transition_features());
        let v = reg
            .transition_feature_vector(&ObjectFeatures::new(), &ObjectFeatures::new(), &[])
            .unwrap();
        assert!(v.is_empty());
    }
}
