//! Basic region features for 2D and 3D objects

use crate::error::PluginError;
use crate::types::{LabelImage, ObjectFeatures, RawImage};

use super::ObjectFeaturePlugin;

/// Pixel count, center of mass and mean intensity of the masked object
///
/// Produces `Count`, `RegionCenter` (one value per axis) and `Mean`.
/// An empty mask yields `Count = [0]` and no other features.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionFeatures;

impl ObjectFeaturePlugin for RegionFeatures {
    fn supports_dimensions(&self, ndims: usize) -> bool {
        ndims == 2 || ndims == 3
    }

    fn compute_features(
        &self,
        raw: &RawImage,
        mask: &LabelImage,
        _timestep: usize,
    ) -> Result<ObjectFeatures, PluginError> {
        if raw.shape() != mask.shape() {
            return Err(PluginError::UnsupportedImage {
                description: format!(
                    "raw shape {:?} differs from label shape {:?}",
                    raw.shape(),
                    mask.shape()
                ),
            });
        }

        let ndim = mask.ndim();
        let mut count = 0usize;
        let mut center = vec![0.0; ndim];
        let mut intensity = 0.0;
        for ((idx, &m), &r) in mask.indexed_iter().zip(raw.iter()) {
            if m != 1 {
                continue;
            }
            count += 1;
            for (d, c) in center.iter_mut().enumerate() {
                *c += idx[d] as f64;
            }
            intensity += f64::from(r);
        }

        let mut features = ObjectFeatures::new();
        features.insert("Count".to_string(), vec![count as f64]);
        if count > 0 {
            let n = count as f64;
            features.insert(
                "RegionCenter".to_string(),
                center.into_iter().map(|c| c / n).collect(),
            );
            features.insert("Mean".to_string(), vec![intensity / n]);
        }
        Ok(features)
    }

    fn name(&self) -> &'static str {
        "RegionFeatures"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn test_region_features_2d() {
        let mask = array![[0u32, 1, 1], [0, 1, 1]].into_dyn();
        let raw = array![[9.0f32, 1.0, 2.0], [9.0, 3.0, 4.0]].into_dyn();
        let f = RegionFeatures.compute_features(&raw, &mask, 0).unwrap();

        assert_eq!(f["Count"], vec![4.0]);
        assert_eq!(f["RegionCenter"], vec![0.5, 1.5]);
        assert_eq!(f["Mean"], vec![2.5]);
    }

    #[test]
    fn test_region_features_3d_and_empty() {
        let mut mask: LabelImage = ArrayD::zeros(IxDyn(&[2, 2, 2]));
        mask[IxDyn(&[1, 1, 0])] = 1;
        let raw = ArrayD::zeros(IxDyn(&[2, 2, 2]));
        let f = RegionFeatures.compute_features(&raw, &mask, 0).unwrap();
        assert_eq!(f["RegionCenter"], vec![1.0, 1.0, 0.0]);

        let empty = ArrayD::zeros(IxDyn(&[2, 2, 2]));
        let f = RegionFeatures.compute_features(&raw, &empty, 0).unwrap();
        assert_eq!(f["Count"], vec![0.0]);
        assert!(!f.contains_key("RegionCenter"));
    }

    #[test]
    fn test_dimension_support_and_shape_check() {
        assert!(RegionFeatures.supports_dimensions(2));
        assert!(RegionFeatures.supports_dimensions(3));
        assert!(!RegionFeatures.supports_dimensions(4));

        let mask: LabelImage = ArrayD::zeros(IxDyn(&[2, 2]));
        let raw = ArrayD::zeros(IxDyn(&[3, 2]));
        assert!(RegionFeatures.compute_features(&raw, &mask, 0).is_err());
    }
}
