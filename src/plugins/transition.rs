//! Distance based transition features

use crate::error::PluginError;
use crate::types::ObjectFeatures;

use super::TransitionFeaturePlugin;

/// For every selected feature present in both objects: the Euclidean norm
/// of the difference and the norm of the element-wise product
///
/// A selected feature missing from either object contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionFeaturesDistance;

impl TransitionFeaturesDistance {
    fn pairs<'a>(
        a: &'a ObjectFeatures,
        b: &'a ObjectFeatures,
        selected: &'a [String],
    ) -> impl Iterator<Item = (&'a String, &'a [f64], &'a [f64])> + 'a {
        selected.iter().filter_map(move |name| {
            let va = a.get(name)?;
            let vb = b.get(name)?;
            Some((name, va.as_slice(), vb.as_slice()))
        })
    }
}

impl TransitionFeaturePlugin for TransitionFeaturesDistance {
    fn construct_feature_vector(
        &self,
        a: &ObjectFeatures,
        b: &ObjectFeatures,
        selected: &[String],
    ) -> Result<Vec<f64>, PluginError> {
        let mut vector = Vec::new();
        for (name, va, vb) in Self::pairs(a, b, selected) {
            if va.len() != vb.len() {
                return Err(PluginError::Failed {
                    description: format!(
                        "feature '{}' has lengths {} and {}",
                        name,
                        va.len(),
                        vb.len()
                    ),
                });
            }
            let diff: f64 = va.iter().zip(vb).map(|(x, y)| (x - y) * (x - y)).sum();
            let prod: f64 = va.iter().zip(vb).map(|(x, y)| (x * y) * (x * y)).sum();
            vector.push(diff.sqrt());
            vector.push(prod.sqrt());
        }
        Ok(vector)
    }

    fn feature_names(
        &self,
        a: &ObjectFeatures,
        b: &ObjectFeatures,
        selected: &[String],
    ) -> Vec<String> {
        Self::pairs(a, b, selected)
            .flat_map(|(name, _, _)| {
                [
                    format!("||{}_a - {}_b||", name, name),
                    format!("||{}_a * {}_b||", name, name),
                ]
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "TransitionFeaturesDistance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(center: &[f64]) -> ObjectFeatures {
        let mut f = ObjectFeatures::new();
        f.insert("RegionCenter".to_string(), center.to_vec());
        f.insert("Count".to_string(), vec![4.0]);
        f
    }

    #[test]
    fn test_region_center_distance() {
        let a = features(&[0.0, 3.0]);
        let b = features(&[4.0, 0.0]);
        let selected = vec!["RegionCenter".to_string()];
        let v = TransitionFeaturesDistance
            .construct_feature_vector(&a, &b, &selected)
            .unwrap();
        assert_eq!(v, vec![5.0, 0.0]);
        assert_eq!(
            TransitionFeaturesDistance.feature_names(&a, &b, &selected).len(),
            2
        );
    }

    #[test]
    fn test_missing_feature_is_skipped() {
        let a = features(&[1.0, 1.0]);
        let b = ObjectFeatures::new();
        let selected = vec!["RegionCenter".to_string(), "Volume".to_string()];
        let v = TransitionFeaturesDistance
            .construct_feature_vector(&a, &b, &selected)
            .unwrap();
        assert!(v.is_empty());
    }

    #[test]
    fn test_length_mismatch_fails() {
        let a = features(&[1.0, 1.0]);
        let b = features(&[1.0, 1.0, 1.0]);
        let selected = vec!["RegionCenter".to_string()];
        assert!(TransitionFeaturesDistance
            .construct_feature_vector(&a, &b, &selected)
            .is_err());
    }
}
