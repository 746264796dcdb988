//! K-means merger resolver
//!
//! Splits the pixels of a merged region into `count` clusters of pixel
//! coordinates with Lloyd iterations. Clusters are seeded from the fits of
//! the previous frame when available (largest first), the remaining seeds
//! are evenly spaced pixels of the region. Each cluster is summarized as a
//! [`ShapeFit`] (pixel count, mean, covariance).

use nalgebra::{DMatrix, DVector};

use crate::config::KMeansConfig;
use crate::error::PluginError;
use crate::types::{Label, LabelImage, ShapeFit};

use super::MergerResolver;

/// Reference [`MergerResolver`] based on k-means clustering
#[derive(Debug, Clone, Default)]
pub struct KMeansMergerResolver {
    config: KMeansConfig,
}

impl KMeansMergerResolver {
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Pick `k` initial centers
    fn initial_centers(
        points: &[DVector<f64>],
        k: usize,
        initializations: &[ShapeFit],
    ) -> Vec<DVector<f64>> {
        let ndim = points[0].len();
        let mut priors: Vec<&ShapeFit> = initializations
            .iter()
            .filter(|fit| fit.ndim() == ndim)
            .collect();
        priors.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let mut centers: Vec<DVector<f64>> =
            priors.iter().take(k).map(|fit| fit.mean.clone()).collect();

        let remaining = k - centers.len();
        let n = points.len();
        for j in 0..remaining {
            centers.push(points[(2 * j + 1) * n / (2 * remaining)].clone());
        }
        centers
    }

    /// Index of the nearest center (lowest index on ties)
    fn nearest(point: &DVector<f64>, centers: &[DVector<f64>]) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (c, center) in centers.iter().enumerate() {
            let dist = (point - center).norm_squared();
            if dist < best_dist {
                best = c;
                best_dist = dist;
            }
        }
        best
    }

    /// Lloyd iterations; returns the cluster index of every point
    fn cluster(&self, points: &[DVector<f64>], mut centers: Vec<DVector<f64>>) -> Vec<usize> {
        let k = centers.len();
        let ndim = points[0].len();
        let mut assignment: Vec<usize> =
            points.iter().map(|p| Self::nearest(p, &centers)).collect();

        for iteration in 0..self.config.max_iterations {
            let mut sums = vec![DVector::<f64>::zeros(ndim); k];
            let mut sizes = vec![0usize; k];
            for (p, &c) in points.iter().zip(&assignment) {
                sums[c] += p;
                sizes[c] += 1;
            }

            // Reseed empty clusters with the worst fitting point of a
            // cluster that can spare one
            for c in 0..k {
                if sizes[c] > 0 {
                    continue;
                }
                let donor = (0..points.len())
                    .filter(|&i| sizes[assignment[i]] > 1)
                    .max_by(|&i, &j| {
                        let di = (&points[i] - &centers[assignment[i]]).norm_squared();
                        let dj = (&points[j] - &centers[assignment[j]]).norm_squared();
                        di.total_cmp(&dj)
                    });
                if let Some(i) = donor {
                    let old = assignment[i];
                    sums[old] -= &points[i];
                    sizes[old] -= 1;
                    sums[c] += &points[i];
                    sizes[c] += 1;
                    assignment[i] = c;
                }
            }

            let mut shift = 0.0f64;
            for c in 0..k {
                if sizes[c] == 0 {
                    continue;
                }
                let updated = &sums[c] / sizes[c] as f64;
                shift = shift.max((&updated - &centers[c]).norm());
                centers[c] = updated;
            }

            let reassigned: Vec<usize> =
                points.iter().map(|p| Self::nearest(p, &centers)).collect();
            let stable = reassigned == assignment;
            assignment = reassigned;
            if stable && shift <= self.config.tolerance {
                log::trace!("k-means converged after {} iterations", iteration + 1);
                break;
            }
        }
        assignment
    }

    fn fit(points: &[&DVector<f64>]) -> ShapeFit {
        let ndim = points[0].len();
        let n = points.len() as f64;
        let mut mean = DVector::<f64>::zeros(ndim);
        for p in points {
            mean += *p;
        }
        mean /= n;
        let mut covariance = DMatrix::<f64>::zeros(ndim, ndim);
        for p in points {
            let d = *p - &mean;
            covariance += &d * d.transpose();
        }
        covariance /= n;
        ShapeFit::new(n, mean, covariance)
    }
}

impl MergerResolver for KMeansMergerResolver {
    fn resolve_merger(
        &self,
        label_image: &mut LabelImage,
        label: Label,
        next_free_id: Label,
        count: u32,
        initializations: &[ShapeFit],
    ) -> Result<Vec<ShapeFit>, PluginError> {
        if count == 0 {
            return Err(PluginError::Failed {
                description: format!("cannot fit zero objects into label {}", label),
            });
        }

        let ndim = label_image.ndim();
        let mut positions = Vec::new();
        let mut points = Vec::new();
        for (pos, (idx, &v)) in label_image.indexed_iter().enumerate() {
            if v == label {
                positions.push(pos);
                points.push(DVector::from_iterator(ndim, (0..ndim).map(|d| idx[d] as f64)));
            }
        }
        if points.is_empty() {
            return Err(PluginError::LabelNotFound { label });
        }
        if next_free_id.checked_add(count - 1).is_none() {
            return Err(PluginError::Failed {
                description: format!(
                    "no {} free labels left after {} for label {}",
                    count, next_free_id, label
                ),
            });
        }
        let k = count as usize;
        if k > points.len() {
            return Err(PluginError::Failed {
                description: format!(
                    "label {} has {} pixels, cannot fit {} objects",
                    label,
                    points.len(),
                    count
                ),
            });
        }

        let assignment = if k == 1 {
            vec![0; points.len()]
        } else {
            let centers = Self::initial_centers(&points, k, initializations);
            self.cluster(&points, centers)
        };

        let mut fits = Vec::with_capacity(k);
        for c in 0..k {
            let members: Vec<&DVector<f64>> = points
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| p)
                .collect();
            if members.is_empty() {
                return Err(PluginError::Failed {
                    description: format!("cluster {} of label {} is empty", c, label),
                });
            }
            fits.push(Self::fit(&members));
        }

        if k > 1 {
            let mut cursor = 0;
            for (pos, v) in label_image.iter_mut().enumerate() {
                if cursor < positions.len() && positions[cursor] == pos {
                    *v = next_free_id + assignment[cursor] as Label;
                    cursor += 1;
                }
            }
        }

        log::debug!(
            "Fitted {} objects into label {} ({} pixels)",
            count,
            label,
            points.len()
        );
        Ok(fits)
    }

    fn name(&self) -> &'static str {
        "KMeans"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, IxDyn};

    fn at(img: &LabelImage, r: usize, c: usize) -> Label {
        img[IxDyn(&[r, c])]
    }

    /// Two 3x3 blobs with label 5, at columns 0..3 and 7..10
    fn two_blobs() -> LabelImage {
        let mut img = Array2::<Label>::zeros((3, 10));
        for r in 0..3 {
            for c in (0..3).chain(7..10) {
                img[[r, c]] = 5;
            }
        }
        img.into_dyn()
    }

    #[test]
    fn test_split_two_blobs() {
        let mut img = two_blobs();
        let resolver = KMeansMergerResolver::default();
        let fits = resolver.resolve_merger(&mut img, 5, 6, 2, &[]).unwrap();

        assert_eq!(fits.len(), 2);
        assert!(fits.iter().all(|f| f.weight == 9.0));
        assert!(!img.iter().any(|&v| v == 5));

        let left = at(&img, 1, 1);
        let right = at(&img, 1, 8);
        assert_ne!(left, right);
        assert!([6, 7].contains(&left) && [6, 7].contains(&right));
        assert_eq!(img.iter().filter(|&&v| v == left).count(), 9);

        // Fit order follows the new labels
        let left_fit = &fits[(left - 6) as usize];
        assert!((left_fit.mean[1] - 1.0).abs() < 1e-9);
        assert!((left_fit.mean[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_initializations_order_clusters() {
        let mut img = two_blobs();
        let prior = |col: f64, weight: f64| {
            ShapeFit::new(weight, DVector::from_vec(vec![1.0, col]), DMatrix::identity(2, 2))
        };
        // The heavier prior seeds cluster 0
        let inits = [prior(1.0, 3.0), prior(8.0, 10.0)];
        let resolver = KMeansMergerResolver::default();
        let fits = resolver.resolve_merger(&mut img, 5, 20, 2, &inits).unwrap();

        assert_eq!(at(&img, 0, 8), 20);
        assert_eq!(at(&img, 0, 1), 21);
        assert!((fits[0].mean[1] - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_object_keeps_label() {
        let mut img = two_blobs();
        let before = img.clone();
        let fits = KMeansMergerResolver::default()
            .resolve_merger(&mut img, 5, 6, 1, &[])
            .unwrap();
        assert_eq!(fits.len(), 1);
        assert_eq!(fits[0].weight, 18.0);
        assert_eq!(img, before);
        // Covariance of the column coordinate dominates
        assert!(fits[0].covariance[(1, 1)] > fits[0].covariance[(0, 0)]);
    }

    #[test]
    fn test_errors() {
        let mut img = two_blobs();
        let resolver = KMeansMergerResolver::default();
        assert!(matches!(
            resolver.resolve_merger(&mut img, 9, 10, 2, &[]),
            Err(PluginError::LabelNotFound { label: 9 })
        ));
        assert!(resolver.resolve_merger(&mut img, 5, 10, 0, &[]).is_err());
        assert!(resolver.resolve_merger(&mut img, 5, 10, 19, &[]).is_err());
        assert!(matches!(
            resolver.resolve_merger(&mut img, 5, Label::MAX, 2, &[]),
            Err(PluginError::Failed { .. })
        ));
    }
}
