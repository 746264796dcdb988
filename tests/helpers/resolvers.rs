//! Merger resolver stubs

use std::sync::{Arc, Mutex};

use nalgebra::{DMatrix, DVector};

use merger_resolver_rs::{Label, LabelImage, MergerResolver, PluginError, ShapeFit};

/// One call seen by [`RecordingResolver`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveCall {
    pub label: Label,
    pub next_free_id: Label,
    pub count: u32,
    pub num_initializations: usize,
}

/// Splits a region into `count` bands of equal column width and records
/// every call. Clones share the call log.
#[derive(Debug, Clone, Default)]
pub struct RecordingResolver {
    calls: Arc<Mutex<Vec<ResolveCall>>>,
}

impl RecordingResolver {
    pub fn calls(&self) -> Vec<ResolveCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl MergerResolver for RecordingResolver {
    fn resolve_merger(
        &self,
        label_image: &mut LabelImage,
        label: Label,
        next_free_id: Label,
        count: u32,
        initializations: &[ShapeFit],
    ) -> Result<Vec<ShapeFit>, PluginError> {
        self.calls.lock().unwrap().push(ResolveCall {
            label,
            next_free_id,
            count,
            num_initializations: initializations.len(),
        });

        let pixels: Vec<(usize, usize)> = label_image
            .indexed_iter()
            .filter(|(_, v)| **v == label)
            .map(|(idx, _)| (idx[0], idx[1]))
            .collect();
        if pixels.is_empty() {
            return Err(PluginError::LabelNotFound { label });
        }
        let min_col = pixels.iter().map(|p| p.1).min().unwrap();
        let max_col = pixels.iter().map(|p| p.1).max().unwrap();
        let width = (max_col - min_col + 1) as f64;
        let band = |col: usize| -> u32 {
            (((col - min_col) as f64 / width) * count as f64).floor() as u32
        };

        let mut fits = Vec::new();
        for k in 0..count {
            let members: Vec<&(usize, usize)> = pixels.iter().filter(|p| band(p.1) == k).collect();
            let n = members.len().max(1) as f64;
            let row = members.iter().map(|p| p.0 as f64).sum::<f64>() / n;
            let col = members.iter().map(|p| p.1 as f64).sum::<f64>() / n;
            fits.push(ShapeFit::new(
                members.len() as f64,
                DVector::from_vec(vec![row, col]),
                DMatrix::identity(2, 2),
            ));
        }

        if count > 1 {
            for (idx, v) in label_image.indexed_iter_mut() {
                if *v == label {
                    *v = next_free_id + band(idx[1]);
                }
            }
        }
        Ok(fits)
    }

    fn name(&self) -> &'static str {
        "Recording"
    }
}

/// Resolver that always fails
#[derive(Debug, Default)]
pub struct FailingResolver;

impl MergerResolver for FailingResolver {
    fn resolve_merger(
        &self,
        _label_image: &mut LabelImage,
        label: Label,
        _next_free_id: Label,
        _count: u32,
        _initializations: &[ShapeFit],
    ) -> Result<Vec<ShapeFit>, PluginError> {
        Err(PluginError::Failed {
            description: format!("cannot fit label {}", label),
        })
    }

    fn name(&self) -> &'static str {
        "Failing"
    }
}

/// Resolver that returns one fit too many
#[derive(Debug, Default)]
pub struct OverfittingResolver;

impl MergerResolver for OverfittingResolver {
    fn resolve_merger(
        &self,
        _label_image: &mut LabelImage,
        _label: Label,
        _next_free_id: Label,
        count: u32,
        _initializations: &[ShapeFit],
    ) -> Result<Vec<ShapeFit>, PluginError> {
        Ok((0..=count)
            .map(|_| ShapeFit::new(1.0, DVector::zeros(2), DMatrix::identity(2, 2)))
            .collect())
    }

    fn name(&self) -> &'static str {
        "Overfitting"
    }
}
