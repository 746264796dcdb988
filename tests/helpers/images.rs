//! Label image builders

use ndarray::{Array2, IxDyn};

use merger_resolver_rs::{InMemoryImageProvider, Label, LabelImage};

/// A rectangle `rows x cols` painted with `label`
#[derive(Debug, Clone)]
pub struct Blob {
    pub label: Label,
    pub rows: std::ops::Range<usize>,
    pub cols: std::ops::Range<usize>,
}

pub fn blob(label: Label, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> Blob {
    Blob { label, rows, cols }
}

/// 2D frame with the given blobs, later blobs paint over earlier ones
pub fn frame(height: usize, width: usize, blobs: &[Blob]) -> LabelImage {
    let mut img = Array2::<Label>::zeros((height, width));
    for b in blobs {
        for r in b.rows.clone() {
            for c in b.cols.clone() {
                img[[r, c]] = b.label;
            }
        }
    }
    img.into_dyn()
}

/// Provider holding `frames` as consecutive timesteps starting at `first`
pub fn provider(first: usize, frames: Vec<LabelImage>) -> InMemoryImageProvider {
    frames
        .into_iter()
        .enumerate()
        .fold(InMemoryImageProvider::new(), |p, (i, f)| {
            p.with_label_frame(first + i, f)
        })
}

/// Label at a pixel
pub fn label_at(img: &LabelImage, row: usize, col: usize) -> Label {
    img[IxDyn(&[row, col])]
}
