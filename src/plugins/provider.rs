//! Image providers
//!
//! [`InMemoryImageProvider`] serves frames held in memory.
//! [`PngSequenceProvider`] reads one 2D PNG per frame from a path template in
//! which `{t}` is replaced by the timestep.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma};
use ndarray::{Array2, ArrayD, IxDyn};

use crate::error::PluginError;
use crate::types::{LabelImage, RawImage};

use super::ImageProvider;

/// Placeholder substituted with the timestep in path templates
pub const TIMESTEP_PLACEHOLDER: &str = "{t}";

// ============================================================================
// In-memory frames
// ============================================================================

/// Frames kept in memory, keyed by timestep
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageProvider {
    labels: BTreeMap<usize, LabelImage>,
    raws: BTreeMap<usize, RawImage>,
}

impl InMemoryImageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the label image of a frame
    pub fn with_label_frame(mut self, timestep: usize, image: LabelImage) -> Self {
        self.labels.insert(timestep, image);
        self
    }

    /// Add the raw image of a frame
    pub fn with_raw_frame(mut self, timestep: usize, image: RawImage) -> Self {
        self.raws.insert(timestep, image);
        self
    }

    /// Number of label frames
    pub fn num_frames(&self) -> usize {
        self.labels.len()
    }
}

impl ImageProvider for InMemoryImageProvider {
    fn label_image(&self, timestep: usize) -> Result<LabelImage, PluginError> {
        self.labels
            .get(&timestep)
            .cloned()
            .ok_or(PluginError::FrameUnavailable { timestep })
    }

    /// Falls back to a zero image shaped like the label frame
    fn raw_image(&self, timestep: usize) -> Result<RawImage, PluginError> {
        if let Some(raw) = self.raws.get(&timestep) {
            return Ok(raw.clone());
        }
        let labels = self
            .labels
            .get(&timestep)
            .ok_or(PluginError::FrameUnavailable { timestep })?;
        Ok(ArrayD::zeros(IxDyn(labels.shape())))
    }

    fn image_shape(&self) -> Result<Vec<usize>, PluginError> {
        self.labels
            .values()
            .next()
            .map(|img| img.shape().to_vec())
            .ok_or_else(|| PluginError::Failed {
                description: "no frames available".to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "InMemory"
    }
}

// ============================================================================
// PNG sequences
// ============================================================================

/// 2D frames stored as one PNG per timestep
#[derive(Debug, Clone)]
pub struct PngSequenceProvider {
    label_pattern: String,
    raw_pattern: Option<String>,
    reference_timestep: usize,
}

impl PngSequenceProvider {
    /// Create a provider from a label path template
    ///
    /// # Errors
    /// [`PluginError::Failed`] if the template has no `{t}` placeholder
    pub fn new(label_pattern: impl Into<String>) -> Result<Self, PluginError> {
        let label_pattern = label_pattern.into();
        check_pattern(&label_pattern)?;
        Ok(Self {
            label_pattern,
            raw_pattern: None,
            reference_timestep: 0,
        })
    }

    /// Read raw intensities from a second template
    pub fn with_raw_pattern(mut self, raw_pattern: impl Into<String>) -> Result<Self, PluginError> {
        let raw_pattern = raw_pattern.into();
        check_pattern(&raw_pattern)?;
        self.raw_pattern = Some(raw_pattern);
        Ok(self)
    }

    /// Frame whose size is reported by [`ImageProvider::image_shape`]
    pub fn with_reference_timestep(mut self, timestep: usize) -> Self {
        self.reference_timestep = timestep;
        self
    }

    /// Path of the label PNG of a frame
    pub fn label_path(&self, timestep: usize) -> PathBuf {
        frame_path(&self.label_pattern, timestep)
    }
}

fn check_pattern(pattern: &str) -> Result<(), PluginError> {
    if pattern.contains(TIMESTEP_PLACEHOLDER) {
        Ok(())
    } else {
        Err(PluginError::Failed {
            description: format!(
                "path template '{}' has no {} placeholder",
                pattern, TIMESTEP_PLACEHOLDER
            ),
        })
    }
}

fn frame_path(pattern: &str, timestep: usize) -> PathBuf {
    PathBuf::from(pattern.replace(TIMESTEP_PLACEHOLDER, &timestep.to_string()))
}

fn open_frame(path: &Path) -> Result<image::DynamicImage, PluginError> {
    image::open(path).map_err(|e| PluginError::Failed {
        description: format!("cannot read {}: {}", path.display(), e),
    })
}

fn to_array<T>(width: u32, height: u32, data: Vec<T>) -> Result<ArrayD<T>, PluginError> {
    Array2::from_shape_vec((height as usize, width as usize), data)
        .map(|a| a.into_dyn())
        .map_err(|e| PluginError::UnsupportedImage {
            description: e.to_string(),
        })
}

impl ImageProvider for PngSequenceProvider {
    fn label_image(&self, timestep: usize) -> Result<LabelImage, PluginError> {
        let buffer = open_frame(&self.label_path(timestep))?.to_luma16();
        let (width, height) = buffer.dimensions();
        let data = buffer.into_raw().into_iter().map(u32::from).collect();
        to_array(width, height, data)
    }

    fn raw_image(&self, timestep: usize) -> Result<RawImage, PluginError> {
        let Some(pattern) = &self.raw_pattern else {
            let labels = self.label_image(timestep)?;
            return Ok(ArrayD::zeros(IxDyn(labels.shape())));
        };
        let buffer = open_frame(&frame_path(pattern, timestep))?.to_luma32f();
        let (width, height) = buffer.dimensions();
        to_array(width, height, buffer.into_raw())
    }

    fn image_shape(&self) -> Result<Vec<usize>, PluginError> {
        let path = self.label_path(self.reference_timestep);
        let (width, height) =
            image::image_dimensions(&path).map_err(|e| PluginError::Failed {
                description: format!("cannot read {}: {}", path.display(), e),
            })?;
        Ok(vec![height as usize, width as usize])
    }

    fn name(&self) -> &'static str {
        "PngSequence"
    }
}

/// Write a 2D label image as a 16-bit grayscale PNG
pub fn save_label_png(path: &Path, labels: &LabelImage) -> Result<(), PluginError> {
    let &[height, width] = labels.shape() else {
        return Err(PluginError::UnsupportedImage {
            description: format!("expected a 2D label image, got shape {:?}", labels.shape()),
        });
    };
    let data = labels
        .iter()
        .map(|&v| {
            u16::try_from(v).map_err(|_| PluginError::UnsupportedImage {
                description: format!("label {} does not fit into 16 bits", v),
            })
        })
        .collect::<Result<Vec<u16>, _>>()?;
    let buffer: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(width as u32, height as u32, data).ok_or_else(|| {
            PluginError::UnsupportedImage {
                description: "buffer size does not match image shape".to_string(),
            }
        })?;
    buffer.save(path).map_err(|e| PluginError::Failed {
        description: format!("cannot write {}: {}", path.display(), e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_in_memory_frames() {
        let labels = array![[0u32, 1], [2, 2]].into_dyn();
        let provider = InMemoryImageProvider::new().with_label_frame(3, labels.clone());

        assert_eq!(provider.label_image(3).unwrap(), labels);
        assert_eq!(provider.raw_image(3).unwrap().shape(), &[2, 2]);
        assert_eq!(provider.image_shape().unwrap(), vec![2, 2]);
        assert!(matches!(
            provider.label_image(4),
            Err(PluginError::FrameUnavailable { timestep: 4 })
        ));
    }

    #[test]
    fn test_pattern_requires_placeholder() {
        assert!(PngSequenceProvider::new("labels/frame.png").is_err());
        let provider = PngSequenceProvider::new("labels/frame_{t}.png").unwrap();
        assert_eq!(provider.label_path(12), PathBuf::from("labels/frame_12.png"));
    }

    #[test]
    fn test_png_round_trip() {
        let dir = std::env::temp_dir().join(format!("merger-resolver-png-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let labels = array![[0u32, 1, 1], [0, 300, 2]].into_dyn();
        save_label_png(&dir.join("frame_0.png"), &labels).unwrap();

        let pattern = dir.join("frame_{t}.png").to_string_lossy().into_owned();
        let provider = PngSequenceProvider::new(pattern).unwrap();
        assert_eq!(provider.label_image(0).unwrap(), labels);
        assert_eq!(provider.image_shape().unwrap(), vec![2, 3]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_save_rejects_large_labels() {
        let labels = array![[70_000u32]].into_dyn();
        let path = std::env::temp_dir().join("merger-resolver-too-large.png");
        assert!(matches!(
            save_label_png(&path, &labels),
            Err(PluginError::UnsupportedImage { .. })
        ));
    }
}
