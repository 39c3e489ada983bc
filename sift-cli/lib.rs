//! High-level pipeline: load an image, detect keypoints, describe and match them.

pub mod render;

use log::{debug, info};
use sift_core::{BorderPolicy, CoreError, Grid, KeyPoint};
use sift_descriptor::{Descriptor, DescriptorError, DescriptorExtractor, ExtractorConfig};
use sift_detect::{DetectError, DetectorConfig, FeatureDetector, ScaleSpacePyramid};
use std::path::Path;
use thiserror::Error;

pub use sift_core;
pub use sift_descriptor;
pub use sift_detect;

use serde::{Deserialize, Serialize};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Detector and extractor settings plus the detection mode
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// DoG keypoints with scale-aware descriptors instead of single-scale corners
    #[serde(default)]
    pub scale_aware: bool,
    pub detector: DetectorConfig,
    pub extractor: ExtractorConfig,
}

impl PipelineConfig {
    pub fn summary(&self) -> String {
        let mode = if self.scale_aware { "scale space" } else { "corners" };
        format!("mode={mode}\n{}\n{}", self.detector.summary(), self.extractor.summary())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.detector.validate()?;
        self.extractor.validate()?;
        Ok(())
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> PipelineResult<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_toml(toml_str: &str) -> PipelineResult<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json` or `.toml` file, chosen by extension.
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("toml") => Self::from_toml(&text),
            other => Err(PipelineError::Config(format!(
                "unsupported config extension {:?} (expected .json or .toml)",
                other.unwrap_or("")
            ))),
        }
    }

    /// Save as JSON or TOML, chosen by extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let path = path.as_ref();
        let text = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => self.to_json()?,
            Some("toml") => self.to_toml()?,
            other => {
                return Err(PipelineError::Config(format!(
                    "unsupported config extension {:?} (expected .json or .toml)",
                    other.unwrap_or("")
                )))
            }
        };
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Keypoints with their index-aligned descriptors
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<KeyPoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Detector plus descriptor extractor driven by one [`PipelineConfig`]
pub struct FeaturePipeline {
    config: PipelineConfig,
    detector: FeatureDetector,
    extractor: DescriptorExtractor,
}

impl FeaturePipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        let detector = FeatureDetector::new(config.detector.clone())?;
        let extractor = DescriptorExtractor::new(config.extractor.clone())?;
        Ok(Self {
            config,
            detector,
            extractor,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &FeatureDetector {
        &self.detector
    }

    pub fn extractor(&self) -> &DescriptorExtractor {
        &self.extractor
    }

    /// Gaussian pyramid of `grid` under the detector settings
    pub fn pyramid(&self, grid: &Grid) -> PipelineResult<ScaleSpacePyramid> {
        Ok(self.detector.build_pyramid(grid)?)
    }

    /// Keypoints without descriptors
    pub fn detect(&self, grid: &Grid) -> PipelineResult<Vec<KeyPoint>> {
        if self.config.scale_aware {
            Ok(self.detector.detect_scale_space(grid)?.keypoints)
        } else {
            Ok(self.detector.detect_corners(grid)?)
        }
    }

    /// Detect, orient and describe keypoints in one step
    pub fn detect_and_describe(&self, grid: &Grid) -> PipelineResult<Features> {
        let features = if self.config.scale_aware {
            let detection = self.detector.detect_scale_space(grid)?;
            let (keypoints, descriptors) = self.extractor.compute_scaled(&detection.pyramid, &detection.keypoints);
            Features { keypoints, descriptors }
        } else {
            let corners = self.detector.detect_corners(grid)?;
            let keypoints = if self.extractor.capabilities().rotation_invariant {
                self.extractor.orient(grid, &corners)
            } else {
                corners
            };
            let descriptors = self.extractor.compute(grid, &keypoints);
            Features { keypoints, descriptors }
        };
        debug!("Described {} keypoints", features.len());
        Ok(features)
    }

    /// `(index_in_a, index_in_b)` pairs passing the ratio test
    pub fn match_features(&self, a: &Features, b: &Features) -> Vec<(usize, usize)> {
        let matches = self.extractor.match_descriptors(&a.descriptors, &b.descriptors);
        info!("{} matches between {} and {} features", matches.len(), a.len(), b.len());
        matches
    }
}

/// Loads an image file as a luminance grid with the given border policy.
pub fn load_grid<P: AsRef<Path>>(path: P, border: BorderPolicy) -> PipelineResult<Grid> {
    let image = image::open(path.as_ref())?.to_luma8();
    let (width, height) = image.dimensions();
    let grid = Grid::from_luma8(width as usize, height as usize, image.as_raw())?;
    debug!("Loaded {} ({width}x{height})", path.as_ref().display());
    Ok(grid.with_border(border))
}
