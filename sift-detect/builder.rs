use crate::config::{AnmsSpec, DetectorConfig};
use crate::detector::FeatureDetector;
use crate::error::DetectResult;
use crate::types::{CornerMethod, HarrisFormula, PyramidSpec};
use sift_core::BorderPolicy;

/// Builder for creating a [`FeatureDetector`]
#[derive(Debug, Clone, Default)]
pub struct DetectorBuilder {
    config: DetectorConfig,
}

impl DetectorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the border policy applied to input images
    pub fn border(mut self, border: BorderPolicy) -> Self {
        self.config.border = border;
        self
    }

    /// Blur images with this sigma before the corner operator
    pub fn blur_sigma(mut self, sigma: f64) -> Self {
        self.config.blur_sigma = Some(sigma);
        self
    }

    /// Skip the pre-blur
    pub fn no_blur(mut self) -> Self {
        self.config.blur_sigma = None;
        self
    }

    /// Set the full pyramid specification
    pub fn pyramid(mut self, spec: PyramidSpec) -> Self {
        self.config.pyramid = spec;
        self
    }

    pub fn octaves(mut self, octave_count: usize) -> Self {
        self.config.pyramid.octave_count = octave_count;
        self
    }

    pub fn levels(mut self, level_count: usize) -> Self {
        self.config.pyramid.level_count = level_count;
        self
    }

    /// Extra pyramid levels per octave
    pub fn overlap(mut self, overlap: usize) -> Self {
        self.config.pyramid.overlap = overlap;
        self
    }

    /// Use the Moravec operator with the given window
    pub fn moravec(mut self, window: usize) -> Self {
        self.config.corner.method = CornerMethod::Moravec;
        self.config.corner.window = window;
        self
    }

    /// Use the Harris operator with the given window
    pub fn harris(mut self, window: usize) -> Self {
        self.config.corner.method = CornerMethod::Harris;
        self.config.corner.window = window;
        self
    }

    pub fn harris_formula(mut self, formula: HarrisFormula) -> Self {
        self.config.corner.harris_formula = formula;
        self
    }

    /// Size of the window a corner must dominate
    pub fn local_max_window(mut self, window: usize) -> Self {
        self.config.corner.local_max_window = window;
        self
    }

    /// Set the corner response threshold
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.corner.threshold = threshold;
        self
    }

    /// Thin corners to `target` points by ANMS
    pub fn anms(mut self, target: usize) -> Self {
        let spec = self.config.anms.unwrap_or_default();
        self.config.anms = Some(AnmsSpec { target, ..spec });
        self
    }

    /// Set the ANMS radius sweep range
    pub fn anms_radii(mut self, min_radius: f64, max_radius: f64) -> Self {
        let spec = self.config.anms.unwrap_or_default();
        self.config.anms = Some(AnmsSpec {
            min_radius,
            max_radius,
            ..spec
        });
        self
    }

    pub fn no_anms(mut self) -> Self {
        self.config.anms = None;
        self
    }

    /// Set the DoG neighbourhood radius
    pub fn extrema_radius(mut self, radius: usize) -> Self {
        self.config.extrema.radius = radius;
        self
    }

    /// Set the minimum absolute DoG value
    pub fn extrema_threshold(mut self, threshold: f64) -> Self {
        self.config.extrema.threshold = threshold;
        self
    }

    /// Keep only DoG extrema with a Harris response above `threshold`
    pub fn harris_filter(mut self, threshold: f64, window: usize) -> Self {
        self.config.extrema.harris_threshold = Some(threshold);
        self.config.extrema.harris_window = window;
        self
    }

    /// Apply the single-scale corner preset
    pub fn preset_corners(mut self) -> Self {
        self.config = DetectorConfig::corner_preset();
        self
    }

    /// Apply the scale-space preset
    pub fn preset_scale_space(mut self) -> Self {
        self.config = DetectorConfig::scale_space_preset();
        self
    }

    /// Build the [`FeatureDetector`], validating the configuration
    pub fn build(self) -> DetectResult<FeatureDetector> {
        FeatureDetector::new(self.config)
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Create a builder from an existing [`DetectorConfig`]
    pub fn from_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Convert the builder into a [`DetectorConfig`]
    pub fn to_config(self) -> DetectorConfig {
        self.config
    }
}
