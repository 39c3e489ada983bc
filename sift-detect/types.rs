use crate::error::{DetectError, DetectResult};
use sift_core::Grid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parameters of a Gaussian scale-space pyramid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PyramidSpec {
    /// Blur already present in the input image
    pub sigma_a: f64,
    /// Blur of level 0 of every octave, in that octave's pixels
    pub sigma0: f64,
    pub octave_count: usize,
    /// Levels spanning one doubling of sigma (inclusive of both ends)
    pub level_count: usize,
    /// Extra levels per octave continuing the progression past `2 * sigma0`
    #[cfg_attr(feature = "serde", serde(default))]
    pub overlap: usize,
}

impl PyramidSpec {
    pub fn new(sigma_a: f64, sigma0: f64, octave_count: usize, level_count: usize) -> Self {
        Self {
            sigma_a,
            sigma0,
            octave_count,
            level_count,
            overlap: 0,
        }
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Ratio between the sigmas of adjacent levels.
    pub fn sigma_step(&self) -> f64 {
        2f64.powf(1.0 / (self.level_count as f64 - 1.0))
    }

    /// Closed-form effective sigma of `(octave, level)`.
    pub fn effective_sigma(&self, octave: usize, level: usize) -> f64 {
        self.sigma0 * 2f64.powi(octave as i32) * self.sigma_step().powi(level as i32)
    }

    pub fn validate(&self) -> DetectResult<()> {
        if self.level_count < 2 {
            return Err(DetectError::InvalidPyramid(format!(
                "level count {} (must be >= 2)",
                self.level_count
            )));
        }
        if self.octave_count == 0 {
            return Err(DetectError::InvalidPyramid("octave count must be >= 1".into()));
        }
        if !(self.sigma0.is_finite() && self.sigma0 > 0.0) {
            return Err(DetectError::InvalidPyramid(format!(
                "sigma0 {} (must be > 0)",
                self.sigma0
            )));
        }
        if !(self.sigma_a.is_finite() && self.sigma_a >= 0.0) {
            return Err(DetectError::InvalidPyramid(format!(
                "sigma_a {} (must be >= 0)",
                self.sigma_a
            )));
        }
        Ok(())
    }
}

impl Default for PyramidSpec {
    fn default() -> Self {
        Self::new(0.5, 1.6, 4, 5)
    }
}

/// One image of a scale-space pyramid together with its blur bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidLevel {
    pub octave: usize,
    pub level: usize,
    /// Blur measured in this octave's own pixel units
    pub sigma_local: f64,
    /// Incremental blur applied on top of the previous level
    pub sigma_applied: f64,
    /// Cumulative blur relative to the input image
    pub sigma_effective: f64,
    /// Level past the primary `level_count` range of its octave
    pub overlap: bool,
    pub image: Grid,
}

impl PyramidLevel {
    /// Factor mapping this level's pixel coordinates back to the base image.
    pub fn scale(&self) -> f64 {
        2f64.powi(self.octave as i32)
    }

    /// Same metadata, new image.
    pub fn with_image(&self, image: Grid) -> Self {
        Self {
            octave: self.octave,
            level: self.level,
            sigma_local: self.sigma_local,
            sigma_applied: self.sigma_applied,
            sigma_effective: self.sigma_effective,
            overlap: self.overlap,
            image,
        }
    }
}

/// Harris response formula.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HarrisFormula {
    /// Smaller eigenvalue of the structure tensor
    #[default]
    MinEigenvalue,
    /// `det - k * trace^2`
    DetTrace { k: f64 },
}

/// Corner response operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CornerMethod {
    Moravec,
    #[default]
    Harris,
}

impl CornerMethod {
    pub fn name(self) -> &'static str {
        match self {
            CornerMethod::Moravec => "moravec",
            CornerMethod::Harris => "harris",
        }
    }
}

/// File naming used when dumping pyramid levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelNaming {
    /// `oct[o,l] <sigma local> <sigma effective>.<ext>`
    #[default]
    Detailed,
    /// `oct[o,l].<ext>`
    Short,
}
