use crate::descriptor::DistanceMetric;
use crate::error::{DescriptorError, DescriptorResult};
use crate::matching::DEFAULT_NNDR_THRESHOLD;
use crate::orientation::DEFAULT_ORIENTATION_BINS;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Invariances applied while filling a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capabilities {
    /// Sample in the keypoint's rotated frame and measure directions relative to its angle
    pub rotation_invariant: bool,
    /// Grow the patch with the keypoint scale and spread samples bilinearly over cells
    pub scale_invariant: bool,
}

impl Capabilities {
    pub const PLAIN: Self = Self {
        rotation_invariant: false,
        scale_invariant: false,
    };
    pub const ROTATION: Self = Self {
        rotation_invariant: true,
        scale_invariant: false,
    };
    pub const FULL: Self = Self {
        rotation_invariant: true,
        scale_invariant: true,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ROTATION
    }
}

/// Descriptor layout, orientation and matching settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractorConfig {
    /// Side of the square sampling patch in pixels
    pub grid_size: usize,
    /// Cells per patch side
    pub cell_count: usize,
    /// Orientation bins per cell histogram
    pub bin_count: usize,
    /// Bins of the keypoint orientation histogram
    #[cfg_attr(feature = "serde", serde(default = "default_orientation_bins"))]
    pub orientation_bins: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metric: DistanceMetric,
    /// Nearest-neighbour distance ratio a match must stay below
    #[cfg_attr(feature = "serde", serde(default = "default_nndr_threshold"))]
    pub nndr_threshold: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub capabilities: Capabilities,
}

#[cfg(feature = "serde")]
fn default_orientation_bins() -> usize {
    DEFAULT_ORIENTATION_BINS
}

#[cfg(feature = "serde")]
fn default_nndr_threshold() -> f64 {
    DEFAULT_NNDR_THRESHOLD
}

impl ExtractorConfig {
    /// Default `(16, 4, 8)` layout with 36 orientation bins and NNDR 0.66
    pub fn new() -> Self {
        Self {
            grid_size: 16,
            cell_count: 4,
            bin_count: 8,
            orientation_bins: DEFAULT_ORIENTATION_BINS,
            metric: DistanceMetric::default(),
            nndr_threshold: DEFAULT_NNDR_THRESHOLD,
            capabilities: Capabilities::default(),
        }
    }

    /// Same defaults with the given `(grid, cells, bins)` layout
    pub fn with_layout(grid_size: usize, cell_count: usize, bin_count: usize) -> Self {
        Self {
            grid_size,
            cell_count,
            bin_count,
            ..Self::new()
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.nndr_threshold = threshold;
        self
    }

    /// Length of the descriptors this configuration produces
    pub fn descriptor_len(&self) -> usize {
        self.cell_count * self.cell_count * self.bin_count
    }

    pub fn summary(&self) -> String {
        format!(
            "descriptor=({}, {}, {}) [{} values], orientation bins={}, rotation={}, scale={}, metric={}, NNDR<{}",
            self.grid_size,
            self.cell_count,
            self.bin_count,
            self.descriptor_len(),
            self.orientation_bins,
            self.capabilities.rotation_invariant,
            self.capabilities.scale_invariant,
            self.metric.name(),
            self.nndr_threshold
        )
    }

    pub fn validate(&self) -> DescriptorResult<()> {
        if self.grid_size < 2 {
            return Err(DescriptorError::InvalidLayout(format!(
                "grid size {} (need at least 2)",
                self.grid_size
            )));
        }
        if self.cell_count == 0 || self.cell_count > self.grid_size || self.grid_size % self.cell_count != 0 {
            return Err(DescriptorError::InvalidLayout(format!(
                "{} cells do not evenly split a {}-pixel grid",
                self.cell_count, self.grid_size
            )));
        }
        if self.bin_count == 0 {
            return Err(DescriptorError::InvalidLayout("bin count must be > 0".to_string()));
        }
        if self.orientation_bins < 2 {
            return Err(DescriptorError::InvalidLayout(format!(
                "{} orientation bins (need at least 2)",
                self.orientation_bins
            )));
        }
        if !(self.nndr_threshold.is_finite() && self.nndr_threshold > 0.0) {
            return Err(DescriptorError::InvalidLayout(format!(
                "NNDR threshold {} must be > 0",
                self.nndr_threshold
            )));
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new()
    }
}
