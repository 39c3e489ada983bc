use crate::error::{DescriptorError, DescriptorResult};
use log::warn;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-bin ceiling applied between the two normalization passes.
pub const TRUNCATION_LIMIT: f64 = 0.2;

/// Distance between two descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DistanceMetric {
    /// Manhattan
    L1,
    /// Euclidean
    #[default]
    L2,
    /// Sum of squared differences
    Ssd,
}

impl DistanceMetric {
    pub fn name(self) -> &'static str {
        match self {
            DistanceMetric::L1 => "L1",
            DistanceMetric::L2 => "L2",
            DistanceMetric::Ssd => "SSD",
        }
    }
}

/// Spatial layout of a grid descriptor: a square patch of `grid_size`
/// pixels split into `cell_count x cell_count` cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub grid_size: usize,
    pub cell_count: usize,
    pub cell_size: f64,
}

/// Histogram of orientation histograms, stored histogram-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    values: Vec<f64>,
    histogram_count: usize,
    bin_count: usize,
    layout: Option<GridLayout>,
}

impl Descriptor {
    /// Zero-filled descriptor of `histogram_count` histograms with `bin_count` bins each.
    pub fn new(histogram_count: usize, bin_count: usize) -> Self {
        Self {
            values: vec![0.0; histogram_count * bin_count],
            histogram_count,
            bin_count,
            layout: None,
        }
    }

    /// Zero-filled descriptor with one histogram per cell of a square grid.
    pub fn with_grid(grid_size: usize, cell_count: usize, bin_count: usize) -> Self {
        let mut descriptor = Self::new(cell_count * cell_count, bin_count);
        descriptor.layout = Some(GridLayout {
            grid_size,
            cell_count,
            cell_size: grid_size as f64 / cell_count.max(1) as f64,
        });
        descriptor
    }

    pub fn from_values(values: Vec<f64>, histogram_count: usize, bin_count: usize) -> DescriptorResult<Self> {
        if values.len() != histogram_count * bin_count {
            return Err(DescriptorError::InvalidLayout(format!(
                "{} values do not fill {histogram_count} histograms of {bin_count} bins",
                values.len()
            )));
        }
        Ok(Self {
            values,
            histogram_count,
            bin_count,
            layout: None,
        })
    }

    pub fn histogram_count(&self) -> usize {
        self.histogram_count
    }

    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn layout(&self) -> Option<&GridLayout> {
        self.layout.as_ref()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Bins of one histogram.
    pub fn histogram(&self, histogram: usize) -> &[f64] {
        let start = histogram * self.bin_count;
        &self.values[start..start + self.bin_count]
    }

    pub fn at(&self, histogram: usize, bin: usize) -> f64 {
        self.values[histogram * self.bin_count + bin]
    }

    /// Adds `value` to one bin.
    pub fn accumulate(&mut self, histogram: usize, bin: usize, value: f64) {
        self.values[histogram * self.bin_count + bin] += value;
    }

    /// Euclidean norm.
    pub fn length(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Scales to unit length. A zero (or non-finite) descriptor is left unchanged.
    pub fn normalize(&mut self) {
        let length = self.length();
        if !(length.is_finite() && length > 0.0) {
            warn!("Cannot normalize descriptor of length {length}");
            return;
        }
        for v in &mut self.values {
            *v /= length;
        }
    }

    /// Clips every bin at `max`.
    pub fn truncate(&mut self, max: f64) {
        for v in &mut self.values {
            if *v > max {
                *v = max;
            }
        }
    }

    /// Normalize, clip at [`TRUNCATION_LIMIT`], normalize again.
    pub fn finalize(&mut self) {
        self.normalize();
        self.truncate(TRUNCATION_LIMIT);
        self.normalize();
    }

    pub fn distance(&self, other: &Descriptor, metric: DistanceMetric) -> DescriptorResult<f64> {
        if self.len() != other.len() {
            return Err(DescriptorError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        let diffs = self.values.iter().zip(&other.values).map(|(a, b)| a - b);
        Ok(match metric {
            DistanceMetric::L1 => diffs.map(f64::abs).sum(),
            DistanceMetric::L2 => diffs.map(|d| d * d).sum::<f64>().sqrt(),
            DistanceMetric::Ssd => diffs.map(|d| d * d).sum(),
        })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for histogram in 0..self.histogram_count {
            let row: Vec<String> = self.histogram(histogram).iter().map(|v| format!("{v:.4}")).collect();
            writeln!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}
