use crate::error::{DescriptorError, DescriptorResult};
use log::debug;
use sift_core::{kernels, Grid, KeyPoint};
use std::f64::consts::TAU;

/// Default number of orientation bins.
pub const DEFAULT_ORIENTATION_BINS: usize = 36;

/// A second orientation is emitted when its peak reaches this fraction of the maximum.
pub const SECONDARY_PEAK_RATIO: f64 = 0.8;

/// Orientation histogram smoothing in units of the keypoint scale.
pub const ORIENTATION_SIGMA: f64 = 1.5;

/// The two bins an angle is split between, with their linear weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinWeights {
    pub primary: usize,
    pub secondary: usize,
    pub primary_weight: f64,
    pub secondary_weight: f64,
}

/// Primary and secondary bin for angle `phi` in `[0, 2pi]`.
///
/// The primary bin contains `phi`; the secondary is its neighbour on the
/// side of the bin centre `phi` falls on. Both wrap around the circle, and
/// `phi == bin_count * bin_size` lands in bin 0.
pub fn bin_indexes(phi: f64, bin_size: f64, bin_count: usize) -> (usize, usize) {
    let n = bin_count as i64;
    let position = phi / bin_size;
    let primary = position.floor() as i64;
    let nearest_edge = (position + 0.5).floor() as i64;
    let secondary = if primary == nearest_edge { primary - 1 } else { primary + 1 };
    (primary.rem_euclid(n) as usize, secondary.rem_euclid(n) as usize)
}

/// [`bin_indexes`] plus linear weights from the distance to the primary bin centre.
pub fn bin_weights(phi: f64, bin_size: f64, bin_count: usize) -> BinWeights {
    let (primary, secondary) = bin_indexes(phi, bin_size, bin_count);
    let centre = primary as f64 * bin_size + bin_size / 2.0;
    let raw = (centre - phi).abs().rem_euclid(TAU);
    let dist = raw.min(TAU - raw);
    BinWeights {
        primary,
        secondary,
        primary_weight: 1.0 - dist / bin_size,
        secondary_weight: dist / bin_size,
    }
}

/// Wraps an angle into `[0, 2pi)`.
pub fn wrap_angle(phi: f64) -> f64 {
    let wrapped = phi.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Dominant-gradient orientation assignment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationEstimator {
    bins: usize,
    radius: usize,
}

impl OrientationEstimator {
    /// `bins` angular bins over a patch of radius `grid_size / 2`.
    pub fn new(bins: usize, grid_size: usize) -> DescriptorResult<Self> {
        if bins < 2 {
            return Err(DescriptorError::InvalidLayout(format!("{bins} orientation bins (need at least 2)")));
        }
        if grid_size < 2 {
            return Err(DescriptorError::InvalidLayout(format!("patch size {grid_size} (need at least 2)")));
        }
        Ok(Self {
            bins,
            radius: grid_size / 2,
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Gaussian-weighted gradient orientation histogram around `(row, col)`.
    ///
    /// `scale` widens both the patch and the Gaussian (sigma `1.5 * scale`).
    pub fn histogram(&self, dirs: &Grid, grad: &Grid, row: isize, col: isize, scale: f64) -> Vec<f64> {
        let bin_size = TAU / self.bins as f64;
        let radius = (self.radius as f64 * scale).ceil().max(1.0) as usize;
        let size = 2 * radius + 1;
        let weights = kernels::gaussian_kernel(size, size, ORIENTATION_SIGMA * scale);
        let r = radius as isize;

        let mut histogram = vec![0.0; self.bins];
        for i in -r..r {
            for j in -r..r {
                let phi = dirs.get(row + i, col + j);
                let magnitude = grad.get(row + i, col + j) * weights.at((i + r) as usize, (j + r) as usize);
                let w = bin_weights(phi, bin_size, self.bins);
                histogram[w.primary] += magnitude * w.primary_weight;
                histogram[w.secondary] += magnitude * w.secondary_weight;
            }
        }
        histogram
    }

    /// Angles of the strongest bin and, when it reaches 80% of the maximum,
    /// of the second strongest. A histogram with no mass yields angle 0.
    pub fn dominant_angles(&self, histogram: &[f64]) -> Vec<f64> {
        let mut max = (usize::MAX, f64::NEG_INFINITY);
        let mut second = (usize::MAX, f64::NEG_INFINITY);
        for (i, &v) in histogram.iter().enumerate() {
            if v > max.1 {
                second = max;
                max = (i, v);
            } else if v > second.1 {
                second = (i, v);
            }
        }

        if !(max.1 > 0.0) {
            return vec![0.0];
        }
        let bin_angle = TAU / histogram.len() as f64;
        let mut angles = vec![max.0 as f64 * bin_angle];
        if second.0 != usize::MAX && second.1 >= SECONDARY_PEAK_RATIO * max.1 {
            angles.push(second.0 as f64 * bin_angle);
        }
        angles
    }

    /// Oriented copies of `point`, sampled at `(row, col)` of the given gradient grids.
    pub fn orient(&self, dirs: &Grid, grad: &Grid, point: &KeyPoint, row: isize, col: isize, scale: f64) -> Vec<KeyPoint> {
        let histogram = self.histogram(dirs, grad, row, col, scale);
        self.dominant_angles(&histogram)
            .into_iter()
            .map(|angle| point.with_angle(angle))
            .collect()
    }

    /// Assigns orientations to single-scale keypoints of `image`.
    ///
    /// Each keypoint yields one or two copies; inputs are left untouched.
    pub fn assign(&self, image: &Grid, points: &[KeyPoint]) -> Vec<KeyPoint> {
        let grad = image.sobel_magnitude();
        let dirs = image.gradient_direction();
        let oriented: Vec<KeyPoint> = points
            .iter()
            .flat_map(|p| self.orient(&dirs, &grad, p, p.y.round() as isize, p.x.round() as isize, 1.0))
            .collect();
        debug!("Assigned {} orientations to {} keypoints", oriented.len(), points.len());
        oriented
    }
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self {
            bins: DEFAULT_ORIENTATION_BINS,
            radius: 8,
        }
    }
}
