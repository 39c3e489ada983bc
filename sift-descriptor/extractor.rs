use crate::config::{Capabilities, ExtractorConfig};
use crate::descriptor::Descriptor;
use crate::error::DescriptorResult;
use crate::matching::find_matches;
use crate::orientation::{bin_weights, wrap_angle, BinWeights, OrientationEstimator};
use log::debug;
use sift_core::{kernels, Grid, KeyPoint};
use sift_detect::ScaleSpacePyramid;
use std::f64::consts::{SQRT_2, TAU};

/// Gradient-histogram descriptor extractor.
///
/// A descriptor samples a `grid_size` square patch around the keypoint,
/// split into `cell_count x cell_count` cells, each holding a `bin_count`
/// orientation histogram. Samples are weighted by gradient magnitude and a
/// Gaussian of sigma `grid_size / 6` centred on the patch.
#[derive(Debug, Clone)]
pub struct DescriptorExtractor {
    config: ExtractorConfig,
    cell_size: usize,
    orientation: OrientationEstimator,
    weights: Grid,
}

impl DescriptorExtractor {
    pub fn new(config: ExtractorConfig) -> DescriptorResult<Self> {
        config.validate()?;
        let size = config.grid_size + 1;
        Ok(Self {
            cell_size: config.grid_size / config.cell_count,
            orientation: OrientationEstimator::new(config.orientation_bins, config.grid_size)?,
            weights: kernels::try_gaussian_kernel(size, size, config.grid_size as f64 / 6.0)?,
            config,
        })
    }

    /// Extractor with default settings and the given `(grid, cells, bins)` layout
    pub fn with_layout(grid_size: usize, cell_count: usize, bin_count: usize) -> DescriptorResult<Self> {
        Self::new(ExtractorConfig::with_layout(grid_size, cell_count, bin_count))
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.config.capabilities
    }

    pub fn orientation(&self) -> &OrientationEstimator {
        &self.orientation
    }

    /// Oriented copies of single-scale keypoints.
    pub fn orient(&self, image: &Grid, points: &[KeyPoint]) -> Vec<KeyPoint> {
        self.orientation.assign(image, points)
    }

    /// One descriptor per keypoint, in input order.
    ///
    /// Keypoint angles are used as given; run [`Self::orient`] first for
    /// rotation invariance. With scale invariance on, the patch grows with
    /// the keypoint's sigma.
    pub fn compute(&self, image: &Grid, points: &[KeyPoint]) -> Vec<Descriptor> {
        let grad = image.sobel_magnitude();
        let dirs = image.gradient_direction();
        let capabilities = self.config.capabilities;

        let descriptors: Vec<Descriptor> = points
            .iter()
            .map(|p| {
                let scale = if capabilities.scale_invariant {
                    sanitize_scale(p.sigma)
                } else {
                    1.0
                };
                self.describe(&dirs, &grad, p, p.y.round() as isize, p.x.round() as isize, scale, capabilities)
            })
            .collect();
        debug!(
            "Computed {} descriptors ({}x{} cells, {} bins)",
            descriptors.len(),
            self.config.cell_count,
            self.config.cell_count,
            self.config.bin_count
        );
        descriptors
    }

    /// Orients and describes keypoints detected in `pyramid`.
    ///
    /// Each keypoint is sampled on the primary level closest to its sigma,
    /// with the patch scaled by `sigma / (2^octave * sigma0)`. Returns the
    /// oriented keypoints (one or two per input) and their descriptors,
    /// index-aligned.
    pub fn compute_scaled(&self, pyramid: &ScaleSpacePyramid, points: &[KeyPoint]) -> (Vec<KeyPoint>, Vec<Descriptor>) {
        let gradients = pyramid.gradient_pyramid();
        let directions = pyramid.directions_pyramid();
        let sigma0 = pyramid.spec().sigma0;
        let capabilities = Capabilities {
            scale_invariant: true,
            ..self.config.capabilities
        };

        let mut keypoints = Vec::with_capacity(points.len());
        let mut descriptors = Vec::with_capacity(points.len());
        for point in points {
            let level = pyramid.level_by_sigma(point.sigma);
            let (Some(grad), Some(dirs)) = (
                gradients.level(level.octave, level.level),
                directions.level(level.octave, level.level),
            ) else {
                continue;
            };

            let level_scale = level.scale();
            let row = (point.y / level_scale).round() as isize;
            let col = (point.x / level_scale).round() as isize;
            let scale = sanitize_scale(point.sigma / (level_scale * sigma0));

            let oriented = if capabilities.rotation_invariant {
                self.orientation.orient(&dirs.image, &grad.image, point, row, col, scale)
            } else {
                vec![*point]
            };
            for keypoint in oriented {
                descriptors.push(self.describe(&dirs.image, &grad.image, &keypoint, row, col, scale, capabilities));
                keypoints.push(keypoint);
            }
        }

        debug!(
            "Computed {} scale-aware descriptors for {} keypoints",
            descriptors.len(),
            points.len()
        );
        (keypoints, descriptors)
    }

    /// NNDR matches between two descriptor sets under the configured metric and threshold.
    pub fn match_descriptors(&self, a: &[Descriptor], b: &[Descriptor]) -> Vec<(usize, usize)> {
        find_matches(a, b, self.config.nndr_threshold, self.config.metric)
    }

    #[allow(clippy::too_many_arguments)]
    fn describe(
        &self,
        dirs: &Grid,
        grad: &Grid,
        point: &KeyPoint,
        row: isize,
        col: isize,
        scale: f64,
        capabilities: Capabilities,
    ) -> Descriptor {
        let mut descriptor = Descriptor::with_grid(self.config.grid_size, self.config.cell_count, self.config.bin_count);
        let angle = if capabilities.rotation_invariant { point.angle } else { 0.0 };
        self.fill(&mut descriptor, dirs, grad, row, col, angle, scale, capabilities.scale_invariant);
        descriptor.finalize();
        descriptor
    }

    /// Accumulates the patch around `(row, col)` into `descriptor`.
    ///
    /// Pixel offsets are rotated by `-angle` and divided by `scale` to get
    /// patch coordinates. Without `spread`, offsets are rounded and clamped
    /// into the patch and land in a single cell; with it, samples outside
    /// the patch are dropped and the rest are shared bilinearly between up
    /// to four neighbouring cells.
    #[allow(clippy::too_many_arguments)]
    fn fill(
        &self,
        descriptor: &mut Descriptor,
        dirs: &Grid,
        grad: &Grid,
        row: isize,
        col: isize,
        angle: f64,
        scale: f64,
        spread: bool,
    ) {
        let bins = self.config.bin_count;
        let bin_size = TAU / bins as f64;
        let radius = (self.config.grid_size / 2) as f64;
        // The rotated patch's corners reach sqrt(2) further out.
        let reach = if spread {
            (radius * scale * SQRT_2).ceil() as isize
        } else {
            (radius * scale).ceil() as isize
        };
        let (sin, cos) = angle.sin_cos();

        for dy in -reach..reach {
            for dx in -reach..reach {
                let (x, y) = (dx as f64 / scale, dy as f64 / scale);
                let u = x * cos + y * sin;
                let v = y * cos - x * sin;

                let magnitude = grad.get(row + dy, col + dx);
                let phi = wrap_angle(dirs.get(row + dy, col + dx) - angle);
                let w = bin_weights(phi, bin_size, bins);

                if spread {
                    if u < -radius || u >= radius || v < -radius || v >= radius {
                        continue;
                    }
                    let gauss = self.weights.at((v + radius).round() as usize, (u + radius).round() as usize);
                    self.spread(descriptor, u + radius, v + radius, magnitude * gauss, &w);
                } else {
                    let u = (u + 0.5).clamp(-radius, radius - 1.0);
                    let v = (v + 0.5).clamp(-radius, radius - 1.0);
                    let (i, j) = ((v + radius) as usize, (u + radius) as usize);
                    let histogram = (i / self.cell_size) * self.config.cell_count + j / self.cell_size;
                    let value = magnitude * self.weights.at(i, j);
                    descriptor.accumulate(histogram, w.primary, value * w.primary_weight);
                    descriptor.accumulate(histogram, w.secondary, value * w.secondary_weight);
                }
            }
        }
    }

    /// Bilinear share of one sample over the cells around patch position `(px, py)`.
    fn spread(&self, descriptor: &mut Descriptor, px: f64, py: f64, value: f64, w: &BinWeights) {
        let cells = self.config.cell_count as isize;
        let cell_size = self.cell_size as f64;
        let cx = px / cell_size - 0.5;
        let cy = py / cell_size - 0.5;
        let (c0, r0) = (cx.floor(), cy.floor());
        let (fx, fy) = (cx - c0, cy - r0);

        for (r, wy) in [(r0 as isize, 1.0 - fy), (r0 as isize + 1, fy)] {
            if r < 0 || r >= cells || wy <= 0.0 {
                continue;
            }
            for (c, wx) in [(c0 as isize, 1.0 - fx), (c0 as isize + 1, fx)] {
                if c < 0 || c >= cells || wx <= 0.0 {
                    continue;
                }
                let histogram = (r * cells + c) as usize;
                let share = value * wx * wy;
                descriptor.accumulate(histogram, w.primary, share * w.primary_weight);
                descriptor.accumulate(histogram, w.secondary, share * w.secondary_weight);
            }
        }
    }
}

impl Default for DescriptorExtractor {
    fn default() -> Self {
        let config = ExtractorConfig::default();
        let size = config.grid_size + 1;
        Self {
            cell_size: config.grid_size / config.cell_count,
            orientation: OrientationEstimator::default(),
            weights: kernels::gaussian_kernel(size, size, config.grid_size as f64 / 6.0),
            config,
        }
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}
