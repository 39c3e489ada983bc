use crate::corner_detection::CornerDetector;
use crate::error::{DetectError, DetectResult};
use crate::types::{HarrisFormula, LevelNaming, PyramidLevel, PyramidSpec};
use crate::utils::format_sigma;
use log::{debug, trace};
use sift_core::Grid;
use std::path::{Path, PathBuf};

/// Below this the first blur is treated as numerically zero.
const MIN_FIRST_BLUR: f64 = 1e-4;

/// Gaussian scale-space: `octave_count` octaves, each holding the primary
/// levels plus any overlap levels, stored octave-major.
///
/// Derived pyramids (DoG, Harris, gradients) reuse this type with the same
/// octave layout.
#[derive(Debug, Clone)]
pub struct ScaleSpacePyramid {
    spec: PyramidSpec,
    levels: Vec<PyramidLevel>,
    levels_per_octave: usize,
    primary_levels: usize,
}

impl ScaleSpacePyramid {
    /// Build the Gaussian pyramid of `image`.
    ///
    /// Every level is blurred incrementally from the previous one. The next
    /// octave starts from level `level_count - 1` (sigma `2 * sigma0`),
    /// downsampled by two. The image's border policy carries through.
    pub fn build(image: &Grid, spec: &PyramidSpec) -> DetectResult<Self> {
        spec.validate()?;
        if image.is_empty() {
            return Err(DetectError::ImageTooSmall {
                width: image.width(),
                height: image.height(),
                min_size: 1,
            });
        }

        let step = spec.sigma_step();
        let first_blur = match (spec.sigma0 * spec.sigma0 - spec.sigma_a * spec.sigma_a).sqrt() {
            s if s.is_nan() || s.abs() < MIN_FIRST_BLUR => 1.0,
            s => s,
        };
        let levels_per_octave = spec.level_count + spec.overlap;
        let mut levels = Vec::with_capacity(spec.octave_count * levels_per_octave);

        let mut current = image.gaussian(first_blur);
        let mut applied = first_blur;
        for octave in 0..spec.octave_count {
            let octave_start = levels.len();
            let mut sigma = spec.sigma0;
            for level in 0..levels_per_octave {
                if level > 0 {
                    let next_sigma = sigma * step;
                    applied = (next_sigma * next_sigma - sigma * sigma).sqrt();
                    current = current.gaussian(applied);
                    sigma = next_sigma;
                }
                trace!(
                    "octave {octave} level {level}: local={sigma:.4} applied={applied:.4} size={}x{}",
                    current.width(),
                    current.height()
                );
                levels.push(PyramidLevel {
                    octave,
                    level,
                    sigma_local: sigma,
                    sigma_applied: applied,
                    sigma_effective: spec.effective_sigma(octave, level),
                    overlap: level >= spec.level_count,
                    image: current.clone(),
                });
            }
            current = levels[octave_start + spec.level_count - 1].image.downsample(1);
            applied = 0.0;
        }

        debug!(
            "Built pyramid: {} octaves x {} levels ({} overlap), step={:.5}, first blur={:.5}",
            spec.octave_count, spec.level_count, spec.overlap, step, first_blur
        );

        Ok(Self {
            spec: *spec,
            levels,
            levels_per_octave,
            primary_levels: spec.level_count,
        })
    }

    pub fn spec(&self) -> &PyramidSpec {
        &self.spec
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn octave_count(&self) -> usize {
        self.spec.octave_count
    }

    pub fn levels_per_octave(&self) -> usize {
        self.levels_per_octave
    }

    /// Levels per octave excluding overlap levels.
    pub fn primary_levels(&self) -> usize {
        self.primary_levels
    }

    /// All levels of one octave, overlap included.
    pub fn octave(&self, octave: usize) -> &[PyramidLevel] {
        let start = (octave * self.levels_per_octave).min(self.levels.len());
        let end = (start + self.levels_per_octave).min(self.levels.len());
        &self.levels[start..end]
    }

    pub fn level(&self, octave: usize, level: usize) -> Option<&PyramidLevel> {
        if octave >= self.octave_count() || level >= self.levels_per_octave {
            return None;
        }
        self.levels.get(octave * self.levels_per_octave + level)
    }

    /// Difference-of-Gaussians: `upper - lower` for each adjacent pair in an
    /// octave, tagged with the lower level's sigmas.
    pub fn dog_pyramid(&self) -> Self {
        let mut levels = Vec::with_capacity(self.spec.octave_count * (self.levels_per_octave - 1));
        for octave in 0..self.octave_count() {
            for pair in self.octave(octave).windows(2) {
                let (lower, upper) = (&pair[0], &pair[1]);
                levels.push(lower.with_image(&upper.image - &lower.image));
            }
        }
        Self {
            spec: self.spec,
            levels,
            levels_per_octave: self.levels_per_octave - 1,
            primary_levels: self.primary_levels - 1,
        }
    }

    /// Harris response of every level.
    pub fn harris_pyramid(&self, window: usize, formula: HarrisFormula) -> DetectResult<Self> {
        self.try_map_levels(|grid| CornerDetector::harris(grid, window, formula))
    }

    /// Sobel gradient magnitude of every level.
    pub fn gradient_pyramid(&self) -> Self {
        self.map_levels(Grid::sobel_magnitude)
    }

    /// Gradient direction in `[0, 2π)` of every level.
    pub fn directions_pyramid(&self) -> Self {
        self.map_levels(Grid::gradient_direction)
    }

    pub fn map_levels(&self, f: impl Fn(&Grid) -> Grid) -> Self {
        Self {
            levels: self
                .levels
                .iter()
                .map(|level| level.with_image(f(&level.image)))
                .collect(),
            ..self.clone_layout()
        }
    }

    pub fn try_map_levels<E>(&self, f: impl Fn(&Grid) -> Result<Grid, E>) -> Result<Self, E> {
        let levels = self
            .levels
            .iter()
            .map(|level| f(&level.image).map(|image| level.with_image(image)))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self {
            levels,
            ..self.clone_layout()
        })
    }

    /// Primary level nearest to `sigma` along the global progression
    /// `sigma0 * step^k`, clamped to the pyramid.
    pub fn level_by_sigma(&self, sigma: f64) -> &PyramidLevel {
        let intervals = self.spec.level_count - 1;
        let max_index = self.spec.octave_count * intervals;
        let index = (sigma / self.spec.sigma0).ln() / self.spec.sigma_step().ln();
        let index = if index.is_finite() {
            index.round().clamp(0.0, max_index as f64) as usize
        } else if index == f64::INFINITY {
            max_index
        } else {
            0
        };
        let octave = (index / intervals).min(self.spec.octave_count - 1);
        let level = (index - octave * intervals).min(self.primary_levels - 1);
        &self.levels[octave * self.levels_per_octave + level]
    }

    /// Primary level of `octave` whose effective sigma is closest to `sigma`.
    pub fn level_by_sigma_in_octave(&self, octave: usize, sigma: f64) -> Option<&PyramidLevel> {
        self.octave(octave)
            .iter()
            .take(self.primary_levels)
            .min_by(|a, b| {
                (sigma - a.sigma_effective)
                    .abs()
                    .total_cmp(&(sigma - b.sigma_effective).abs())
            })
    }

    /// `L(x, y, sigma)`: sample of the level nearest to `sigma` at base-image
    /// coordinates `(x, y)`.
    pub fn value_at(&self, x: f64, y: f64, sigma: f64) -> f64 {
        let level = self.level_by_sigma(sigma);
        let scale = level.scale();
        let row = (y / scale).floor() as isize;
        let col = (x / scale).floor() as isize;
        let value = level.image.get(row, col);
        debug!(
            "L({x}, {y}, {sigma}): octave {} level {} local={} effective={} -> {value}",
            level.octave,
            level.level,
            format_sigma(level.sigma_local),
            format_sigma(level.sigma_effective)
        );
        value
    }

    /// File name for one level under the given naming scheme.
    pub fn level_file_name(level: &PyramidLevel, naming: LevelNaming, ext: &str) -> String {
        match naming {
            LevelNaming::Detailed => format!(
                "oct[{},{}] {} {}.{ext}",
                level.octave,
                level.level,
                format_sigma(level.sigma_local),
                format_sigma(level.sigma_effective)
            ),
            LevelNaming::Short => format!("oct[{},{}].{ext}", level.octave, level.level),
        }
    }

    /// Hand every level, rescaled to `[0, 255]`, to `save` with its target path.
    ///
    /// Returns the paths written, in pyramid order. Stops at the first error.
    pub fn save_levels<E, F>(
        &self,
        dir: &Path,
        ext: &str,
        naming: LevelNaming,
        mut save: F,
    ) -> Result<Vec<PathBuf>, E>
    where
        F: FnMut(&Grid, &Path) -> Result<(), E>,
    {
        let mut written = Vec::with_capacity(self.levels.len());
        for level in &self.levels {
            let path = dir.join(Self::level_file_name(level, naming, ext));
            save(&level.image.normalize_range(0.0, 255.0), &path)?;
            written.push(path);
        }
        debug!("Saved {} pyramid levels to {}", written.len(), dir.display());
        Ok(written)
    }

    fn clone_layout(&self) -> Self {
        Self {
            spec: self.spec,
            levels: Vec::new(),
            levels_per_octave: self.levels_per_octave,
            primary_levels: self.primary_levels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_core::BorderPolicy;

    fn gradient_image(width: usize, height: usize) -> Grid {
        let mut grid = Grid::new(width, height);
        for row in 0..height {
            for col in 0..width {
                grid.set(row, col, ((row * 7 + col * 3) % 17) as f64 / 17.0);
            }
        }
        grid
    }

    #[test]
    fn test_layout_and_dimensions() {
        let pyramid = ScaleSpacePyramid::build(&gradient_image(64, 48), &PyramidSpec::default()).unwrap();
        assert_eq!(pyramid.len(), 20);
        assert_eq!(pyramid.level(0, 0).unwrap().image.dimensions(), (64, 48));
        assert_eq!(pyramid.level(1, 0).unwrap().image.dimensions(), (32, 24));
        assert_eq!(pyramid.level(3, 4).unwrap().image.dimensions(), (8, 6));
        assert!(pyramid.level(4, 0).is_none());
    }

    #[test]
    fn test_local_and_applied_sigmas() {
        let spec = PyramidSpec::default();
        let pyramid = ScaleSpacePyramid::build(&gradient_image(32, 32), &spec).unwrap();
        let step = spec.sigma_step();
        let first = pyramid.level(0, 0).unwrap();
        assert!((first.sigma_applied - (1.6f64 * 1.6 - 0.25).sqrt()).abs() < 1e-12);
        for octave in 0..4 {
            let levels = pyramid.octave(octave);
            assert!((levels[0].sigma_local - 1.6).abs() < 1e-12);
            assert!((levels[4].sigma_local - 3.2).abs() < 1e-9);
            for pair in levels.windows(2) {
                let expected = (pair[1].sigma_local.powi(2) - pair[0].sigma_local.powi(2)).sqrt();
                assert!((pair[1].sigma_applied - expected).abs() < 1e-12);
                assert!((pair[1].sigma_local / pair[0].sigma_local - step).abs() < 1e-12);
            }
        }
        assert_eq!(pyramid.level(1, 0).unwrap().sigma_applied, 0.0);
    }

    #[test]
    fn test_first_blur_fallback() {
        let spec = PyramidSpec::new(1.6, 1.6, 1, 3);
        let pyramid = ScaleSpacePyramid::build(&gradient_image(16, 16), &spec).unwrap();
        assert_eq!(pyramid.level(0, 0).unwrap().sigma_applied, 1.0);

        // sigma_a above sigma0 makes the radicand negative
        let spec = PyramidSpec::new(2.0, 1.6, 1, 3);
        let pyramid = ScaleSpacePyramid::build(&gradient_image(16, 16), &spec).unwrap();
        assert_eq!(pyramid.level(0, 0).unwrap().sigma_applied, 1.0);
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let image = gradient_image(8, 8);
        assert!(ScaleSpacePyramid::build(&image, &PyramidSpec::new(0.5, 1.6, 2, 1)).is_err());
        assert!(ScaleSpacePyramid::build(&image, &PyramidSpec::new(0.5, 1.6, 0, 4)).is_err());
        assert!(ScaleSpacePyramid::build(&image, &PyramidSpec::new(0.5, 0.0, 2, 4)).is_err());
        assert!(ScaleSpacePyramid::build(&Grid::new(0, 0), &PyramidSpec::default()).is_err());
    }

    #[test]
    fn test_overlap_levels() {
        let spec = PyramidSpec::new(0.5, 1.6, 2, 4).with_overlap(2);
        let pyramid = ScaleSpacePyramid::build(&gradient_image(32, 32), &spec).unwrap();
        assert_eq!(pyramid.levels_per_octave(), 6);
        assert_eq!(pyramid.primary_levels(), 4);
        let octave0 = pyramid.octave(0);
        assert!(!octave0[3].overlap);
        assert!(octave0[4].overlap && octave0[5].overlap);
        // Overlap continues the progression past 2 * sigma0
        assert!((octave0[4].sigma_effective - spec.effective_sigma(0, 4)).abs() < 1e-12);
        // The next octave is seeded from the 2 * sigma0 level, not the last overlap level
        let expected = octave0[3].image.downsample(1);
        assert_eq!(pyramid.level(1, 0).unwrap().image, expected);
    }

    #[test]
    fn test_dog_pyramid() {
        let spec = PyramidSpec::new(0.5, 1.6, 2, 4);
        let pyramid = ScaleSpacePyramid::build(&gradient_image(24, 24), &spec).unwrap();
        let dog = pyramid.dog_pyramid();
        assert_eq!(dog.len(), 6);
        assert_eq!(dog.levels_per_octave(), 3);
        let d = dog.level(1, 2).unwrap();
        let lower = pyramid.level(1, 2).unwrap();
        let upper = pyramid.level(1, 3).unwrap();
        assert_eq!(d.sigma_effective, lower.sigma_effective);
        assert_eq!(d.image, &upper.image - &lower.image);
    }

    #[test]
    fn test_derived_pyramids_keep_metadata() {
        let pyramid =
            ScaleSpacePyramid::build(&gradient_image(24, 24), &PyramidSpec::new(0.5, 1.6, 2, 3)).unwrap();
        let gradients = pyramid.gradient_pyramid();
        let directions = pyramid.directions_pyramid();
        let harris = pyramid.harris_pyramid(5, HarrisFormula::default()).unwrap();
        for derived in [&gradients, &directions, &harris] {
            assert_eq!(derived.len(), pyramid.len());
            for (a, b) in derived.levels().iter().zip(pyramid.levels()) {
                assert_eq!((a.octave, a.level), (b.octave, b.level));
                assert_eq!(a.sigma_effective, b.sigma_effective);
                assert_eq!(a.image.dimensions(), b.image.dimensions());
            }
        }
        assert!(pyramid.harris_pyramid(0, HarrisFormula::default()).is_err());
    }

    #[test]
    fn test_level_by_sigma() {
        let spec = PyramidSpec::default();
        let pyramid = ScaleSpacePyramid::build(&gradient_image(64, 64), &spec).unwrap();
        for octave in 0..4 {
            for level in 0..4 {
                let sigma = spec.effective_sigma(octave, level);
                let found = pyramid.level_by_sigma(sigma);
                assert_eq!((found.octave, found.level), (octave, level), "sigma {sigma}");
            }
        }
        // Top of the progression maps to the last primary level
        let top = pyramid.level_by_sigma(spec.effective_sigma(3, 4));
        assert_eq!((top.octave, top.level), (3, 4));
        // Far outside clamps
        let low = pyramid.level_by_sigma(0.01);
        assert_eq!((low.octave, low.level), (0, 0));
        let high = pyramid.level_by_sigma(1e6);
        assert_eq!((high.octave, high.level), (3, 4));
        let zero = pyramid.level_by_sigma(0.0);
        assert_eq!((zero.octave, zero.level), (0, 0));
    }

    #[test]
    fn test_level_by_sigma_in_octave() {
        let spec = PyramidSpec::new(0.5, 1.6, 2, 4).with_overlap(1);
        let pyramid = ScaleSpacePyramid::build(&gradient_image(32, 32), &spec).unwrap();
        let found = pyramid.level_by_sigma_in_octave(1, 4.1).unwrap();
        assert_eq!((found.octave, found.level), (1, 1));
        // Overlap levels are never returned
        let found = pyramid.level_by_sigma_in_octave(0, 100.0).unwrap();
        assert_eq!(found.level, 3);
        assert!(pyramid.level_by_sigma_in_octave(2, 1.6).is_none());
    }

    #[test]
    fn test_value_at() {
        let mut image = Grid::new(16, 16);
        image.set(4, 6, 1.0);
        let pyramid = ScaleSpacePyramid::build(&image, &PyramidSpec::new(0.5, 1.6, 2, 3)).unwrap();
        let level = pyramid.level(1, 0).unwrap();
        let expected = level.image.at(2, 3);
        assert_eq!(pyramid.value_at(7.0, 5.0, level.sigma_effective), expected);
    }

    #[test]
    fn test_save_levels_names_and_range() {
        let pyramid =
            ScaleSpacePyramid::build(&gradient_image(16, 16), &PyramidSpec::new(0.5, 1.6, 2, 3)).unwrap();
        let mut seen = Vec::new();
        let paths = pyramid
            .save_levels(Path::new("out"), "png", LevelNaming::Detailed, |grid, path| {
                let (lo, hi) = grid.min_max().unwrap_or((0.0, 0.0));
                assert!(lo >= 0.0 && hi <= 255.0 + 1e-9);
                seen.push(path.to_path_buf());
                Ok::<(), std::io::Error>(())
            })
            .unwrap();
        assert_eq!(paths, seen);
        assert_eq!(paths.len(), 6);
        assert_eq!(paths[0], Path::new("out").join("oct[0,0] 1.6 1.6.png"));
        assert_eq!(paths[5], Path::new("out").join("oct[1,2] 3.2 6.4.png"));

        let short = ScaleSpacePyramid::level_file_name(&pyramid.levels()[4], LevelNaming::Short, "jpg");
        assert_eq!(short, "oct[1,1].jpg");
    }

    #[test]
    fn test_save_levels_stops_on_error() {
        let pyramid =
            ScaleSpacePyramid::build(&gradient_image(8, 8), &PyramidSpec::new(0.5, 1.6, 1, 3)).unwrap();
        let mut calls = 0;
        let result = pyramid.save_levels(Path::new("."), "png", LevelNaming::Short, |_, _| {
            calls += 1;
            Err("disk full")
        });
        assert_eq!(result, Err("disk full"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_border_policy_propagates() {
        let image = gradient_image(16, 16).with_border(BorderPolicy::WrapAround);
        let pyramid = ScaleSpacePyramid::build(&image, &PyramidSpec::new(0.5, 1.6, 2, 3)).unwrap();
        assert!(pyramid
            .levels()
            .iter()
            .all(|level| level.image.border() == BorderPolicy::WrapAround));
        assert!(pyramid
            .dog_pyramid()
            .levels()
            .iter()
            .all(|level| level.image.border() == BorderPolicy::WrapAround));
    }
}
