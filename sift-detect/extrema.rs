use crate::error::DetectResult;
use crate::pyramid::ScaleSpacePyramid;
use crate::types::{HarrisFormula, PyramidLevel};
use log::debug;
use sift_core::KeyPoint;

/// Space-and-scale extrema search over a difference-of-Gaussians pyramid
pub struct ExtremaFinder;

/// Extremum located in level coordinates.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    octave: usize,
    level: usize,
    row: usize,
    col: usize,
    value: f64,
    sigma: f64,
}

impl Candidate {
    fn to_keypoint(self) -> KeyPoint {
        let scale = 2f64.powi(self.octave as i32);
        KeyPoint::new(self.col as f64 * scale, self.row as f64 * scale, self.value).with_sigma(self.sigma)
    }
}

impl ExtremaFinder {
    /// Extrema of every interior level of every octave of `dog`.
    ///
    /// A sample is kept when it is strictly above the maximum, or strictly
    /// below the minimum, of its `(2r+1)^2 * 3 - 1` neighbours in the level
    /// below, its own level and the level above, and `|value| > threshold`.
    /// Coordinates are mapped back to the base image, sigma is the level's
    /// effective sigma.
    pub fn find(dog: &ScaleSpacePyramid, radius: usize, threshold: f64) -> Vec<KeyPoint> {
        let points: Vec<KeyPoint> = Self::candidates(dog, radius, threshold)
            .into_iter()
            .map(Candidate::to_keypoint)
            .collect();
        debug!("Found {} DoG extrema (radius {radius}, threshold {threshold})", points.len());
        points
    }

    /// Extrema of a single octave's stack of same-sized levels.
    pub fn find_in_stack(levels: &[PyramidLevel], radius: usize, threshold: f64) -> Vec<KeyPoint> {
        Self::stack_candidates(levels, radius, threshold)
            .into_iter()
            .map(Candidate::to_keypoint)
            .collect()
    }

    /// DoG extrema whose Harris response, measured on the Gaussian level the
    /// DoG level was taken from, exceeds `harris_threshold`.
    pub fn find_with_harris(
        pyramid: &ScaleSpacePyramid,
        dog: &ScaleSpacePyramid,
        radius: usize,
        threshold: f64,
        harris_threshold: f64,
        harris_window: usize,
    ) -> DetectResult<Vec<KeyPoint>> {
        let harris = pyramid.harris_pyramid(harris_window, HarrisFormula::MinEigenvalue)?;
        let candidates = Self::candidates(dog, radius, threshold);
        let total = candidates.len();
        let points: Vec<KeyPoint> = candidates
            .into_iter()
            .filter(|c| {
                harris
                    .level(c.octave, c.level)
                    .map_or(false, |level| level.image.at(c.row, c.col) > harris_threshold)
            })
            .map(Candidate::to_keypoint)
            .collect();
        debug!(
            "Harris filter kept {} of {total} DoG extrema (threshold {harris_threshold})",
            points.len()
        );
        Ok(points)
    }

    fn candidates(dog: &ScaleSpacePyramid, radius: usize, threshold: f64) -> Vec<Candidate> {
        (0..dog.octave_count())
            .flat_map(|octave| Self::stack_candidates(dog.octave(octave), radius, threshold))
            .collect()
    }

    fn stack_candidates(levels: &[PyramidLevel], radius: usize, threshold: f64) -> Vec<Candidate> {
        let mut found = Vec::new();
        if levels.len() < 3 {
            return found;
        }
        let r = radius as isize;
        for triple in levels.windows(3) {
            let (below, current, above) = (&triple[0].image, &triple[1].image, &triple[2].image);
            for row in 0..current.height() {
                for col in 0..current.width() {
                    let value = current.at(row, col);
                    if !(value.abs() > threshold) {
                        continue;
                    }
                    let (ri, ci) = (row as isize, col as isize);
                    let mut can_be_max = true;
                    let mut can_be_min = true;
                    'search: for (index, grid) in [below, current, above].into_iter().enumerate() {
                        for u in -r..=r {
                            for v in -r..=r {
                                if index == 1 && u == 0 && v == 0 {
                                    continue;
                                }
                                let neighbour = grid.get(ri + u, ci + v);
                                can_be_max &= value > neighbour;
                                can_be_min &= value < neighbour;
                                if !can_be_max && !can_be_min {
                                    break 'search;
                                }
                            }
                        }
                    }
                    if can_be_max || can_be_min {
                        found.push(Candidate {
                            octave: triple[1].octave,
                            level: triple[1].level,
                            row,
                            col,
                            value,
                            sigma: triple[1].sigma_effective,
                        });
                    }
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PyramidSpec;
    use sift_core::Grid;

    fn level(octave: usize, level: usize, image: Grid) -> PyramidLevel {
        PyramidLevel {
            octave,
            level,
            sigma_local: 1.0 + level as f64,
            sigma_applied: 0.0,
            sigma_effective: (1.0 + level as f64) * 2f64.powi(octave as i32),
            overlap: false,
            image,
        }
    }

    #[test]
    fn test_single_voxel_maximum() {
        let mut peak = Grid::new(3, 3);
        peak.set(1, 1, 10.0);
        let stack = [level(0, 0, Grid::new(3, 3)), level(0, 1, peak), level(0, 2, Grid::new(3, 3))];
        let points = ExtremaFinder::find_in_stack(&stack, 1, 5.0);
        assert_eq!(points.len(), 1);
        assert_eq!((points[0].x, points[0].y, points[0].response), (1.0, 1.0, 10.0));
        assert_eq!(points[0].sigma, 2.0);
    }

    #[test]
    fn test_single_voxel_minimum() {
        let mut pit = Grid::new(5, 5);
        pit.set(2, 3, -4.0);
        let stack = [level(1, 0, Grid::new(5, 5)), level(1, 1, pit), level(1, 2, Grid::new(5, 5))];
        let points = ExtremaFinder::find_in_stack(&stack, 1, 0.5);
        assert_eq!(points.len(), 1);
        // Octave 1 doubles the coordinates
        assert_eq!((points[0].x, points[0].y), (6.0, 4.0));
        assert_eq!(points[0].response, -4.0);
    }

    #[test]
    fn test_threshold_and_tie_rejection() {
        let mut peak = Grid::new(5, 5);
        peak.set(2, 2, 3.0);
        let mut above = Grid::new(5, 5);
        above.set(2, 2, 3.0);
        let stack = [level(0, 0, Grid::new(5, 5)), level(0, 1, peak.clone()), level(0, 2, above)];
        // Tie with the level above: not strictly greater
        assert!(ExtremaFinder::find_in_stack(&stack, 1, 0.0).is_empty());

        let stack = [level(0, 0, Grid::new(5, 5)), level(0, 1, peak), level(0, 2, Grid::new(5, 5))];
        assert!(ExtremaFinder::find_in_stack(&stack, 1, 3.0).is_empty());
        assert_eq!(ExtremaFinder::find_in_stack(&stack, 1, 2.9).len(), 1);
    }

    #[test]
    fn test_needs_three_levels() {
        let stack = [level(0, 0, Grid::new(3, 3)), level(0, 1, Grid::filled(3, 3, 1.0))];
        assert!(ExtremaFinder::find_in_stack(&stack, 1, 0.0).is_empty());
    }

    #[test]
    fn test_pyramid_extrema_are_consistent() {
        let mut image = Grid::new(48, 48);
        for row in 0..48 {
            for col in 0..48 {
                image.set(row, col, ((row * 13 + col * 7) % 11) as f64 / 11.0);
            }
        }
        let pyramid = ScaleSpacePyramid::build(&image, &PyramidSpec::new(0.5, 1.6, 2, 4)).unwrap();
        let dog = pyramid.dog_pyramid();
        let points = ExtremaFinder::find(&dog, 1, 0.001);

        let interior_sigmas: Vec<f64> = (0..2)
            .flat_map(|o| dog.octave(o)[1..dog.levels_per_octave() - 1].to_vec())
            .map(|level| level.sigma_effective)
            .collect();
        for p in &points {
            assert!(p.response.abs() > 0.001);
            assert!(interior_sigmas.contains(&p.sigma));
            assert!(p.x >= 0.0 && p.x < 48.0 && p.y >= 0.0 && p.y < 48.0);
            if p.sigma > 3.0 {
                assert_eq!(p.x % 2.0, 0.0);
                assert_eq!(p.y % 2.0, 0.0);
            }
        }

        let filtered = ExtremaFinder::find_with_harris(&pyramid, &dog, 1, 0.001, f64::INFINITY, 5).unwrap();
        assert!(filtered.is_empty());
        let unfiltered =
            ExtremaFinder::find_with_harris(&pyramid, &dog, 1, 0.001, f64::NEG_INFINITY, 5).unwrap();
        assert_eq!(unfiltered.len(), points.len());
    }
}
