use crate::error::{DetectError, DetectResult};
use crate::utils::{by_response_desc, distance_sq};
use log::{debug, trace};
use sift_core::{Grid, KeyPoint};

/// Point selection on response maps and adaptive non-maximum suppression
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Pixels strictly greater than every other pixel of their
    /// `window x window` neighbourhood and above `threshold`.
    ///
    /// Neighbours outside the grid are read through its border policy.
    pub fn local_maxima(grid: &Grid, window: usize, threshold: f64) -> DetectResult<Vec<KeyPoint>> {
        Self::local_maxima_rect(grid, window, window, threshold)
    }

    /// Rectangular variant of [`KeypointRefinement::local_maxima`].
    pub fn local_maxima_rect(
        grid: &Grid,
        window_rows: usize,
        window_cols: usize,
        threshold: f64,
    ) -> DetectResult<Vec<KeyPoint>> {
        if window_rows == 0 || window_cols == 0 {
            return Err(DetectError::InvalidWindow {
                name: "local maximum window",
                size: window_rows.min(window_cols),
            });
        }
        let half_r = (window_rows / 2) as isize;
        let half_c = (window_cols / 2) as isize;
        let mut points = Vec::new();

        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let value = grid.at(row, col);
                if !(value > threshold) {
                    continue;
                }
                let (r, c) = (row as isize, col as isize);
                let is_max = (-half_r..=half_r).all(|u| {
                    (-half_c..=half_c).all(|v| (u == 0 && v == 0) || value > grid.get(r + u, c + v))
                });
                if is_max {
                    points.push(KeyPoint::new(col as f64, row as f64, value));
                }
            }
        }
        trace!("{} local maxima above {threshold}", points.len());
        Ok(points)
    }

    /// Every pixel whose value exceeds `threshold`, in row-major order.
    pub fn threshold_points(grid: &Grid, threshold: f64) -> Vec<KeyPoint> {
        let mut points = Vec::new();
        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let value = grid.at(row, col);
                if value > threshold {
                    points.push(KeyPoint::new(col as f64, row as f64, value));
                }
            }
        }
        points
    }

    /// Adaptive non-maximum suppression by radius sweep.
    ///
    /// Starting at `min_radius` and growing by one pixel per pass, a point is
    /// dropped when a strictly stronger surviving point lies closer than the
    /// current radius. Within a pass points are visited weakest first and the
    /// sweep stops as soon as at most `target` points remain or the radius
    /// reaches `max_radius`, or once the radius exceeds every pairwise
    /// distance without removing a point. Survivors keep their input order.
    pub fn anms(points: &[KeyPoint], target: usize, min_radius: f64, max_radius: f64) -> Vec<KeyPoint> {
        let n = points.len();
        let mut alive = vec![true; n];
        let mut remaining = n;

        let mut weakest_first: Vec<usize> = (0..n).collect();
        weakest_first.sort_by(|&a, &b| by_response_desc(&points[b], &points[a]));

        let widest_sq = points
            .iter()
            .flat_map(|a| points.iter().map(move |b| distance_sq(a, b)))
            .fold(0.0, f64::max);

        let mut radius = min_radius;
        while remaining > target && radius < max_radius {
            let radius_sq = radius * radius;
            let before = remaining;
            for &i in &weakest_first {
                if remaining <= target {
                    break;
                }
                if !alive[i] {
                    continue;
                }
                let candidate = &points[i];
                let suppressed = points.iter().enumerate().any(|(j, other)| {
                    alive[j] && other.response > candidate.response && distance_sq(candidate, other) < radius_sq
                });
                if suppressed {
                    alive[i] = false;
                    remaining -= 1;
                }
            }
            trace!("ANMS radius {radius}: {remaining} points remain");
            // Past the widest pair a larger radius cannot suppress anything new.
            if remaining == before && radius_sq > widest_sq {
                break;
            }
            radius += 1.0;
        }

        debug!("ANMS kept {remaining} of {n} points (target {target})");
        points
            .iter()
            .zip(alive)
            .filter_map(|(point, keep)| keep.then_some(*point))
            .collect()
    }

    /// ANMS after Brown et al.: each point's suppression radius is its
    /// distance to the nearest stronger point, and the `count` points with
    /// the largest radii are kept, largest first.
    pub fn brown_anms(points: &[KeyPoint], count: usize) -> Vec<KeyPoint> {
        let mut sorted = points.to_vec();
        sorted.sort_by(by_response_desc);

        let mut radii: Vec<(f64, usize)> = Vec::with_capacity(sorted.len());
        for (i, point) in sorted.iter().enumerate() {
            let radius_sq = sorted[..i]
                .iter()
                .map(|stronger| distance_sq(point, stronger))
                .fold(f64::INFINITY, f64::min);
            radii.push((radius_sq, i));
        }
        radii.sort_by(|a, b| b.0.total_cmp(&a.0));

        radii.into_iter().take(count).map(|(_, i)| sorted[i]).collect()
    }
}
