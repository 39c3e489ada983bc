//! Convolution kernels shared by the grid operators.
//!
//! Kernels are plain [`Grid`]s built on demand; nothing here is cached.

use crate::error::{CoreError, CoreResult};
use crate::grid::Grid;
use std::f64::consts::PI;

/// Sigmas at or below this are treated as "no blur".
const MIN_SIGMA: f64 = 1e-12;

/// Default Gaussian kernel size: `round(sigma) * 6`, bumped to the next odd integer.
pub fn gaussian_size(sigma: f64) -> usize {
    let size = (sigma.round().max(0.0) as usize) * 6;
    if size % 2 == 0 {
        size + 1
    } else {
        size
    }
}

/// Sampled 2D Gaussian density normalized to sum to one.
pub fn gaussian_kernel(width: usize, height: usize, sigma: f64) -> Grid {
    let mut kernel = Grid::new(width, height);
    if width == 0 || height == 0 {
        return kernel;
    }
    if sigma <= MIN_SIGMA {
        return delta_kernel(width, height);
    }

    let half_h = (height / 2) as isize;
    let half_w = (width / 2) as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut sum = 0.0;
    for row in 0..height {
        for col in 0..width {
            let i = row as isize - half_h;
            let j = col as isize - half_w;
            let val = (-((i * i + j * j) as f64) / two_sigma_sq).exp() / (PI * two_sigma_sq);
            kernel.set(row, col, val);
            sum += val;
        }
    }
    kernel.map_in_place(|v| v / sum);
    kernel
}

/// [`gaussian_kernel`] that rejects empty sizes and negative or non-finite sigmas.
pub fn try_gaussian_kernel(width: usize, height: usize, sigma: f64) -> CoreResult<Grid> {
    if width == 0 || height == 0 {
        return Err(CoreError::invalid("kernel size", format!("{width}x{height} kernel is empty")));
    }
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(CoreError::invalid("sigma", format!("{sigma} is not a finite, non-negative value")));
    }
    Ok(gaussian_kernel(width, height, sigma))
}

/// Square Gaussian kernel with the default size for `sigma`.
pub fn gaussian_kernel_for(sigma: f64) -> Grid {
    let size = gaussian_size(sigma);
    gaussian_kernel(size, size, sigma)
}

/// 1D Gaussian laid out as a single row.
pub fn gaussian_kernel_row(width: usize, sigma: f64) -> Grid {
    gaussian_kernel(width, 1, sigma)
}

/// 1D Gaussian row with the default size for `sigma`.
pub fn gaussian_kernel_row_for(sigma: f64) -> Grid {
    gaussian_kernel_row(gaussian_size(sigma), sigma)
}

/// Centered difference `[1, 0, -1]`.
pub fn difference_kernel() -> Grid {
    Grid::from_vec_unchecked(3, 1, vec![1.0, 0.0, -1.0])
}

/// Sobel smoothing row `[1, 2, 1]`.
pub fn sobel_smoothing_kernel() -> Grid {
    Grid::from_vec_unchecked(3, 1, vec![1.0, 2.0, 1.0])
}

/// The 1x1 kernel `[1]`.
pub fn identity_kernel() -> Grid {
    Grid::from_vec_unchecked(1, 1, vec![1.0])
}

fn delta_kernel(width: usize, height: usize) -> Grid {
    let mut kernel = Grid::new(width, height);
    kernel.set(height / 2, width / 2, 1.0);
    kernel
}
