use crate::border::BorderPolicy;
use crate::error::{CoreError, CoreResult};
use crate::kernels;
use log::warn;
use std::f64::consts::{PI, TAU};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Row-major 2D buffer of `f64` samples with a border policy for out-of-range reads.
///
/// Every transform returns a new grid that inherits this grid's border policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    data: Vec<f64>,
    border: BorderPolicy,
}

impl Grid {
    /// Zero-filled grid with the default border policy.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
            border: BorderPolicy::default(),
        }
    }

    /// Wrap a row-major buffer, validating its length.
    pub fn from_raw(width: usize, height: usize, data: Vec<f64>) -> CoreResult<Self> {
        let expected_len = width * height;
        if data.len() != expected_len {
            return Err(CoreError::DimensionMismatch {
                expected_len,
                actual_len: data.len(),
            });
        }
        Ok(Self::from_vec_unchecked(width, height, data))
    }

    /// Build a grid from 8-bit luminance samples, scaled into `[0, 1]`.
    pub fn from_luma8(width: usize, height: usize, samples: &[u8]) -> CoreResult<Self> {
        let data = samples.iter().map(|&s| f64::from(s) / 255.0).collect();
        Self::from_raw(width, height, data)
    }

    /// Build a grid from literal rows. All rows must have the same length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> CoreResult<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(width * height);
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(CoreError::DimensionMismatch {
                    expected_len: width,
                    actual_len: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self::from_vec_unchecked(width, height, data))
    }

    pub(crate) fn from_vec_unchecked(width: usize, height: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
            border: BorderPolicy::default(),
        }
    }

    /// Same samples, different border policy.
    pub fn with_border(mut self, border: BorderPolicy) -> Self {
        self.border = border;
        self
    }

    pub fn border(&self) -> BorderPolicy {
        self.border
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<f64> {
        self.data
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    /// In-range read. Panics when `(row, col)` is outside the grid.
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.width + col]
    }

    /// Border-aware read: out-of-range indices are resolved by the grid's policy.
    #[inline]
    pub fn get(&self, row: isize, col: isize) -> f64 {
        if row >= 0 && col >= 0 && (row as usize) < self.height && (col as usize) < self.width {
            return self.data[row as usize * self.width + col as usize];
        }
        match (
            self.border.resolve(row, self.height),
            self.border.resolve(col, self.width),
        ) {
            (Some(r), Some(c)) => self.data[r * self.width + c],
            _ => 0.0,
        }
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.width + col] = value;
    }

    pub fn fill(&mut self, value: f64) -> &mut Self {
        self.data.fill(value);
        self
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Grid {
        self.derived(self.data.iter().map(|&v| f(v)).collect())
    }

    pub fn map_in_place(&mut self, f: impl Fn(f64) -> f64) {
        self.data.iter_mut().for_each(|v| *v = f(*v));
    }

    /// Element-wise combination of two grids of the same shape.
    ///
    /// Panics when the shapes differ; see [`Grid::checked_zip_with`].
    pub fn zip_with(&self, other: &Grid, f: impl Fn(f64, f64) -> f64) -> Grid {
        assert!(
            self.same_shape(other),
            "grid shapes differ: {}x{} vs {}x{}",
            self.width,
            self.height,
            other.width,
            other.height
        );
        self.derived(
            self.data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        )
    }

    pub fn checked_zip_with(&self, other: &Grid, f: impl Fn(f64, f64) -> f64) -> CoreResult<Grid> {
        if !self.same_shape(other) {
            return Err(CoreError::ShapeMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height,
            });
        }
        Ok(self.zip_with(other, f))
    }

    pub fn add_scalar(&self, value: f64) -> Grid {
        self.map(|v| v + value)
    }

    pub fn sub_scalar(&self, value: f64) -> Grid {
        self.map(|v| v - value)
    }

    pub fn mul_scalar(&self, value: f64) -> Grid {
        self.map(|v| v * value)
    }

    pub fn div_scalar(&self, value: f64) -> Grid {
        self.map(|v| v / value)
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn abs(&self) -> Grid {
        self.map(f64::abs)
    }

    /// Smallest and largest sample, `None` for an empty grid.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let first = *self.data.first()?;
        Some(
            self.data
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Affine rescale of the observed range onto `[new_min, new_max]`.
    ///
    /// Fails with [`CoreError::DegenerateInput`] when every sample is equal.
    pub fn try_normalize_range(&self, new_min: f64, new_max: f64) -> CoreResult<Grid> {
        let (lo, hi) = self
            .min_max()
            .ok_or_else(|| CoreError::InsufficientData("cannot normalize an empty grid".into()))?;
        if !(hi > lo) {
            return Err(CoreError::DegenerateInput(format!(
                "flat grid (all samples equal to {lo}) has no range to normalize"
            )));
        }
        let scale = (new_max - new_min) / (hi - lo);
        Ok(self.map(|v| (v - lo) * scale + new_min))
    }

    /// Like [`Grid::try_normalize_range`], but a flat grid becomes a constant `new_min` grid.
    pub fn normalize_range(&self, new_min: f64, new_max: f64) -> Grid {
        match self.try_normalize_range(new_min, new_max) {
            Ok(grid) => grid,
            Err(err) => {
                warn!("{err}; filling with {new_min}");
                self.map(|_| new_min)
            }
        }
    }

    /// Rescale into `[0, 255]` and round to bytes for display.
    pub fn to_luma8(&self) -> Vec<u8> {
        self.normalize_range(0.0, 255.0)
            .data
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect()
    }

    pub fn transpose(&self) -> Grid {
        let mut data = Vec::with_capacity(self.data.len());
        for col in 0..self.width {
            for row in 0..self.height {
                data.push(self.at(row, col));
            }
        }
        Grid {
            width: self.height,
            height: self.width,
            data,
            border: self.border,
        }
    }

    pub fn all_close(&self, other: &Grid, eps: f64) -> bool {
        self.same_shape(other)
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Stride-`2^power` subsampling. No anti-alias filtering: blur first.
    pub fn downsample(&self, power: u32) -> Grid {
        let stride = 1usize << power;
        let width = (self.width / stride).max(1);
        let height = (self.height / stride).max(1);
        if self.is_empty() {
            return self.clone();
        }
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(self.at(row * stride, col * stride));
            }
        }
        Grid {
            width,
            height,
            data,
            border: self.border,
        }
    }

    /// Copy padded by `x_pad` columns and `y_pad` rows on each side, filled per border policy.
    pub fn copy_with_border(&self, x_pad: usize, y_pad: usize) -> Grid {
        let width = self.width + 2 * x_pad;
        let height = self.height + 2 * y_pad;
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            let src_row = row as isize - y_pad as isize;
            for col in 0..width {
                data.push(self.get(src_row, col as isize - x_pad as isize));
            }
        }
        Grid {
            width,
            height,
            data,
            border: self.border,
        }
    }

    /// Convolve every row with a 1D kernel (its samples in storage order).
    pub fn convolve_row(&self, kernel: &Grid) -> Grid {
        let taps = kernel.data();
        let radius = taps.len() / 2;
        let padded = self.copy_with_border(radius, 0);
        let mut out = Vec::with_capacity(self.data.len());
        for row in 0..self.height {
            let src = padded.row(row);
            for col in 0..self.width {
                // reversed kernel: tap t reads offset (radius - t)
                let center = col + radius;
                let sum = taps
                    .iter()
                    .enumerate()
                    .map(|(t, &k)| src[center + radius - t] * k)
                    .sum();
                out.push(sum);
            }
        }
        self.derived(out)
    }

    /// Convolve every column with a 1D kernel (given as a row or a column).
    pub fn convolve_col(&self, kernel: &Grid) -> Grid {
        let taps = kernel.data();
        let radius = taps.len() / 2;
        let padded = self.copy_with_border(0, radius);
        let mut out = Vec::with_capacity(self.data.len());
        for row in 0..self.height {
            let center = row + radius;
            for col in 0..self.width {
                let sum = taps
                    .iter()
                    .enumerate()
                    .map(|(t, &k)| padded.at(center + radius - t, col) * k)
                    .sum();
                out.push(sum);
            }
        }
        self.derived(out)
    }

    /// Full 2D convolution with a rectangular kernel, both axes reversed.
    ///
    /// For a separable kernel this agrees with `convolve_row` followed by `convolve_col`.
    pub fn convolve(&self, kernel: &Grid) -> Grid {
        let ry = kernel.height / 2;
        let rx = kernel.width / 2;
        let padded = self.copy_with_border(rx, ry);
        let mut out = Vec::with_capacity(self.data.len());
        for row in 0..self.height {
            for col in 0..self.width {
                let mut sum = 0.0;
                for a in 0..kernel.height {
                    let src = padded.row(row + 2 * ry - a);
                    let krow = kernel.row(a);
                    for (b, &k) in krow.iter().enumerate() {
                        sum += src[col + 2 * rx - b] * k;
                    }
                }
                out.push(sum);
            }
        }
        self.derived(out)
    }

    /// Separable Gaussian blur with the default kernel size for `sigma`.
    pub fn gaussian(&self, sigma: f64) -> Grid {
        let kernel = kernels::gaussian_kernel_row_for(sigma);
        self.convolve_row(&kernel).convolve_col(&kernel)
    }

    /// Horizontal Sobel derivative.
    pub fn dx(&self) -> Grid {
        self.convolve_row(&kernels::difference_kernel())
            .convolve_col(&kernels::sobel_smoothing_kernel())
    }

    /// Vertical Sobel derivative.
    pub fn dy(&self) -> Grid {
        self.convolve_row(&kernels::sobel_smoothing_kernel())
            .convolve_col(&kernels::difference_kernel())
    }

    pub fn sobel_magnitude(&self) -> Grid {
        self.dx().zip_with(&self.dy(), f64::hypot)
    }

    /// Gradient angle in `[0, 2π)`.
    pub fn gradient_direction(&self) -> Grid {
        self.dx().zip_with(&self.dy(), |gx, gy| {
            let angle = (-gy).atan2(-gx) + PI;
            if angle >= TAU {
                angle - TAU
            } else {
                angle
            }
        })
    }

    fn derived(&self, data: Vec<f64>) -> Grid {
        Grid {
            width: self.width,
            height: self.height,
            data,
            border: self.border,
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.height {
            let line = self
                .row(row)
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

macro_rules! impl_grid_ops {
    ($($trait:ident::$method:ident => $op:tt),* $(,)?) => {
        $(
            impl $trait<&Grid> for &Grid {
                type Output = Grid;
                fn $method(self, rhs: &Grid) -> Grid {
                    self.zip_with(rhs, |a, b| a $op b)
                }
            }

            impl $trait<Grid> for Grid {
                type Output = Grid;
                fn $method(self, rhs: Grid) -> Grid {
                    self.zip_with(&rhs, |a, b| a $op b)
                }
            }

            impl $trait<f64> for &Grid {
                type Output = Grid;
                fn $method(self, rhs: f64) -> Grid {
                    self.map(|a| a $op rhs)
                }
            }

            impl $trait<f64> for Grid {
                type Output = Grid;
                fn $method(self, rhs: f64) -> Grid {
                    self.map(|a| a $op rhs)
                }
            }
        )*
    };
}

impl_grid_ops!(Add::add => +, Sub::sub => -, Mul::mul => *, Div::div => /);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn three_by_three() -> Grid {
        Grid::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]).unwrap()
    }

    fn step_edge(width: usize, height: usize) -> Grid {
        let mut grid = Grid::new(width, height);
        for row in 0..height {
            for col in width / 2..width {
                grid.set(row, col, 1.0);
            }
        }
        grid
    }

    #[test]
    fn test_border_literals() {
        let g = three_by_three();

        let zero = g.clone().with_border(BorderPolicy::Zero);
        assert_eq!(zero.get(-1, 0), 0.0);
        assert_eq!(zero.get(3, 0), 0.0);

        let clamp = g.clone().with_border(BorderPolicy::ClampToEdge);
        assert_eq!(clamp.get(-1, 0), 1.0);
        assert_eq!(clamp.get(3, 0), 7.0);
        assert_eq!(clamp.get(-5, 9), 3.0);

        let reflect = g.clone().with_border(BorderPolicy::Reflect);
        for j in 0..3 {
            assert_eq!(reflect.get(-1, j), reflect.get(0, j));
            assert_eq!(reflect.get(3, j), reflect.get(2, j));
        }
        assert_eq!(reflect.get(-1, 0), 1.0);
        assert_eq!(reflect.get(3, 0), 7.0);

        let wrap = g.with_border(BorderPolicy::WrapAround);
        assert_eq!(wrap.get(-1, 0), 7.0);
        assert_eq!(wrap.get(3, 0), 1.0);
        assert_eq!(wrap.get(0, -1), 3.0);
    }

    #[test]
    fn test_border_far_out_of_range() {
        let g = three_by_three();
        let reflect = g.clone().with_border(BorderPolicy::Reflect);
        // Period 6: row 6 == row 0, row 8 == row 2, row 9 mirrors to row 2
        assert_eq!(reflect.get(6, 0), 1.0);
        assert_eq!(reflect.get(8, 0), 7.0);
        assert_eq!(reflect.get(9, 0), 7.0);
        assert_eq!(reflect.get(-7, 0), 1.0);

        let wrap = g.with_border(BorderPolicy::WrapAround);
        assert_eq!(wrap.get(7, 0), 4.0);
        assert_eq!(wrap.get(-4, 0), 7.0);
    }

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        let result = Grid::from_raw(3, 3, vec![0.0; 8]);
        assert!(matches!(
            result,
            Err(CoreError::DimensionMismatch { expected_len: 9, actual_len: 8 })
        ));
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Grid::from_rows(&rows).is_err());
    }

    #[test]
    fn test_from_luma8_scales_to_unit() {
        let g = Grid::from_luma8(2, 1, &[0, 255]).unwrap();
        assert_eq!(g.data(), &[0.0, 1.0]);
    }

    #[test]
    fn test_identity_kernel_is_exact() {
        let g = three_by_three();
        let id = kernels::identity_kernel();
        assert_eq!(g.convolve(&id), g);
        assert_eq!(g.convolve_row(&id), g);
        assert_eq!(g.convolve_col(&id), g);
    }

    #[test]
    fn test_convolution_reverses_kernel() {
        // Impulse response of a true convolution reproduces the kernel unflipped
        let mut impulse = Grid::new(5, 1).with_border(BorderPolicy::Zero);
        impulse.set(0, 2, 1.0);
        let kernel = Grid::from_rows(&[[1.0, 2.0, 3.0]]).unwrap();
        let out = impulse.convolve_row(&kernel);
        assert_eq!(out.data(), &[0.0, 1.0, 2.0, 3.0, 0.0]);
        let out2d = impulse.convolve(&kernel);
        assert_eq!(out2d.data(), out.data());
    }

    #[test]
    fn test_separable_matches_full_kernel() {
        let mut g = Grid::new(9, 7);
        for (i, v) in g.data_mut().iter_mut().enumerate() {
            *v = ((i * 37) % 11) as f64;
        }
        for border in BorderPolicy::ALL {
            let g = g.clone().with_border(border);
            let row = kernels::gaussian_kernel_row(5, 1.2);
            let full = kernels::gaussian_kernel(5, 5, 1.2);
            let separable = g.convolve_row(&row).convolve_col(&row);
            assert!(separable.all_close(&g.convolve(&full), 1e-12), "{border:?}");

            let sobel_x = Grid::from_rows(&[[1.0, 0.0, -1.0], [2.0, 0.0, -2.0], [1.0, 0.0, -1.0]])
                .unwrap();
            assert!(g.dx().all_close(&g.convolve(&sobel_x), 1e-12), "{border:?}");
            assert!(g.dy().all_close(&g.convolve(&sobel_x.transpose()), 1e-12), "{border:?}");
        }
    }

    #[test]
    fn test_dx_of_step_edge() {
        let g = step_edge(8, 6);
        let dx = g.dx();
        for row in 0..6 {
            for col in 0..8 {
                let v = dx.at(row, col);
                if col == 3 || col == 4 {
                    assert!(v > 0.0, "expected positive response at boundary col {col}");
                } else {
                    assert!(v.abs() < 1e-12, "expected zero at col {col}, got {v}");
                }
            }
        }
        assert!(g.dy().data().iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_gradient_direction_range() {
        let g = step_edge(8, 6);
        let dirs = g.gradient_direction();
        assert!(dirs.data().iter().all(|&a| (0.0..TAU).contains(&a)));
        // Brightness increases to the right: angle of +x is 0
        assert!(dirs.at(2, 3).abs() < 1e-12);
        let mag = g.sobel_magnitude();
        assert_eq!(mag.at(2, 3), 4.0);
    }

    #[test]
    fn test_arithmetic_ops() {
        let a = three_by_three();
        let b = a.mul_scalar(2.0);
        assert_eq!((&b - &a), a);
        assert_eq!((&a + 1.0).at(0, 0), 2.0);
        assert_eq!((&a * &a).at(2, 2), 81.0);
        assert_eq!((&b / &a).sum(), 18.0);
        assert_eq!(a.sub_scalar(5.0).abs().sum(), 20.0);
        assert!(a.checked_zip_with(&Grid::new(2, 2), |x, y| x + y).is_err());
    }

    #[test]
    fn test_normalize_range() {
        let a = three_by_three();
        let n = a.normalize_range(0.0, 1.0);
        assert_eq!(n.min_max(), Some((0.0, 1.0)));
        assert!((n.at(1, 1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_flat_grid_is_flagged() {
        let flat = Grid::filled(4, 4, 0.3);
        assert!(matches!(
            flat.try_normalize_range(0.0, 1.0),
            Err(CoreError::DegenerateInput(_))
        ));
        let filled = flat.normalize_range(0.0, 255.0);
        assert!(filled.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_downsample() {
        let mut g = Grid::new(5, 4);
        for (i, v) in g.data_mut().iter_mut().enumerate() {
            *v = i as f64;
        }
        let half = g.downsample(1);
        assert_eq!(half.dimensions(), (2, 2));
        assert_eq!(half.data(), &[0.0, 2.0, 10.0, 12.0]);
        let tiny = g.downsample(3);
        assert_eq!(tiny.dimensions(), (1, 1));
    }

    #[test]
    fn test_transpose_and_border_inheritance() {
        let g = Grid::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])
            .unwrap()
            .with_border(BorderPolicy::WrapAround);
        let t = g.transpose();
        assert_eq!(t.dimensions(), (2, 3));
        assert_eq!(t.at(2, 1), 6.0);
        assert_eq!(t.border(), BorderPolicy::WrapAround);
        assert_eq!(g.gaussian(1.0).border(), BorderPolicy::WrapAround);
    }

    #[test]
    fn test_display() {
        let g = Grid::from_rows(&[[1.0, 2.0], [3.0, 4.5]]).unwrap();
        assert_eq!(g.to_string(), "1 2\n3 4.5\n");
    }

    proptest! {
        #[test]
        fn prop_identity_convolution(
            width in 1usize..8,
            height in 1usize..8,
            seed in any::<u64>(),
            border in 0usize..4,
        ) {
            let mut g = Grid::new(width, height)
                .with_border(BorderPolicy::from_index(border).unwrap());
            for (i, v) in g.data_mut().iter_mut().enumerate() {
                *v = ((seed.wrapping_mul(i as u64 + 1) >> 7) % 1000) as f64 / 7.0;
            }
            prop_assert_eq!(g.convolve(&kernels::identity_kernel()), g);
        }

        #[test]
        fn prop_gaussian_preserves_constant(
            value in -10.0f64..10.0,
            sigma in 0.5f64..3.0,
        ) {
            let g = Grid::filled(6, 5, value);
            let blurred = g.gaussian(sigma);
            prop_assert!(blurred.all_close(&g, 1e-9));
        }
    }
}
