use crate::error::{DetectError, DetectResult};
use crate::types::{CornerMethod, HarrisFormula};
use log::trace;
use sift_core::{kernels, Grid};

/// Corner response operators (Moravec and Harris)
pub struct CornerDetector;

impl CornerDetector {
    /// The 8 unit shifts `(dy, dx)` probed by the Moravec operator.
    pub const SHIFTS: [(isize, isize); 8] = [
        (-1, -1), (-1, 0), (-1, 1),
        (0, -1),           (0, 1),
        (1, -1),  (1, 0),  (1, 1),
    ];

    /// Response map of the selected operator.
    pub fn response(grid: &Grid, method: CornerMethod, window: usize, formula: HarrisFormula) -> DetectResult<Grid> {
        match method {
            CornerMethod::Moravec => Self::moravec(grid, window),
            CornerMethod::Harris => Self::harris(grid, window, formula),
        }
    }

    /// Moravec response: the minimum, over the 8 unit shifts, of the SSD
    /// between the `window x window` patch and its shifted copy.
    pub fn moravec(grid: &Grid, window: usize) -> DetectResult<Grid> {
        Self::validate_window("moravec window", window)?;
        let half = (window / 2) as isize;
        let pad = window / 2 + 1;
        let padded = grid.copy_with_border(pad, pad);
        let mut out = Grid::new(grid.width(), grid.height()).with_border(grid.border());

        for row in 0..grid.height() {
            for col in 0..grid.width() {
                let (pr, pc) = ((row + pad) as isize, (col + pad) as isize);
                let mut best = f64::INFINITY;
                for &(dy, dx) in &Self::SHIFTS {
                    let mut ssd = 0.0;
                    for u in -half..=half {
                        for v in -half..=half {
                            let here = padded.at((pr + u) as usize, (pc + v) as usize);
                            let there = padded.at((pr + u + dy) as usize, (pc + v + dx) as usize);
                            ssd += (here - there) * (here - there);
                        }
                    }
                    best = best.min(ssd);
                }
                out.set(row, col, best);
            }
        }
        trace!("Moravec response computed ({}x{}, window {window})", grid.width(), grid.height());
        Ok(out)
    }

    /// Harris response from the Gaussian-weighted structure tensor.
    ///
    /// The weighting kernel is `window x window` with `sigma = window / 6`.
    pub fn harris(grid: &Grid, window: usize, formula: HarrisFormula) -> DetectResult<Grid> {
        Self::validate_window("harris window", window)?;
        let ix = grid.dx();
        let iy = grid.dy();
        let kernel = kernels::gaussian_kernel(window, window, window as f64 / 6.0);

        let a = (&ix * &ix).convolve(&kernel);
        let b = (&ix * &iy).convolve(&kernel);
        let c = (&iy * &iy).convolve(&kernel);
        trace!("Harris tensor computed ({}x{}, window {window})", grid.width(), grid.height());
        Ok(Self::harris_response(&a, &b, &c, formula))
    }

    /// Corner strength from the tensor entries `[[a, b], [b, c]]`.
    ///
    /// A negative discriminant (round-off on flat regions) is clamped to zero.
    pub fn harris_response(a: &Grid, b: &Grid, c: &Grid, formula: HarrisFormula) -> Grid {
        let trace = a + c;
        let det = &(a * c) - &(b * b);
        match formula {
            HarrisFormula::MinEigenvalue => trace.zip_with(&det, |t, d| {
                let discriminant = (t * t - 4.0 * d).max(0.0);
                (t - discriminant.sqrt()) / 2.0
            }),
            HarrisFormula::DetTrace { k } => det.zip_with(&trace, |d, t| d - k * t * t),
        }
    }

    fn validate_window(name: &'static str, size: usize) -> DetectResult<()> {
        if size == 0 {
            return Err(DetectError::InvalidWindow { name, size });
        }
        Ok(())
    }
}
