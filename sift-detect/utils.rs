/// Helpers shared by the detection modules
use sift_core::KeyPoint;
use std::cmp::Ordering;

/// Format a sigma with six significant digits, dropping trailing zeros.
///
/// `1.6` prints as `1.6`, `2.0158736798317967` as `2.01587`.
pub fn format_sigma(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let int_digits = value.abs().log10().floor() as i32 + 1;
    let decimals = (6 - int_digits).clamp(0, 15) as usize;
    let text = format!("{value:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Descending order by response, NaN last.
pub fn by_response_desc(a: &KeyPoint, b: &KeyPoint) -> Ordering {
    match (a.response.is_nan(), b.response.is_nan()) {
        (false, false) => b.response.total_cmp(&a.response),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

/// Squared Euclidean distance between two keypoint centers.
#[inline]
pub fn distance_sq(a: &KeyPoint, b: &KeyPoint) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}
