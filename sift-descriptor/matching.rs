use crate::descriptor::{Descriptor, DistanceMetric};
use crate::error::{DescriptorError, DescriptorResult};
use log::{debug, warn};

/// Default nearest-neighbour distance ratio threshold.
pub const DEFAULT_NNDR_THRESHOLD: f64 = 0.66;

/// Nearest-neighbour distance ratio matching of `a` against `b`.
///
/// Returns `(index_in_a, index_in_b)` for every descriptor of `a` whose best
/// distance divided by its second-best distance is below `threshold`. Fails
/// with [`DescriptorError::InsufficientData`] when `b` has fewer than two
/// descriptors.
pub fn try_find_matches(
    a: &[Descriptor],
    b: &[Descriptor],
    threshold: f64,
    metric: DistanceMetric,
) -> DescriptorResult<Vec<(usize, usize)>> {
    if b.len() < 2 {
        return Err(DescriptorError::InsufficientData(format!(
            "ratio matching needs at least 2 candidates, got {}",
            b.len()
        )));
    }

    let mut matches = Vec::new();
    for (i, query) in a.iter().enumerate() {
        let mut best = (usize::MAX, f64::INFINITY);
        let mut second = f64::INFINITY;
        for (j, candidate) in b.iter().enumerate() {
            let d = query.distance(candidate, metric)?;
            if d < best.1 {
                second = best.1;
                best = (j, d);
            } else if d < second {
                second = d;
            }
        }
        if best.1 / second < threshold {
            matches.push((i, best.0));
        }
    }

    debug!(
        "Matched {} of {} descriptors against {} ({} ratio < {threshold})",
        matches.len(),
        a.len(),
        b.len(),
        metric.name()
    );
    Ok(matches)
}

/// [`try_find_matches`] that yields no matches instead of an error.
pub fn find_matches(a: &[Descriptor], b: &[Descriptor], threshold: f64, metric: DistanceMetric) -> Vec<(usize, usize)> {
    match try_find_matches(a, b, threshold, metric) {
        Ok(matches) => matches,
        Err(DescriptorError::InsufficientData(reason)) => {
            debug!("No matches: {reason}");
            Vec::new()
        }
        Err(e) => {
            warn!("Matching failed: {e}");
            Vec::new()
        }
    }
}
