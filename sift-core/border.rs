#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a [`Grid`](crate::Grid) answers reads outside its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BorderPolicy {
    /// Constant zero outside the grid
    Zero,
    /// Nearest valid index
    ClampToEdge,
    /// Mirror across the edge, the edge sample itself is repeated
    #[default]
    Reflect,
    /// Periodic continuation
    WrapAround,
}

impl BorderPolicy {
    pub const ALL: [BorderPolicy; 4] = [
        BorderPolicy::Zero,
        BorderPolicy::ClampToEdge,
        BorderPolicy::Reflect,
        BorderPolicy::WrapAround,
    ];

    /// Map a selector `0..=3` (zero, clamp, reflect, wrap) to a policy.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Resolve a possibly out-of-range index along an axis of length `len`.
    ///
    /// Returns `None` when the read must produce the constant zero.
    ///
    /// Reflect is the symmetric reflection with period `2 * len`: `-1` maps to
    /// `0`, `len` maps to `len - 1`, and indices further out keep bouncing
    /// between the two edges. Wrap uses Euclidean modulo.
    #[inline]
    pub fn resolve(self, index: isize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let n = len as isize;
        if (0..n).contains(&index) {
            return Some(index as usize);
        }
        match self {
            BorderPolicy::Zero => None,
            BorderPolicy::ClampToEdge => Some(index.clamp(0, n - 1) as usize),
            BorderPolicy::Reflect => {
                let m = index.rem_euclid(2 * n);
                Some(if m < n { m } else { 2 * n - 1 - m } as usize)
            }
            BorderPolicy::WrapAround => Some(index.rem_euclid(n) as usize),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BorderPolicy::Zero => "zero",
            BorderPolicy::ClampToEdge => "clamp",
            BorderPolicy::Reflect => "reflect",
            BorderPolicy::WrapAround => "wrap",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_range_is_identity() {
        for policy in BorderPolicy::ALL {
            for i in 0..5 {
                assert_eq!(policy.resolve(i, 5), Some(i as usize));
            }
        }
    }

    #[test]
    fn test_reflect_first_span() {
        // -i-1 below zero, 2*len-i-1 above len-1
        assert_eq!(BorderPolicy::Reflect.resolve(-1, 4), Some(0));
        assert_eq!(BorderPolicy::Reflect.resolve(-4, 4), Some(3));
        assert_eq!(BorderPolicy::Reflect.resolve(4, 4), Some(3));
        assert_eq!(BorderPolicy::Reflect.resolve(7, 4), Some(0));
    }

    #[test]
    fn test_reflect_beyond_one_span() {
        // Period 2*len: index 8 behaves like 0, index 11 like 3 then mirrored
        assert_eq!(BorderPolicy::Reflect.resolve(8, 4), Some(0));
        assert_eq!(BorderPolicy::Reflect.resolve(10, 4), Some(2));
        assert_eq!(BorderPolicy::Reflect.resolve(12, 4), Some(3));
        assert_eq!(BorderPolicy::Reflect.resolve(-5, 4), Some(3));
        assert_eq!(BorderPolicy::Reflect.resolve(-9, 4), Some(0));
    }

    #[test]
    fn test_wrap_and_clamp() {
        assert_eq!(BorderPolicy::WrapAround.resolve(-1, 4), Some(3));
        assert_eq!(BorderPolicy::WrapAround.resolve(9, 4), Some(1));
        assert_eq!(BorderPolicy::WrapAround.resolve(-9, 4), Some(3));
        assert_eq!(BorderPolicy::ClampToEdge.resolve(-7, 4), Some(0));
        assert_eq!(BorderPolicy::ClampToEdge.resolve(70, 4), Some(3));
        assert_eq!(BorderPolicy::Zero.resolve(-1, 4), None);
    }

    #[test]
    fn test_from_index() {
        assert_eq!(BorderPolicy::from_index(0), Some(BorderPolicy::Zero));
        assert_eq!(BorderPolicy::from_index(2), Some(BorderPolicy::Reflect));
        assert_eq!(BorderPolicy::from_index(4), None);
    }
}
