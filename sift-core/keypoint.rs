#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A detected interest point in full-resolution image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyPoint {
    /// Column
    pub x: f64,
    /// Row
    pub y: f64,
    /// Detector response at the point
    pub response: f64,
    /// Dominant orientation in radians, 0 until assigned
    pub angle: f64,
    /// Effective blur scale
    pub sigma: f64,
}

impl KeyPoint {
    pub fn new(x: f64, y: f64, response: f64) -> Self {
        Self {
            x,
            y,
            response,
            angle: 0.0,
            sigma: 1.0,
        }
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    /// Euclidean distance between point centers.
    pub fn distance(&self, other: &KeyPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl Default for KeyPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}
