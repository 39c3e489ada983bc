use crate::builder::DetectorBuilder;
use crate::error::{DetectError, DetectResult};
use crate::types::{CornerMethod, HarrisFormula, PyramidSpec};
use sift_core::BorderPolicy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Corner operator settings: `(window, local_max_window, threshold)` plus the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CornerSpec {
    pub method: CornerMethod,
    /// Operator window size
    pub window: usize,
    /// Size of the window a point must dominate
    pub local_max_window: usize,
    /// Absolute response threshold
    pub threshold: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub harris_formula: HarrisFormula,
}

impl Default for CornerSpec {
    fn default() -> Self {
        Self {
            method: CornerMethod::Harris,
            window: 5,
            local_max_window: 5,
            threshold: 0.01,
            harris_formula: HarrisFormula::MinEigenvalue,
        }
    }
}

/// Adaptive non-maximum suppression settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnmsSpec {
    /// Number of points to keep
    pub target: usize,
    pub min_radius: f64,
    pub max_radius: f64,
}

impl AnmsSpec {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            ..Self::default()
        }
    }
}

impl Default for AnmsSpec {
    fn default() -> Self {
        Self {
            target: 500,
            min_radius: 1.0,
            max_radius: 100.0,
        }
    }
}

/// DoG extrema search settings
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtremaSpec {
    /// Spatial neighbourhood radius
    pub radius: usize,
    /// Minimum absolute DoG value
    pub threshold: f64,
    /// Keep only extrema whose Harris response exceeds this
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub harris_threshold: Option<f64>,
    pub harris_window: usize,
}

impl Default for ExtremaSpec {
    fn default() -> Self {
        Self {
            radius: 1,
            threshold: 0.01,
            harris_threshold: None,
            harris_window: 5,
        }
    }
}

/// Complete detector configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorConfig {
    /// Metadata
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
    /// Border policy applied to input images
    pub border: BorderPolicy,
    /// Gaussian pre-blur before the corner operator
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub blur_sigma: Option<f64>,
    pub pyramid: PyramidSpec,
    pub corner: CornerSpec,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub anms: Option<AnmsSpec>,
    pub extrema: ExtremaSpec,
}

impl DetectorConfig {
    /// Default settings: reflect border, sigma 1.0 pre-blur, Harris `(5, 5, 0.01)`, no ANMS
    pub fn new() -> Self {
        Self {
            name: None,
            description: None,
            border: BorderPolicy::Reflect,
            blur_sigma: Some(1.0),
            pyramid: PyramidSpec::default(),
            corner: CornerSpec::default(),
            anms: None,
            extrema: ExtremaSpec::default(),
        }
    }

    /// Single-scale Harris corners thinned to 500 points by ANMS
    pub fn corner_preset() -> Self {
        Self {
            name: Some("Corners".to_string()),
            description: Some("Harris corners with adaptive non-maximum suppression".to_string()),
            anms: Some(AnmsSpec::default()),
            ..Self::new()
        }
    }

    /// DoG extrema over a pyramid with two overlap levels per octave
    pub fn scale_space_preset() -> Self {
        Self {
            name: Some("Scale space".to_string()),
            description: Some("Difference-of-Gaussians extrema across octaves".to_string()),
            blur_sigma: None,
            pyramid: PyramidSpec::default().with_overlap(2),
            ..Self::new()
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Convert to DetectorBuilder for further customization
    pub fn to_builder(self) -> DetectorBuilder {
        DetectorBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        let blur = self
            .blur_sigma
            .map_or_else(|| "off".to_string(), |s| format!("{s}"));
        let anms = self
            .anms
            .map_or_else(|| "off".to_string(), |a| format!("{} in r[{}, {})", a.target, a.min_radius, a.max_radius));
        format!(
            "DetectorConfig: border={}, blur={}, pyramid=({}, {}, {}x{}+{}), {}=({}, {}, {}), ANMS={}, extrema=(r={}, t={})",
            self.border.name(),
            blur,
            self.pyramid.sigma_a,
            self.pyramid.sigma0,
            self.pyramid.octave_count,
            self.pyramid.level_count,
            self.pyramid.overlap,
            self.corner.method.name(),
            self.corner.window,
            self.corner.local_max_window,
            self.corner.threshold,
            anms,
            self.extrema.radius,
            self.extrema.threshold
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> DetectResult<()> {
        self.pyramid.validate()?;
        if let Some(sigma) = self.blur_sigma {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(DetectError::Config(format!("blur sigma {sigma} must be > 0")));
            }
        }
        if self.corner.window == 0 {
            return Err(DetectError::InvalidWindow {
                name: "corner window",
                size: 0,
            });
        }
        if self.corner.local_max_window == 0 {
            return Err(DetectError::InvalidWindow {
                name: "local maximum window",
                size: 0,
            });
        }
        if !self.corner.threshold.is_finite() {
            return Err(DetectError::InvalidThreshold(self.corner.threshold));
        }
        if let HarrisFormula::DetTrace { k } = self.corner.harris_formula {
            if !k.is_finite() {
                return Err(DetectError::Config(format!("Harris k {k} must be finite")));
            }
        }
        if let Some(anms) = &self.anms {
            if !(anms.min_radius >= 0.0 && anms.max_radius.is_finite() && anms.max_radius >= anms.min_radius) {
                return Err(DetectError::Config(format!(
                    "ANMS radii [{}, {}) must be finite with 0 <= min <= max",
                    anms.min_radius, anms.max_radius
                )));
            }
        }
        if !self.extrema.threshold.is_finite() {
            return Err(DetectError::InvalidThreshold(self.extrema.threshold));
        }
        if self.extrema.harris_threshold.is_some() && self.extrema.harris_window == 0 {
            return Err(DetectError::InvalidWindow {
                name: "extrema Harris window",
                size: 0,
            });
        }
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> DetectResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> DetectResult<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> DetectResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> DetectResult<Self> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> DetectResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DetectError::Config(e.to_string()))
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> DetectResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DetectError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> DetectResult<String> {
        toml::to_string_pretty(self).map_err(|e| DetectError::Config(e.to_string()))
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> DetectResult<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| DetectError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = DetectorConfig::default();
        assert_eq!(config.border, BorderPolicy::Reflect);
        assert_eq!(config.blur_sigma, Some(1.0));
        assert_eq!(config.pyramid, PyramidSpec::new(0.5, 1.6, 4, 5));
        assert_eq!((config.corner.window, config.corner.local_max_window), (5, 5));
        assert_eq!(config.corner.threshold, 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        for config in [DetectorConfig::corner_preset(), DetectorConfig::scale_space_preset()] {
            assert!(config.validate().is_ok(), "{}", config.summary());
            assert!(config.name.is_some());
        }
        assert_eq!(DetectorConfig::corner_preset().anms, Some(AnmsSpec::new(500)));
        assert_eq!(DetectorConfig::scale_space_preset().pyramid.overlap, 2);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = DetectorConfig::new();
        config.corner.window = 0;
        assert!(matches!(config.validate(), Err(DetectError::InvalidWindow { .. })));

        let mut config = DetectorConfig::new();
        config.pyramid.level_count = 1;
        assert!(matches!(config.validate(), Err(DetectError::InvalidPyramid(_))));

        let mut config = DetectorConfig::new();
        config.blur_sigma = Some(-1.0);
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::new();
        config.anms = Some(AnmsSpec {
            target: 10,
            min_radius: 5.0,
            max_radius: 1.0,
        });
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::new();
        config.anms = Some(AnmsSpec {
            target: 10,
            min_radius: 1.0,
            max_radius: f64::INFINITY,
        });
        assert!(matches!(config.validate(), Err(DetectError::Config(_))));

        let mut config = DetectorConfig::new();
        config.corner.threshold = f64::NAN;
        assert!(matches!(config.validate(), Err(DetectError::InvalidThreshold(_))));
    }

    #[test]
    fn test_summary_mentions_settings() {
        let summary = DetectorConfig::corner_preset().summary();
        assert!(summary.contains("border=reflect"));
        assert!(summary.contains("harris=(5, 5, 0.01)"));
        assert!(summary.contains("ANMS=500"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_and_toml_round_trip() {
        let mut config = DetectorConfig::scale_space_preset();
        config.corner.harris_formula = HarrisFormula::DetTrace { k: 0.04 };
        config.extrema.harris_threshold = Some(0.02);

        let json = config.to_json().unwrap();
        assert_eq!(DetectorConfig::from_json(&json).unwrap(), config);

        let toml = config.to_toml().unwrap();
        assert_eq!(DetectorConfig::from_toml(&toml).unwrap(), config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_invalid_json_rejected() {
        let mut config = DetectorConfig::new();
        config.corner.local_max_window = 0;
        let json = serde_json::to_string(&config).unwrap();
        assert!(DetectorConfig::from_json(&json).is_err());
        assert!(matches!(DetectorConfig::from_json("{"), Err(DetectError::Config(_))));
    }
}
