use crate::config::DetectorConfig;
use crate::corner_detection::CornerDetector;
use crate::error::{DetectError, DetectResult};
use crate::extrema::ExtremaFinder;
use crate::pyramid::ScaleSpacePyramid;
use crate::refinement::KeypointRefinement;
use log::{debug, info};
use sift_core::{Grid, KeyPoint};

/// Result of a scale-space detection pass
#[derive(Debug, Clone)]
pub struct ScaleSpaceDetection {
    /// Gaussian pyramid the keypoints were found in
    pub pyramid: ScaleSpacePyramid,
    /// DoG extrema in base-image coordinates
    pub keypoints: Vec<KeyPoint>,
}

/// Single-scale corner and multi-scale DoG keypoint detector
#[derive(Debug, Clone)]
pub struct FeatureDetector {
    config: DetectorConfig,
}

impl FeatureDetector {
    /// Creates a new detector with validation
    pub fn new(config: DetectorConfig) -> DetectResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get detector configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn prepare(&self, image: &Grid) -> DetectResult<Grid> {
        if image.is_empty() {
            return Err(DetectError::ImageTooSmall {
                width: image.width(),
                height: image.height(),
                min_size: 1,
            });
        }
        Ok(image.clone().with_border(self.config.border))
    }

    /// Corner response map after the optional pre-blur
    pub fn corner_response(&self, image: &Grid) -> DetectResult<Grid> {
        let mut work = self.prepare(image)?;
        if let Some(sigma) = self.config.blur_sigma {
            work = work.gaussian(sigma);
        }
        let corner = &self.config.corner;
        CornerDetector::response(&work, corner.method, corner.window, corner.harris_formula)
    }

    /// Corner keypoints: response local maxima, thinned by ANMS when configured.
    pub fn detect_corners(&self, image: &Grid) -> DetectResult<Vec<KeyPoint>> {
        let response = self.corner_response(image)?;
        let corner = &self.config.corner;
        let points = KeypointRefinement::local_maxima(&response, corner.local_max_window, corner.threshold)?;
        let points = self.apply_anms(points);
        info!("{} detector found {} corners", corner.method.name(), points.len());
        Ok(points)
    }

    /// Gaussian pyramid of the image under the configured border policy
    pub fn build_pyramid(&self, image: &Grid) -> DetectResult<ScaleSpacePyramid> {
        ScaleSpacePyramid::build(&self.prepare(image)?, &self.config.pyramid)
    }

    /// DoG extrema across the pyramid, optionally Harris-filtered and thinned by ANMS.
    pub fn detect_scale_space(&self, image: &Grid) -> DetectResult<ScaleSpaceDetection> {
        let pyramid = self.build_pyramid(image)?;
        let dog = pyramid.dog_pyramid();
        let extrema = &self.config.extrema;
        let keypoints = match extrema.harris_threshold {
            Some(harris_threshold) => ExtremaFinder::find_with_harris(
                &pyramid,
                &dog,
                extrema.radius,
                extrema.threshold,
                harris_threshold,
                extrema.harris_window,
            )?,
            None => ExtremaFinder::find(&dog, extrema.radius, extrema.threshold),
        };
        let keypoints = self.apply_anms(keypoints);
        info!("Scale-space detector found {} keypoints", keypoints.len());
        Ok(ScaleSpaceDetection { pyramid, keypoints })
    }

    fn apply_anms(&self, points: Vec<KeyPoint>) -> Vec<KeyPoint> {
        match &self.config.anms {
            Some(anms) => {
                debug!("Applying ANMS to {} points", points.len());
                KeypointRefinement::anms(&points, anms.target, anms.min_radius, anms.max_radius)
            }
            None => points,
        }
    }
}
