use imsim_core::{Image, Keypoint, OrbConfig};
use crate::error::{FastError, FastResult};
use crate::types::{LevelDetections, ScaleLevel};
use crate::pyramid::ImagePyramid;
use crate::corner_detection::CornerDetector;
use crate::refinement::KeypointRefinement;
use rayon::prelude::*;
use tracing::debug;

/// Oriented FAST detector over a scale pyramid
#[derive(Debug, Clone)]
pub struct FastDetector {
    cfg: OrbConfig,
    w: usize,
    h: usize,
    scale_levels: Vec<ScaleLevel>,
}

/// Checks the ORB parameters that do not depend on the image size.
pub fn validate_config(cfg: &OrbConfig) -> FastResult<()> {
    // 0 would flag every pixel, >127 overflows the u8 bright/dark bounds
    if cfg.threshold == 0 || cfg.threshold > 127 {
        return Err(FastError::InvalidThreshold(cfg.threshold));
    }

    if cfg.patch_size % 2 == 0 || cfg.patch_size < 3 {
        return Err(FastError::InvalidPatchSize(cfg.patch_size));
    }

    // FAST circle radius
    if cfg.edge_threshold < 3 {
        return Err(FastError::InvalidEdgeThreshold(cfg.edge_threshold));
    }

    if !(cfg.scale_factor > 1.0) || !cfg.scale_factor.is_finite() {
        return Err(FastError::InvalidScaleFactor(cfg.scale_factor));
    }

    if cfg.n_levels == 0 || cfg.n_levels > 32 {
        return Err(FastError::InvalidLevelCount(cfg.n_levels));
    }

    Ok(())
}

impl FastDetector {
    /// Creates a new FAST detector with validation.
    ///
    /// Images too small for the edge border are accepted; they simply yield
    /// no keypoints.
    pub fn new(cfg: OrbConfig, width: usize, height: usize) -> FastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }

        validate_config(&cfg)?;

        let scale_levels = ImagePyramid::generate_scale_levels(width, height, &cfg);

        Ok(Self {
            cfg,
            w: width,
            h: height,
            scale_levels,
        })
    }

    /// Validates image data before processing
    fn validate_image(&self, img: &Image) -> FastResult<()> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }
        Ok(())
    }

    /// Detect keypoints on every level, in full-resolution coordinates
    pub fn detect_keypoints(&self, img: &Image) -> FastResult<Vec<Keypoint>> {
        let levels = self.detect_pyramid(img)?;
        Ok(levels
            .into_iter()
            .flat_map(|det| {
                let scale = det.level.scale;
                det.keypoints.into_iter().map(move |kp| Keypoint {
                    x: kp.x * scale,
                    y: kp.y * scale,
                    ..kp
                })
            })
            .collect())
    }

    /// Build the pyramid and detect on each level in parallel.
    ///
    /// Keypoints stay in level coordinates; see [`LevelDetections`].
    pub fn detect_pyramid(&self, img: &Image) -> FastResult<Vec<LevelDetections>> {
        self.validate_image(img)?;

        let pyramid = ImagePyramid::build_image_pyramid(img, self.w, self.h, &self.scale_levels);

        let detections: Vec<LevelDetections> = self
            .scale_levels
            .par_iter()
            .zip(pyramid.into_par_iter())
            .map(|(scale_level, image)| {
                let keypoints = self.detect_keypoints_at_scale(&image, scale_level);
                LevelDetections {
                    level: *scale_level,
                    image,
                    keypoints,
                }
            })
            .collect();

        debug!(
            levels = detections.len(),
            keypoints = detections.iter().map(|d| d.keypoints.len()).sum::<usize>(),
            "pyramid detection finished"
        );

        Ok(detections)
    }

    /// Detect, suppress, rank and orient keypoints on one pyramid level
    pub fn detect_keypoints_at_scale(&self, img: &Image, scale_level: &ScaleLevel) -> Vec<Keypoint> {
        let (w, h) = (scale_level.width, scale_level.height);
        if scale_level.n_features == 0 {
            return Vec::new();
        }

        let corners = CornerDetector::detect_corners(img, w, h, self.cfg.threshold, self.cfg.edge_threshold);
        let suppressed = KeypointRefinement::non_maximum_suppression(&corners, w, h);

        let ranked: Vec<Keypoint> = suppressed
            .into_iter()
            .map(|sk| {
                let (x, y) = (sk.keypoint.x as usize, sk.keypoint.y as usize);
                Keypoint {
                    response: CornerDetector::compute_harris_response(img, w, h, x, y),
                    octave: scale_level.level,
                    size: self.cfg.patch_size as f32 * scale_level.scale,
                    ..sk.keypoint
                }
            })
            .collect();

        let mut best = KeypointRefinement::retain_best(ranked, scale_level.n_features);
        for kp in best.iter_mut() {
            kp.angle = KeypointRefinement::compute_orientation(img, w, h, kp.x, kp.y, self.cfg.patch_size);
        }
        best
    }

    /// Get scale levels for this detector
    pub fn scale_levels(&self) -> &[ScaleLevel] {
        &self.scale_levels
    }

    /// Get detector configuration
    pub fn config(&self) -> &OrbConfig {
        &self.cfg
    }

    /// Get image dimensions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.w, self.h)
    }
}
