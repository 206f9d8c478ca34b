//! Image similarity for photographed documents.
//!
//! Two complementary measures are exposed:
//!
//! * [`similarity::orb_similarity`] normalizes both images, extracts oriented
//!   FAST / rotated BRIEF features, cross-checks Hamming matches and counts the
//!   matches consistent with a single RANSAC homography.
//! * [`hu::get_hu_moments`] summarizes the dominant shape of one image as seven
//!   log-scaled Hu invariants.

use image::GrayImage;
use imsim_brief::BriefGenerator;
use imsim_core::{Descriptor, Keypoint, OrbConfig};
use imsim_fast::FastDetector;
use rayon::prelude::*;
use tracing::debug;

pub mod config;
pub mod error;
pub mod homography;
pub mod hu;
pub mod preprocess;
pub mod similarity;
pub mod visualize;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::SimilarityConfig;
pub use error::{SimilarityError, SimilarityResult};
pub use hu::{HuConfig, HuMoments, get_hu_moments, hu_distance, hu_moments};
pub use imsim_core::{self, DMatch};
pub use similarity::{OrbSimilarity, ScoreMode, SimilarityReport, orb_similarity};

/// Keypoints in full-resolution coordinates with their descriptors, index-aligned
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Multi-scale ORB extraction: FAST over a pyramid, rotated BRIEF per level
#[derive(Debug, Clone)]
pub struct OrbExtractor {
    cfg: OrbConfig,
}

impl OrbExtractor {
    pub fn new(cfg: OrbConfig) -> SimilarityResult<Self> {
        imsim_fast::validate_config(&cfg)?;
        Ok(Self { cfg })
    }

    /// Detect keypoints and generate descriptors in one step
    pub fn detect_and_describe(&self, img: &GrayImage) -> SimilarityResult<Features> {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let detector = FastDetector::new(self.cfg.clone(), w, h)?;
        let levels = detector.detect_pyramid(img.as_raw())?;
        let patch_size = self.cfg.patch_size;

        let per_level: Vec<(Vec<Keypoint>, Vec<Descriptor>)> = levels
            .par_iter()
            .filter(|d| !d.keypoints.is_empty())
            .map(|d| {
                let brief = BriefGenerator::new(d.level.width, d.level.height, patch_size);
                let descriptors = brief.generate_descriptors(&d.image, &d.keypoints);
                let scale = d.level.scale;
                let keypoints = d
                    .keypoints
                    .iter()
                    .map(|kp| Keypoint {
                        x: kp.x * scale,
                        y: kp.y * scale,
                        ..*kp
                    })
                    .collect();
                (keypoints, descriptors)
            })
            .collect();

        let mut features = Features::default();
        for (kps, descs) in per_level {
            features.keypoints.extend(kps);
            features.descriptors.extend(descs);
        }

        debug!(width = w, height = h, keypoints = features.len(), "extracted ORB features");
        Ok(features)
    }

    /// Get detector configuration
    pub fn config(&self) -> &OrbConfig {
        &self.cfg
    }
}
