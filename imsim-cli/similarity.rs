//! ORB-based similarity between a candidate image and a reference image.

use crate::config::SimilarityConfig;
use crate::error::{SimilarityError, SimilarityResult};
use crate::homography::{HomographyError, RansacConfig, fit_homography_ransac};
use crate::preprocess::{preprocess, to_gray};
use crate::{Features, OrbExtractor};
use image::{DynamicImage, GrayImage, ImageReader, RgbImage};
use imsim_brief::match_cross_check;
use imsim_core::DMatch;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// How the inlier count is turned into the reported score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// Raw number of geometrically consistent matches
    #[default]
    InlierCount,
    /// inliers / matches
    InlierRatio,
    /// inliers / min(candidate keypoints, reference keypoints)
    KeypointRatio,
}

impl ScoreMode {
    pub fn score(self, report: &SimilarityReport) -> f64 {
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        match self {
            ScoreMode::InlierCount => report.inliers as f64,
            ScoreMode::InlierRatio => ratio(report.inliers, report.matches),
            ScoreMode::KeypointRatio => ratio(
                report.inliers,
                report.candidate_keypoints.min(report.reference_keypoints),
            ),
        }
    }
}

/// Counts from one comparison. `inliers <= matches <= min(keypoints)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimilarityReport {
    pub candidate_keypoints: usize,
    pub reference_keypoints: usize,
    pub matches: usize,
    pub inliers: usize,
    pub score: f64,
}

/// Everything produced while comparing two images
#[derive(Debug, Clone)]
pub struct Comparison {
    pub report: SimilarityReport,
    /// Normalized binary frames the features were extracted from
    pub candidate: GrayImage,
    pub reference: GrayImage,
    pub candidate_features: Features,
    pub reference_features: Features,
    /// Cross-checked matches, candidate as query
    pub matches: Vec<DMatch>,
    /// Subset of `matches` consistent with `homography`
    pub inliers: Vec<DMatch>,
    /// Maps candidate coordinates onto reference coordinates
    pub homography: Option<Matrix3<f64>>,
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> SimilarityError {
    SimilarityError::Decode {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Decode `path` whatever its extension, refusing images above `max_pixels`
/// before the pixel data is decoded.
pub fn load_image(path: &Path, max_pixels: u64) -> SimilarityResult<DynamicImage> {
    let reader = ImageReader::open(path)
        .map_err(|e| decode_error(path, e))?
        .with_guessed_format()
        .map_err(|e| decode_error(path, e))?;
    let (w, h) = reader.into_dimensions().map_err(|e| decode_error(path, e))?;

    let pixels = w as u64 * h as u64;
    if pixels > max_pixels {
        return Err(SimilarityError::ImageTooLarge {
            path: path.to_path_buf(),
            pixels,
            limit: max_pixels,
        });
    }

    ImageReader::open(path)
        .map_err(|e| decode_error(path, e))?
        .with_guessed_format()
        .map_err(|e| decode_error(path, e))?
        .decode()
        .map_err(|e| decode_error(path, e))
}

pub fn load_color(path: &Path, max_pixels: u64) -> SimilarityResult<RgbImage> {
    Ok(load_image(path, max_pixels)?.to_rgb8())
}

pub fn load_gray(path: &Path, max_pixels: u64) -> SimilarityResult<GrayImage> {
    Ok(to_gray(&load_color(path, max_pixels)?))
}

/// Keep the matches that agree with one projective mapping candidate → reference.
pub fn geometric_verification(
    candidate: &Features,
    reference: &Features,
    matches: &[DMatch],
    config: &RansacConfig,
) -> (Vec<DMatch>, Option<Matrix3<f64>>) {
    let src: Vec<[f64; 2]> = matches
        .iter()
        .map(|m| {
            let kp = &candidate.keypoints[m.query_idx];
            [kp.x as f64, kp.y as f64]
        })
        .collect();
    let dst: Vec<[f64; 2]> = matches
        .iter()
        .map(|m| {
            let kp = &reference.keypoints[m.train_idx];
            [kp.x as f64, kp.y as f64]
        })
        .collect();

    match fit_homography_ransac(&src, &dst, config) {
        Ok(result) => {
            let inliers = matches
                .iter()
                .zip(&result.inlier_mask)
                .filter(|(_, inlier)| **inlier)
                .map(|(m, _)| *m)
                .collect();
            (inliers, Some(result.h))
        }
        Err(HomographyError::TooFewPoints { got, .. }) => {
            debug!(matches = got, "too few matches for a homography");
            (Vec::new(), None)
        }
        Err(e) => {
            warn!(matches = matches.len(), "homography estimation failed: {}", e);
            (Vec::new(), None)
        }
    }
}

/// Reusable comparison engine
#[derive(Debug, Clone)]
pub struct OrbSimilarity {
    config: SimilarityConfig,
    extractor: OrbExtractor,
}

impl OrbSimilarity {
    pub fn new(config: SimilarityConfig) -> SimilarityResult<Self> {
        config.validate()?;
        let extractor = OrbExtractor::new(config.orb.clone())?;
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    /// Decode both files, then compare. Neither image is processed unless both decode.
    pub fn compare_paths(&self, candidate: &Path, reference: &Path) -> SimilarityResult<Comparison> {
        let limit = self.config.max_pixels;
        let (candidate_img, reference_img) =
            rayon::join(|| load_color(candidate, limit), || load_color(reference, limit));
        let (candidate_img, reference_img) = (candidate_img?, reference_img?);
        self.compare_images(&candidate_img, &reference_img)
    }

    pub fn compare_images(&self, candidate: &RgbImage, reference: &RgbImage) -> SimilarityResult<Comparison> {
        let extract = |img: &RgbImage| -> SimilarityResult<(GrayImage, Features)> {
            let frame = preprocess(img, &self.config.preprocess)?;
            let features = self.extractor.detect_and_describe(&frame)?;
            Ok((frame, features))
        };
        let (c, r) = rayon::join(|| extract(candidate), || extract(reference));
        let (candidate, candidate_features) = c?;
        let (reference, reference_features) = r?;

        let mut report = SimilarityReport {
            candidate_keypoints: candidate_features.len(),
            reference_keypoints: reference_features.len(),
            ..SimilarityReport::default()
        };

        let (matches, inliers, homography) = if candidate_features.is_empty() || reference_features.is_empty() {
            debug!(
                candidate = report.candidate_keypoints,
                reference = report.reference_keypoints,
                "no descriptors to match"
            );
            (Vec::new(), Vec::new(), None)
        } else {
            let matches = match_cross_check(&candidate_features.descriptors, &reference_features.descriptors);
            let (inliers, homography) =
                geometric_verification(&candidate_features, &reference_features, &matches, &self.config.ransac);
            (matches, inliers, homography)
        };

        report.matches = matches.len();
        report.inliers = inliers.len();
        report.score = self.config.score.score(&report);

        info!(
            candidate_keypoints = report.candidate_keypoints,
            reference_keypoints = report.reference_keypoints,
            matches = report.matches,
            inliers = report.inliers,
            score = report.score,
            "comparison finished"
        );

        Ok(Comparison {
            report,
            candidate,
            reference,
            candidate_features,
            reference_features,
            matches,
            inliers,
            homography,
        })
    }
}

/// Number of RANSAC-consistent ORB matches between two image files, using
/// default settings. 0 when either image yields no usable features.
pub fn orb_similarity(candidate: impl AsRef<Path>, reference: impl AsRef<Path>) -> SimilarityResult<usize> {
    let engine = OrbSimilarity::new(SimilarityConfig::default())?;
    let comparison = engine.compare_paths(candidate.as_ref(), reference.as_ref())?;
    Ok(comparison.report.inliers)
}
