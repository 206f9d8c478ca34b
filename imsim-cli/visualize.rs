//! Side-by-side rendering of matched keypoints.

use crate::error::{SimilarityError, SimilarityResult};
use crate::similarity::Comparison;
use image::{DynamicImage, GenericImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use imsim_core::{DMatch, Keypoint};
use std::path::Path;
use tracing::info;

const MATCH_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const KEYPOINT_RADIUS: i32 = 4;

/// Candidate on the left, reference on the right, the first `limit` matches
/// (in the order given) joined by lines.
pub fn render_matches(
    candidate: &GrayImage,
    candidate_kps: &[Keypoint],
    reference: &GrayImage,
    reference_kps: &[Keypoint],
    matches: &[DMatch],
    limit: usize,
) -> SimilarityResult<RgbImage> {
    let left = DynamicImage::ImageLuma8(candidate.clone()).to_rgb8();
    let right = DynamicImage::ImageLuma8(reference.clone()).to_rgb8();

    let mut output = RgbImage::new(left.width() + right.width(), left.height().max(right.height()));
    output
        .copy_from(&left, 0, 0)
        .map_err(|e| SimilarityError::Visualization(e.to_string()))?;
    output
        .copy_from(&right, left.width(), 0)
        .map_err(|e| SimilarityError::Visualization(e.to_string()))?;

    let offset = left.width() as f32;
    for m in matches.iter().take(limit) {
        let (Some(a), Some(b)) = (candidate_kps.get(m.query_idx), reference_kps.get(m.train_idx)) else {
            return Err(SimilarityError::Visualization(format!(
                "match ({}, {}) refers to a missing keypoint",
                m.query_idx, m.train_idx
            )));
        };
        draw_hollow_circle_mut(&mut output, (a.x as i32, a.y as i32), KEYPOINT_RADIUS, MATCH_COLOR);
        draw_hollow_circle_mut(&mut output, ((b.x + offset) as i32, b.y as i32), KEYPOINT_RADIUS, MATCH_COLOR);
        draw_line_segment_mut(&mut output, (a.x, a.y), (b.x + offset, b.y), MATCH_COLOR);
    }

    Ok(output)
}

/// Render a comparison and write it as an image; inliers are drawn when there
/// are any, raw matches otherwise.
pub fn save_matches(comparison: &Comparison, path: &Path, limit: usize) -> SimilarityResult<()> {
    let matches = if comparison.inliers.is_empty() {
        &comparison.matches
    } else {
        &comparison.inliers
    };
    let image = render_matches(
        &comparison.candidate,
        &comparison.candidate_features.keypoints,
        &comparison.reference,
        &comparison.reference_features.keypoints,
        matches,
        limit,
    )?;
    image
        .save(path)
        .map_err(|e| SimilarityError::Visualization(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), drawn = matches.len().min(limit), "wrote match visualization");
    Ok(())
}
