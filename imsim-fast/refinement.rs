use imsim_core::{Image, Keypoint};
use crate::types::ScoredKeypoint;
use std::cmp::Ordering;

/// Non-maximum suppression, orientation and ranking of detected corners
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Keep corners whose segment score beats every 8-connected neighbouring corner.
    ///
    /// Equal scores are resolved in favour of the earlier corner in row-major order.
    pub fn non_maximum_suppression(keypoints: &[ScoredKeypoint], width: usize, height: usize) -> Vec<ScoredKeypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }

        let mut score_map = vec![0f32; width * height];
        for sk in keypoints {
            score_map[sk.keypoint.y as usize * width + sk.keypoint.x as usize] = sk.response;
        }

        keypoints
            .iter()
            .filter(|sk| {
                let (x, y) = (sk.keypoint.x as usize, sk.keypoint.y as usize);
                let here = y * width + x;
                for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                        let idx = ny * width + nx;
                        if idx == here {
                            continue;
                        }
                        let other = score_map[idx];
                        if other > sk.response || (other == sk.response && other > 0.0 && idx < here) {
                            return false;
                        }
                    }
                }
                true
            })
            .copied()
            .collect()
    }

    /// Orientation by intensity centroid over a circular patch of radius `patch_size / 2`.
    ///
    /// Pixels falling outside the image are skipped.
    pub fn compute_orientation(img: &Image, width: usize, height: usize, x: f32, y: f32, patch_size: usize) -> f32 {
        let half = (patch_size / 2) as i32;
        let radius_sq = half * half;
        let (cx, cy) = (x.round() as i32, y.round() as i32);
        let mut m10 = 0i64;
        let mut m01 = 0i64;

        for dy in -half..=half {
            let yy = cy + dy;
            if yy < 0 || yy >= height as i32 {
                continue;
            }
            for dx in -half..=half {
                let xx = cx + dx;
                if dx * dx + dy * dy > radius_sq || xx < 0 || xx >= width as i32 {
                    continue;
                }
                let val = img[yy as usize * width + xx as usize] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Retain the `n` strongest keypoints by response, ties keep detection order
    pub fn retain_best(mut keypoints: Vec<Keypoint>, n: usize) -> Vec<Keypoint> {
        if keypoints.len() <= n {
            return keypoints;
        }
        keypoints.sort_by(|a, b| b.response.partial_cmp(&a.response).unwrap_or(Ordering::Equal));
        keypoints.truncate(n);
        keypoints
    }
}
