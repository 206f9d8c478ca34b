//! Projective verification of descriptor matches.
//!
//! A DLT estimate with Hartley normalization, wrapped in a seeded RANSAC loop
//! that adapts its iteration count to the observed inlier ratio.

use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SAMPLE_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    TooFewPoints { needed: usize, got: usize },
    NumericalFailure(String),
    /// Every sample drawn was degenerate or failed to solve
    NoModel { iterations: usize },
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
            Self::NoModel { iterations } => {
                write!(f, "no homography found after {} iterations", iterations)
            }
        }
    }
}

impl std::error::Error for HomographyError {}

/// H * [x, y, 1]^T → [u, v]
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

/// Euclidean distance between `project(h, src)` and `dst`. NaN projections
/// compare as infinitely far.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let p = project(h, src[0], src[1]);
    let dx = p[0] - dst[0];
    let dy = p[1] - dst[1];
    let err = (dx * dx + dy * dy).sqrt();
    if err.is_nan() { f64::INFINITY } else { err }
}

/// Translate the centroid to the origin and scale the mean distance to sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| [s * (p[0] - cx), s * (p[1] - cy)]).collect();

    (t, normalized)
}

/// Homography H with dst ≈ project(H, src), from at least four correspondences.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    let n = src.len();
    if n < SAMPLE_SIZE || dst.len() < SAMPLE_SIZE {
        return Err(HomographyError::TooFewPoints {
            needed: SAMPLE_SIZE,
            got: n.min(dst.len()),
        });
    }
    if src.len() != dst.len() {
        return Err(HomographyError::NumericalFailure(
            "src and dst must have the same length".into(),
        ));
    }

    let (t_src, src_n) = normalize_points(src);
    let (t_dst, dst_n) = normalize_points(dst);

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = (src_n[i][0], src_n[i][1]);
        let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // h is the eigenvector of AᵀA with the smallest eigenvalue
    let ata = a.transpose() * &a;
    let eig = nalgebra::SymmetricEigen::new(ata);

    let mut min_idx = 0;
    let mut min_val = eig.eigenvalues[0].abs();
    for i in 1..9 {
        let v = eig.eigenvalues[i].abs();
        if v < min_val {
            min_val = v;
            min_idx = i;
        }
    }
    let h_norm = Matrix3::from_fn(|r, c| eig.eigenvectors[(r * 3 + c, min_idx)]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    if h.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::NumericalFailure("non-finite solution".into()));
    }

    let scale = h[(2, 2)];
    if scale.abs() < 1e-15 { Ok(h) } else { Ok(h / scale) }
}

/// True when any three of the points are (nearly) collinear.
fn has_collinear_triple(pts: &[[f64; 2]]) -> bool {
    let n = pts.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let (dx1, dy1) = (pts[j][0] - pts[i][0], pts[j][1] - pts[i][1]);
                let (dx2, dy2) = (pts[k][0] - pts[i][0], pts[k][1] - pts[i][1]);
                let tol = f32::EPSILON as f64 * (dx1.abs() + dy1.abs() + dx2.abs() + dy2.abs());
                if (dx2 * dy1 - dy2 * dx1).abs() <= tol {
                    return true;
                }
            }
        }
    }
    false
}

/// Iterations needed to draw one all-inlier sample with probability `confidence`.
fn required_iterations(inlier_ratio: f64, confidence: f64, cap: usize) -> usize {
    let p_good = inlier_ratio.powi(SAMPLE_SIZE as i32);
    if p_good >= 1.0 {
        return 1;
    }
    if p_good <= 0.0 {
        return cap;
    }
    let k = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if k.is_finite() && k >= 0.0 {
        (k.ceil() as usize).clamp(1, cap)
    } else {
        cap
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Maximum reprojection error (pixels) for a correspondence to count as inlier
    pub reprojection_threshold: f64,
    pub max_iters: usize,
    /// Stop once an all-inlier sample has been drawn with this probability
    pub confidence: f64,
    pub seed: u64,
    /// Wall-clock limit on the sampling loop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_budget_ms: Option<u64>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reprojection_threshold: 5.0,
            max_iters: 2000,
            confidence: 0.995,
            seed: 0,
            time_budget_ms: Some(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RansacResult {
    pub h: Matrix3<f64>,
    /// true for inliers, indexed like the input correspondences
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
    pub iterations: usize,
}

fn inlier_mask(h: &Matrix3<f64>, src: &[[f64; 2]], dst: &[[f64; 2]], threshold: f64) -> (Vec<bool>, usize) {
    let mask: Vec<bool> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(h, s, d) <= threshold)
        .collect();
    let count = mask.iter().filter(|&&m| m).count();
    (mask, count)
}

/// Robust homography from correspondences that may contain outliers.
///
/// Deterministic for a given `config.seed`. The model refit on all inliers is
/// kept only when it does not lose inliers.
pub fn fit_homography_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &RansacConfig,
) -> Result<RansacResult, HomographyError> {
    let n = src.len().min(dst.len());
    if n < SAMPLE_SIZE {
        return Err(HomographyError::TooFewPoints { needed: SAMPLE_SIZE, got: n });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let deadline = config
        .time_budget_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let mut best: Option<(Matrix3<f64>, Vec<bool>, usize)> = None;
    let mut iter_limit = config.max_iters;
    let mut iter = 0;

    while iter < iter_limit {
        if iter > 0 && deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(iterations = iter, "RANSAC time budget exhausted");
            break;
        }
        iter += 1;

        let indices = rand::seq::index::sample(&mut rng, n, SAMPLE_SIZE);
        let s4: Vec<[f64; 2]> = indices.iter().map(|i| src[i]).collect();
        let d4: Vec<[f64; 2]> = indices.iter().map(|i| dst[i]).collect();
        if has_collinear_triple(&s4) || has_collinear_triple(&d4) {
            continue;
        }

        let h = match estimate_homography_dlt(&s4, &d4) {
            Ok(h) => h,
            Err(_) => continue,
        };

        let (mask, count) = inlier_mask(&h, src, dst, config.reprojection_threshold);
        if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
            iter_limit = required_iterations(count as f64 / n as f64, config.confidence, config.max_iters);
            best = Some((h, mask, count));
        }
    }

    let (best_h, best_mask, best_count) = best.ok_or(HomographyError::NoModel { iterations: iter })?;

    let inlier_src: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| src[i]).collect();
    let inlier_dst: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| dst[i]).collect();

    let (h, inlier_mask, n_inliers) = match estimate_homography_dlt(&inlier_src, &inlier_dst) {
        Ok(h_refit) => {
            let (mask, count) = inlier_mask(&h_refit, src, dst, config.reprojection_threshold);
            if count >= best_count {
                (h_refit, mask, count)
            } else {
                (best_h, best_mask, best_count)
            }
        }
        Err(_) => (best_h, best_mask, best_count),
    };

    debug!(n, n_inliers, iterations = iter, "RANSAC finished");

    Ok(RansacResult {
        h,
        inlier_mask,
        n_inliers,
        iterations: iter,
    })
}
