//! Log-scaled Hu moment invariants of an image's dominant contour.

use crate::error::{SimilarityError, SimilarityResult};
use crate::similarity::load_gray;
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Seven log-scaled invariants, h1 first
pub type HuMoments = [f64; 7];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuConfig {
    /// Pixels at or below this value become foreground
    pub threshold: u8,
    /// Added to |h| before the logarithm
    pub epsilon: f64,
    /// Reject decoded images above this many pixels
    pub max_pixels: u64,
}

impl Default for HuConfig {
    fn default() -> Self {
        Self {
            threshold: 128,
            epsilon: 1e-10,
            max_pixels: crate::config::DEFAULT_MAX_PIXELS,
        }
    }
}

/// Spatial moments up to third order of a closed polygon
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub m30: f64,
    pub m21: f64,
    pub m12: f64,
    pub m03: f64,
}

impl RawMoments {
    /// Moments of the region enclosed by `points` via Green's theorem.
    /// Orientation is normalized so the area is non-negative.
    pub fn from_polygon(points: &[Point<i32>]) -> Self {
        let n = points.len();
        if n == 0 {
            return Self::default();
        }

        let (mut a00, mut a10, mut a01, mut a20, mut a11, mut a02) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let (mut a30, mut a21, mut a12, mut a03) = (0.0, 0.0, 0.0, 0.0);

        let last = points[n - 1];
        let (mut xi_1, mut yi_1) = (last.x as f64, last.y as f64);
        let (mut xi_12, mut yi_12) = (xi_1 * xi_1, yi_1 * yi_1);

        for p in points {
            let (xi, yi) = (p.x as f64, p.y as f64);
            let (xi2, yi2) = (xi * xi, yi * yi);
            let dxy = xi_1 * yi - xi * yi_1;
            let xii_1 = xi_1 + xi;
            let yii_1 = yi_1 + yi;

            a00 += dxy;
            a10 += dxy * xii_1;
            a01 += dxy * yii_1;
            a20 += dxy * (xi_1 * xii_1 + xi2);
            a11 += dxy * (xi_1 * (yii_1 + yi_1) + xi * (yii_1 + yi));
            a02 += dxy * (yi_1 * yii_1 + yi2);
            a30 += dxy * xii_1 * (xi_12 + xi2);
            a03 += dxy * yii_1 * (yi_12 + yi2);
            a21 += dxy * (xi_12 * (3.0 * yi_1 + yi) + 2.0 * xi * xi_1 * yii_1 + xi2 * (yi_1 + 3.0 * yi));
            a12 += dxy * (yi_12 * (3.0 * xi_1 + xi) + 2.0 * yi * yi_1 * xii_1 + yi2 * (xi_1 + 3.0 * xi));

            xi_1 = xi;
            yi_1 = yi;
            xi_12 = xi2;
            yi_12 = yi2;
        }

        let sign = if a00 < 0.0 { -1.0 } else { 1.0 };
        Self {
            m00: sign * a00 / 2.0,
            m10: sign * a10 / 6.0,
            m01: sign * a01 / 6.0,
            m20: sign * a20 / 12.0,
            m11: sign * a11 / 24.0,
            m02: sign * a02 / 12.0,
            m30: sign * a30 / 20.0,
            m21: sign * a21 / 60.0,
            m12: sign * a12 / 60.0,
            m03: sign * a03 / 20.0,
        }
    }

    /// Raw Hu invariants (before log scaling). All zero for a region of zero area.
    pub fn hu_invariants(&self) -> [f64; 7] {
        if self.m00.abs() < f64::EPSILON {
            return [0.0; 7];
        }
        let cx = self.m10 / self.m00;
        let cy = self.m01 / self.m00;

        let mu20 = self.m20 - cx * self.m10;
        let mu11 = self.m11 - cx * self.m01;
        let mu02 = self.m02 - cy * self.m01;
        let mu30 = self.m30 - 3.0 * cx * self.m20 + 2.0 * cx * cx * self.m10;
        let mu21 = self.m21 - 2.0 * cx * self.m11 - cy * self.m20 + 2.0 * cx * cx * self.m01;
        let mu12 = self.m12 - 2.0 * cy * self.m11 - cx * self.m02 + 2.0 * cy * cy * self.m10;
        let mu03 = self.m03 - 3.0 * cy * self.m02 + 2.0 * cy * cy * self.m01;

        let s2 = self.m00 * self.m00;
        let s3 = s2 * self.m00.sqrt();
        let (n20, n11, n02) = (mu20 / s2, mu11 / s2, mu02 / s2);
        let (n30, n21, n12, n03) = (mu30 / s3, mu21 / s3, mu12 / s3, mu03 / s3);

        let t0 = n30 + n12;
        let t1 = n21 + n03;
        let q0 = n20 - n02;
        let q1 = n30 - 3.0 * n12;
        let q2 = 3.0 * n21 - n03;

        [
            n20 + n02,
            q0 * q0 + 4.0 * n11 * n11,
            q1 * q1 + q2 * q2,
            t0 * t0 + t1 * t1,
            q1 * t0 * (t0 * t0 - 3.0 * t1 * t1) + q2 * t1 * (3.0 * t0 * t0 - t1 * t1),
            q0 * (t0 * t0 - t1 * t1) + 4.0 * n11 * t0 * t1,
            q2 * t0 * (t0 * t0 - 3.0 * t1 * t1) - q1 * t1 * (3.0 * t0 * t0 - t1 * t1),
        ]
    }
}

/// Absolute area enclosed by a contour polygon
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    RawMoments::from_polygon(points).m00
}

/// `-sign(h) * log10(|h| + eps)` per component; zero stays zero
pub fn log_scale(hu: &[f64; 7], epsilon: f64) -> HuMoments {
    hu.map(|h| {
        let sign = if h > 0.0 {
            1.0
        } else if h < 0.0 {
            -1.0
        } else {
            0.0
        };
        -sign * (h.abs() + epsilon).log10()
    })
}

/// Foreground (255) where the pixel is at or below `threshold`, background elsewhere
pub fn binarize_inverted(gray: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > threshold {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// Outermost contours only
pub fn external_contours(binary: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .collect()
}

/// Largest external contour by enclosed area; the first one wins ties
pub fn largest_contour(contours: &[Contour<i32>]) -> Option<&Contour<i32>> {
    let mut best: Option<(&Contour<i32>, f64)> = None;
    for c in contours {
        let area = contour_area(&c.points);
        if best.is_none_or(|(_, a)| area > a) {
            best = Some((c, area));
        }
    }
    best.map(|(c, _)| c)
}

/// Hu moments of an already decoded grayscale image
pub fn hu_moments_from_gray(gray: &GrayImage, config: &HuConfig) -> SimilarityResult<HuMoments> {
    let binary = binarize_inverted(gray, config.threshold);
    let contours = external_contours(&binary);
    let contour = largest_contour(&contours).ok_or(SimilarityError::NoContour { path: None })?;

    let moments = RawMoments::from_polygon(&contour.points);
    debug!(
        contours = contours.len(),
        points = contour.points.len(),
        area = moments.m00,
        "selected dominant contour"
    );
    Ok(log_scale(&moments.hu_invariants(), config.epsilon))
}

/// Load `path` as grayscale and describe its dominant shape.
pub fn hu_moments(path: impl AsRef<Path>, config: &HuConfig) -> SimilarityResult<HuMoments> {
    let path = path.as_ref();
    let gray = load_gray(path, config.max_pixels)?;
    hu_moments_from_gray(&gray, config).map_err(|e| match e {
        SimilarityError::NoContour { path: None } => SimilarityError::NoContour {
            path: Some(path.to_path_buf()),
        },
        other => other,
    })
}

/// [`hu_moments`] with default settings
pub fn get_hu_moments(path: impl AsRef<Path>) -> SimilarityResult<HuMoments> {
    hu_moments(path, &HuConfig::default())
}

/// L1 distance between two Hu vectors
pub fn hu_distance(a: &HuMoments, b: &HuMoments) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{shape_image, temp_path};
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage, imageops};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
    use imageproc::rect::Rect;

    #[test]
    fn test_square_polygon_moments() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        let m = RawMoments::from_polygon(&square);
        assert_relative_eq!(m.m00, 100.0, epsilon = 1e-9);
        assert_relative_eq!(m.m10 / m.m00, 5.0, epsilon = 1e-9);
        assert_relative_eq!(m.m01 / m.m00, 5.0, epsilon = 1e-9);

        // Reversed orientation gives the same moments
        let mut reversed = square;
        reversed.reverse();
        assert_eq!(RawMoments::from_polygon(&reversed), m);

        let hu = m.hu_invariants();
        assert_relative_eq!(hu[0], 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_polygon_is_all_zero() {
        let single = [Point::new(4, 4)];
        assert_eq!(RawMoments::from_polygon(&single).hu_invariants(), [0.0; 7]);
        assert_eq!(RawMoments::from_polygon(&[]).hu_invariants(), [0.0; 7]);
    }

    #[test]
    fn test_log_scale_signs() {
        let scaled = log_scale(&[1e-3, -1e-3, 0.0, 1.0, 0.0, 0.0, 0.0], 1e-10);
        assert_relative_eq!(scaled[0], 3.0, epsilon = 1e-6);
        assert_relative_eq!(scaled[1], -3.0, epsilon = 1e-6);
        assert_eq!(scaled[2], 0.0);
        assert_relative_eq!(scaled[3], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_filled_square_image() {
        let mut img = GrayImage::from_pixel(64, 64, Luma([255]));
        draw_filled_rect_mut(&mut img, Rect::at(16, 20).of_size(24, 24), Luma([0]));

        let hu = hu_moments_from_gray(&img, &HuConfig::default()).unwrap();
        assert_relative_eq!(hu[0], -(1.0f64 / 6.0 + 1e-10).log10(), epsilon = 1e-6);
        assert!(hu.iter().all(|h| h.is_finite()));
    }

    #[test]
    fn test_largest_contour_is_selected() {
        let mut img = GrayImage::from_pixel(120, 80, Luma([255]));
        draw_filled_rect_mut(&mut img, Rect::at(5, 5).of_size(8, 8), Luma([0]));
        draw_filled_rect_mut(&mut img, Rect::at(40, 20).of_size(50, 30), Luma([0]));

        let binary = binarize_inverted(&img, 128);
        let contours = external_contours(&binary);
        assert_eq!(contours.len(), 2);
        let largest = largest_contour(&contours).unwrap();
        assert_relative_eq!(contour_area(&largest.points), 49.0 * 29.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_invariance() {
        let img = shape_image(160, 140);
        let config = HuConfig::default();
        let base = hu_moments_from_gray(&img, &config).unwrap();

        for rotated in [imageops::rotate90(&img), imageops::rotate180(&img), imageops::rotate270(&img)] {
            let hu = hu_moments_from_gray(&rotated, &config).unwrap();
            assert!(
                hu_distance(&base, &hu) < 1e-3,
                "rotated image drifted: {:?} vs {:?}",
                base,
                hu
            );
        }
    }

    #[test]
    fn test_arbitrary_rotation_invariance() {
        let img = shape_image(160, 140);
        let config = HuConfig::default();
        let base = hu_moments_from_gray(&img, &config).unwrap();

        for degrees in [30.0f32, -45.0] {
            let rotated = rotate_about_center(&img, degrees.to_radians(), Interpolation::Bilinear, Luma([255]));
            let hu = hu_moments_from_gray(&rotated, &config).unwrap();
            for i in 0..4 {
                assert!(
                    (base[i] - hu[i]).abs() < 0.05,
                    "h{} drifted at {} degrees: {} vs {}",
                    i + 1,
                    degrees,
                    base[i],
                    hu[i]
                );
            }
        }
    }

    #[test]
    fn test_colored_ink_is_foreground() {
        let mut img = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut img, Rect::at(20, 30).of_size(60, 40), Rgb([0, 200, 0]));
        let path = temp_path("hu-green-ink.png");
        img.save(&path).unwrap();

        let hu = get_hu_moments(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        let gray = GrayImage::from_fn(100, 100, |x, y| {
            if (20..80).contains(&x) && (30..70).contains(&y) {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let expected = hu_moments_from_gray(&gray, &HuConfig::default()).unwrap();
        assert_eq!(hu, expected);
    }

    #[test]
    fn test_blank_image_has_no_contour() {
        let img = GrayImage::from_pixel(32, 32, Luma([255]));
        let err = hu_moments_from_gray(&img, &HuConfig::default()).unwrap_err();
        assert!(matches!(err, SimilarityError::NoContour { path: None }));
    }

    #[test]
    fn test_hu_moments_from_file() {
        let path = temp_path("hu-shape.png");
        shape_image(160, 140).save(&path).unwrap();

        let from_file = get_hu_moments(&path).unwrap();
        let in_memory = hu_moments_from_gray(&shape_image(160, 140), &HuConfig::default()).unwrap();
        assert_eq!(from_file, in_memory);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_blank_file_names_path() {
        let path = temp_path("hu-blank.png");
        GrayImage::from_pixel(16, 16, Luma([255])).save(&path).unwrap();

        match get_hu_moments(&path) {
            Err(SimilarityError::NoContour { path: Some(p) }) => assert_eq!(p, path),
            other => panic!("expected NoContour, got {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = get_hu_moments(temp_path("hu-does-not-exist.png")).unwrap_err();
        assert!(matches!(err, SimilarityError::Decode { .. }));
    }

    #[test]
    fn test_hu_distance() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let mut b = a;
        assert_eq!(hu_distance(&a, &b), 0.0);
        b[6] = -7.0;
        assert_eq!(hu_distance(&a, &b), 14.0);
    }
}
