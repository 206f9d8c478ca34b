use imsim_core::{Image, Keypoint};
use crate::types::{CornerType, ScoredKeypoint};
use crate::utils::has_consecutive_bits;
use rayon::prelude::*;

/// Corner detection algorithms (FAST segment test and Harris ranking)
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection, contiguous around the circle
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Contiguous arc length required by FAST-9
    pub const ARC_LENGTH: usize = 9;

    /// Harris detector free parameter
    pub const HARRIS_K: f64 = 0.04;

    /// Detect FAST-9 corners at least `border` pixels away from every edge.
    ///
    /// Rows are processed in parallel; the result keeps row-major order.
    pub fn detect_corners(
        img: &Image,
        width: usize,
        height: usize,
        threshold: u8,
        border: usize,
    ) -> Vec<ScoredKeypoint> {
        let border = border.max(3);
        if width <= 2 * border || height <= 2 * border {
            return Vec::new();
        }

        (border..height - border)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut row_keypoints = Vec::new();
                for x in border..width - border {
                    let center = img[y * width + x];
                    let (kind, mask) = Self::classify(img, width, x, y, center, threshold);
                    if kind != CornerType::None {
                        row_keypoints.push(ScoredKeypoint {
                            keypoint: Keypoint::new(x as f32, y as f32),
                            response: Self::segment_score(img, width, x, y, center, threshold, mask),
                        });
                    }
                }
                row_keypoints
            })
            .collect()
    }

    #[inline]
    fn circle_pixel(img: &Image, width: usize, x: usize, y: usize, i: usize) -> u8 {
        let (dx, dy) = Self::FAST_OFFSETS[i];
        let px = (x as i32 + dx) as usize;
        let py = (y as i32 + dy) as usize;
        img[py * width + px]
    }

    /// Segment test; returns the corner polarity and the mask of circle
    /// pixels that passed for that polarity.
    pub(crate) fn classify(
        img: &Image,
        width: usize,
        x: usize,
        y: usize,
        center: u8,
        threshold: u8,
    ) -> (CornerType, u16) {
        let hi = center.saturating_add(threshold);
        let lo = center.saturating_sub(threshold);

        // A 9-pixel arc always covers at least two of the four compass points
        let mut compass_bright = 0;
        let mut compass_dark = 0;
        for i in [0, 4, 8, 12] {
            let q = Self::circle_pixel(img, width, x, y, i);
            if q > hi {
                compass_bright += 1;
            } else if q < lo {
                compass_dark += 1;
            }
        }
        if compass_bright < 2 && compass_dark < 2 {
            return (CornerType::None, 0);
        }

        let mut bright = 0u16;
        let mut dark = 0u16;
        for i in 0..16 {
            let q = Self::circle_pixel(img, width, x, y, i);
            if q > hi {
                bright |= 1 << i;
            } else if q < lo {
                dark |= 1 << i;
            }
        }

        if has_consecutive_bits(bright, Self::ARC_LENGTH) {
            (CornerType::Bright, bright)
        } else if has_consecutive_bits(dark, Self::ARC_LENGTH) {
            (CornerType::Dark, dark)
        } else {
            (CornerType::None, 0)
        }
    }

    /// Sum of absolute differences beyond the threshold over the passing pixels
    fn segment_score(
        img: &Image,
        width: usize,
        x: usize,
        y: usize,
        center: u8,
        threshold: u8,
        mask: u16,
    ) -> f32 {
        (0..16)
            .filter(|i| mask & (1 << i) != 0)
            .map(|i| {
                let q = Self::circle_pixel(img, width, x, y, i) as i32;
                ((q - center as i32).abs() - threshold as i32) as f32
            })
            .sum()
    }

    /// Harris corner response over a 5x5 window of Sobel gradients
    pub fn compute_harris_response(img: &Image, width: usize, height: usize, x: usize, y: usize) -> f32 {
        if x < 3 || y < 3 || x + 3 >= width || y + 3 >= height {
            return 0.0;
        }

        let mut ixx = 0.0f64;
        let mut ixy = 0.0f64;
        let mut iyy = 0.0f64;

        for dy in -2..=2i32 {
            for dx in -2..=2i32 {
                let nx = (x as i32 + dx) as usize;
                let ny = (y as i32 + dy) as usize;
                let (gx, gy) = Self::compute_gradients(img, width, nx, ny);
                ixx += (gx * gx) as f64;
                ixy += (gx * gy) as f64;
                iyy += (gy * gy) as f64;
            }
        }

        // det(M) - k * trace(M)^2
        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        (det - Self::HARRIS_K * trace * trace) as f32
    }

    /// Sobel gradients; caller guarantees a one-pixel margin
    fn compute_gradients(img: &Image, width: usize, x: usize, y: usize) -> (f32, f32) {
        let at = |xx: usize, yy: usize| img[yy * width + xx] as f32;

        // Sobel X kernel: [-1, 0, 1; -2, 0, 2; -1, 0, 1]
        let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x - 1, y) - at(x - 1, y + 1);

        // Sobel Y kernel: [-1, -2, -1; 0, 0, 0; 1, 2, 1]
        let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1);

        (gx / 8.0, gy / 8.0)
    }
}
