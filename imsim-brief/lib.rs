use imsim_core::filter::{gaussian_blur, Border};
use imsim_core::{Descriptor, Image, Keypoint};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

pub mod matcher;

pub use matcher::{hamming_distance, match_cross_check, nearest_neighbours};

const DESCRIPTOR_SIZE: usize = 32;
const DESCRIPTOR_BITS: usize = DESCRIPTOR_SIZE * 8;

/// Seed of the sampling pattern; both images of a comparison must share it
pub const PATTERN_SEED: u64 = 0x5EED_0F0B_B41E_F001;

/// Smoothing applied before the intensity tests
const SMOOTHING_KERNEL: usize = 7;

/// Test-point pair `(x1, y1, x2, y2)` relative to the keypoint
pub type TestPair = (f32, f32, f32, f32);

/// Draw `DESCRIPTOR_BITS` test pairs from an isotropic Gaussian (σ = patch/5),
/// clamped to the patch. Deterministic for a given patch size.
pub fn sampling_pattern(patch_size: usize) -> Vec<TestPair> {
    let half = (patch_size / 2) as f32;
    let sigma = patch_size as f32 / 5.0;
    let normal = Normal::new(0.0f32, sigma).expect("sigma is positive for patch_size >= 3");
    let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
    let mut draw = || normal.sample(&mut rng).round().clamp(-half, half);

    (0..DESCRIPTOR_BITS)
        .map(|_| (draw(), draw(), draw(), draw()))
        .collect()
}

pub struct BriefGenerator {
    w: usize,
    h: usize,
    pattern: Vec<TestPair>,
}

impl BriefGenerator {
    pub fn new(width: usize, height: usize, patch_size: usize) -> Self {
        assert!(width > 0 && height > 0);
        assert!(patch_size >= 3 && patch_size % 2 == 1);
        Self {
            w: width,
            h: height,
            pattern: sampling_pattern(patch_size),
        }
    }

    /// One descriptor per keypoint, in keypoint order. Keypoint coordinates
    /// must be in this image's pixel frame.
    pub fn generate_descriptors(&self, img: &Image, kps: &[Keypoint]) -> Vec<Descriptor> {
        assert_eq!(img.len(), self.w * self.h);
        if kps.is_empty() {
            return Vec::new();
        }

        let smoothed = gaussian_blur(img, self.w, self.h, SMOOTHING_KERNEL, Border::Reflect101);

        kps.par_iter()
            .map(|kp| {
                let (s, c) = kp.angle.sin_cos();
                let (cx, cy) = (kp.x, kp.y);
                let mut d = [0u8; DESCRIPTOR_SIZE];

                for (i, &(dx1, dy1, dx2, dy2)) in self.pattern.iter().enumerate() {
                    // Steer the test pair by the keypoint orientation
                    let (rx1, ry1) = (cx + c * dx1 - s * dy1, cy + s * dx1 + c * dy1);
                    let (rx2, ry2) = (cx + c * dx2 - s * dy2, cy + s * dx2 + c * dy2);

                    let val1 = self.bilinear_sample(&smoothed, rx1, ry1);
                    let val2 = self.bilinear_sample(&smoothed, rx2, ry2);

                    let bit = (val1 < val2) as u8;
                    d[i / 8] |= bit << (i % 8);
                }
                d
            })
            .collect()
    }

    /// Bilinear interpolation for subpixel sampling
    fn bilinear_sample(&self, img: &[u8], x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let x1 = x0 + 1.0;
        let y1 = y0 + 1.0;

        // Clamp to image bounds for boundary samples
        if x0 < 0.0 || y0 < 0.0 || x1 >= self.w as f32 || y1 >= self.h as f32 {
            let cx = x.round().clamp(0.0, (self.w - 1) as f32) as usize;
            let cy = y.round().clamp(0.0, (self.h - 1) as f32) as usize;
            return img[cy * self.w + cx] as f32;
        }

        let dx = x - x0;
        let dy = y - y0;

        let x0_idx = x0 as usize;
        let y0_idx = y0 as usize;
        let x1_idx = x1 as usize;
        let y1_idx = y1 as usize;

        let p00 = img[y0_idx * self.w + x0_idx] as f32;
        let p10 = img[y0_idx * self.w + x1_idx] as f32;
        let p01 = img[y1_idx * self.w + x0_idx] as f32;
        let p11 = img[y1_idx * self.w + x1_idx] as f32;

        let top = p00 * (1.0 - dx) + p10 * dx;
        let bottom = p01 * (1.0 - dx) + p11 * dx;

        top * (1.0 - dy) + bottom * dy
    }
}
