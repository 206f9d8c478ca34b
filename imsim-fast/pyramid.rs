use imsim_core::{Image, OrbConfig};
use crate::types::ScaleLevel;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate the usable scale levels for an image and split the feature
    /// budget across them.
    ///
    /// Levels too small to hold any pixel inside the edge border are dropped.
    /// The budget follows a geometric series in `1 / scale_factor` over the
    /// kept levels; the last level receives whatever is left.
    pub fn generate_scale_levels(width: usize, height: usize, cfg: &OrbConfig) -> Vec<ScaleLevel> {
        let mut levels = Vec::new();
        let mut current_scale = 1.0f32;

        for level in 0..cfg.n_levels {
            let scaled_width = ((width as f32) / current_scale).round() as usize;
            let scaled_height = ((height as f32) / current_scale).round() as usize;

            if scaled_width <= 2 * cfg.edge_threshold || scaled_height <= 2 * cfg.edge_threshold {
                break;
            }

            levels.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width,
                height: scaled_height,
                n_features: 0,
            });

            current_scale *= cfg.scale_factor;
        }

        Self::distribute_features(&mut levels, cfg.n_features, cfg.scale_factor);
        levels
    }

    fn distribute_features(levels: &mut [ScaleLevel], n_features: usize, scale_factor: f32) {
        let n_levels = levels.len();
        if n_levels == 0 {
            return;
        }

        let factor = 1.0 / scale_factor as f64;
        let mut desired = if n_levels == 1 {
            n_features as f64
        } else {
            n_features as f64 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32))
        };

        let mut assigned = 0usize;
        for level in levels.iter_mut().take(n_levels - 1) {
            let quota = (desired.round() as usize).min(n_features - assigned);
            level.n_features = quota;
            assigned += quota;
            desired *= factor;
        }
        levels[n_levels - 1].n_features = n_features - assigned;
    }

    /// Build image pyramid from base image
    pub fn build_image_pyramid(img: &Image, width: usize, height: usize, scale_levels: &[ScaleLevel]) -> Vec<Image> {
        scale_levels
            .iter()
            .map(|scale_level| {
                if scale_level.level == 0 {
                    img.clone()
                } else {
                    Self::downsample_image(img, width, height, scale_level.width, scale_level.height)
                }
            })
            .collect()
    }

    /// Downsample image using bilinear interpolation on pixel centres
    fn downsample_image(img: &Image, src_width: usize, src_height: usize, target_width: usize, target_height: usize) -> Image {
        let mut downsampled = vec![0u8; target_width * target_height];

        let x_ratio = src_width as f32 / target_width as f32;
        let y_ratio = src_height as f32 / target_height as f32;

        for y in 0..target_height {
            let src_y = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
            for x in 0..target_width {
                let src_x = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
                let value = Self::bilinear_sample(img, src_width, src_height, src_x, src_y);
                downsampled[y * target_width + x] = value.round().clamp(0.0, 255.0) as u8;
            }
        }

        downsampled
    }

    /// Sample image at fractional coordinates using bilinear interpolation
    fn bilinear_sample(img: &Image, width: usize, height: usize, x: f32, y: f32) -> f32 {
        let x1 = (x.floor() as usize).min(width - 1);
        let y1 = (y.floor() as usize).min(height - 1);
        let x2 = (x1 + 1).min(width - 1);
        let y2 = (y1 + 1).min(height - 1);

        let fx = x - x1 as f32;
        let fy = y - y1 as f32;

        let p11 = img[y1 * width + x1] as f32;
        let p12 = img[y1 * width + x2] as f32;
        let p21 = img[y2 * width + x1] as f32;
        let p22 = img[y2 * width + x2] as f32;

        let interpolated_top = p11 * (1.0 - fx) + p12 * fx;
        let interpolated_bottom = p21 * (1.0 - fx) + p22 * fx;

        interpolated_top * (1.0 - fy) + interpolated_bottom * fy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OrbConfig {
        OrbConfig {
            n_threads: 1,
            ..OrbConfig::default()
        }
    }

    #[test]
    fn test_budget_sums_to_n_features() {
        let cfg = test_config();
        let levels = ImagePyramid::generate_scale_levels(1000, 800, &cfg);
        assert_eq!(levels.len(), 8);
        let total: usize = levels.iter().map(|l| l.n_features).sum();
        assert_eq!(total, cfg.n_features);
        // Coarser levels get fewer features
        assert!(levels[0].n_features > levels[1].n_features);
    }

    #[test]
    fn test_small_images_drop_levels() {
        let cfg = test_config();
        let levels = ImagePyramid::generate_scale_levels(100, 100, &cfg);
        assert!(!levels.is_empty() && levels.len() < cfg.n_levels);
        for l in &levels {
            assert!(l.width > 2 * cfg.edge_threshold && l.height > 2 * cfg.edge_threshold);
        }
        let total: usize = levels.iter().map(|l| l.n_features).sum();
        assert_eq!(total, cfg.n_features);

        assert!(ImagePyramid::generate_scale_levels(60, 400, &cfg).is_empty());
    }

    #[test]
    fn test_scales_grow_geometrically() {
        let cfg = test_config();
        let levels = ImagePyramid::generate_scale_levels(640, 480, &cfg);
        for pair in levels.windows(2) {
            assert!((pair[1].scale / pair[0].scale - cfg.scale_factor).abs() < 1e-4);
        }
    }

    #[test]
    fn test_pyramid_images_have_level_dimensions() {
        let cfg = test_config();
        let (w, h) = (200, 150);
        let img: Image = (0..w * h).map(|i| (i % 251) as u8).collect();
        let levels = ImagePyramid::generate_scale_levels(w, h, &cfg);
        let pyramid = ImagePyramid::build_image_pyramid(&img, w, h, &levels);
        assert_eq!(pyramid.len(), levels.len());
        assert_eq!(pyramid[0], img);
        for (level, image) in levels.iter().zip(&pyramid) {
            assert_eq!(image.len(), level.width * level.height);
        }
    }

    #[test]
    fn test_downsample_preserves_flat_intensity() {
        let img = vec![123u8; 120 * 90];
        let out = ImagePyramid::downsample_image(&img, 120, 90, 100, 75);
        assert!(out.iter().all(|&v| v == 123));
    }
}
