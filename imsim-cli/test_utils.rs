//! Synthetic scenes and scratch paths shared by the unit tests.

use crate::config::SimilarityConfig;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use imsim_core::OrbConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

/// Unique per process so parallel test binaries do not collide
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("imsim-{}-{}", std::process::id(), name))
}

pub fn test_orb_config() -> OrbConfig {
    OrbConfig {
        n_features: 500,
        n_threads: 2,
        ..OrbConfig::default()
    }
}

pub fn test_config() -> SimilarityConfig {
    SimilarityConfig {
        orb: test_orb_config(),
        ..SimilarityConfig::default()
    }
}

/// Light page with dark rectangles, discs and triangles scattered by `seed`
pub fn textured_scene(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::from_pixel(width, height, Rgb([235, 232, 225]));

    for _ in 0..40 {
        let shade = rng.gen_range(0..90u8);
        let color = Rgb([shade, shade, shade.saturating_add(10)]);
        let x = rng.gen_range(0..width as i32);
        let y = rng.gen_range(0..height as i32);
        match rng.gen_range(0..3) {
            0 => {
                let w = rng.gen_range(6..40u32);
                let h = rng.gen_range(6..40u32);
                draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), color);
            }
            1 => {
                let r = rng.gen_range(4..18);
                draw_filled_circle_mut(&mut img, (x, y), r, color);
            }
            _ => {
                let dx = rng.gen_range(8..36);
                let dy = rng.gen_range(8..36);
                let poly = [Point::new(x, y), Point::new(x + dx, y + dy / 3), Point::new(x + dx / 4, y + dy)];
                draw_polygon_mut(&mut img, &poly, color);
            }
        }
    }
    img
}

/// Asymmetric L-shaped dark blob on a white page
pub fn shape_image(width: u32, height: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([255]));
    draw_filled_rect_mut(&mut img, Rect::at(30, 30).of_size(80, 20), Luma([0]));
    draw_filled_rect_mut(&mut img, Rect::at(30, 50).of_size(25, 60), Luma([0]));
    draw_filled_rect_mut(&mut img, Rect::at(90, 50).of_size(20, 20), Luma([0]));
    img
}
