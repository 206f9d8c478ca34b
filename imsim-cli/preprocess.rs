//! Photometric normalization applied to both images before feature extraction.
//!
//! Blur → grayscale → adaptive Gaussian threshold → crop to the bounding box
//! of the non-zero pixels.

use crate::error::{SimilarityError, SimilarityResult};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::map::map_colors;
use imageproc::rect::Rect;
use imsim_core::filter::{Border, gaussian_kernel, separable_filter};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Odd Gaussian blur kernel applied to the color image (1 disables it)
    pub blur_kernel: usize,
    /// Odd neighbourhood used for the weighted local mean
    pub block_size: usize,
    /// Subtracted from the local mean before comparing
    pub constant: i32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            block_size: 11,
            constant: 2,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> SimilarityResult<()> {
        if self.blur_kernel % 2 == 0 {
            return Err(SimilarityError::Config(format!(
                "preprocess.blur_kernel must be odd, got {}",
                self.blur_kernel
            )));
        }
        if self.block_size % 2 == 0 || self.block_size < 3 {
            return Err(SimilarityError::Config(format!(
                "preprocess.block_size must be odd and at least 3, got {}",
                self.block_size
            )));
        }
        Ok(())
    }
}

/// Gaussian blur of every color channel; sigma follows from the kernel size.
pub fn gaussian_blur_rgb(img: &RgbImage, ksize: usize) -> RgbImage {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if ksize <= 1 || w == 0 || h == 0 {
        return img.clone();
    }
    let kernel = gaussian_kernel(ksize, 0.0);
    let data = separable_filter(img.as_raw(), w, h, 3, &kernel, Border::Reflect101);

    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let i = (y as usize * w + x as usize) * 3;
        Rgb([data[i], data[i + 1], data[i + 2]])
    })
}

/// BT.601 luma in 14-bit fixed point, rounded half up
pub fn luma_bt601(Rgb([r, g, b]): Rgb<u8>) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14) as u8
}

/// Grayscale with 0.299 / 0.587 / 0.114 channel weights. Gray input maps to itself.
pub fn to_gray(img: &RgbImage) -> GrayImage {
    map_colors(img, |p| Luma([luma_bt601(p)]))
}

/// 255 where the pixel exceeds its Gaussian-weighted local mean minus
/// `constant`, 0 elsewhere. Borders replicate the edge pixel.
pub fn adaptive_threshold(gray: &GrayImage, block_size: usize, constant: i32) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let kernel = gaussian_kernel(block_size, 0.0);
    let mean = separable_filter(gray.as_raw(), w, h, 1, &kernel, Border::Replicate);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let i = y as usize * w + x as usize;
        if gray.as_raw()[i] as i32 > mean[i] as i32 - constant {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Smallest rectangle holding every non-zero pixel, `None` if there is none.
pub fn bounding_box_of_nonzero(img: &GrayImage) -> Option<Rect> {
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut found = false;

    for (x, y, p) in img.enumerate_pixels() {
        if p[0] != 0 {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| Rect::at(min_x as i32, min_y as i32).of_size(max_x - min_x + 1, max_y - min_y + 1))
}

pub fn crop(img: &GrayImage, rect: Rect) -> GrayImage {
    image::imageops::crop_imm(img, rect.left() as u32, rect.top() as u32, rect.width(), rect.height()).to_image()
}

/// Normalize a color image into the binary frame features are extracted from.
pub fn preprocess(img: &RgbImage, config: &PreprocessConfig) -> SimilarityResult<GrayImage> {
    config.validate()?;

    let blurred = gaussian_blur_rgb(img, config.blur_kernel);
    let gray = to_gray(&blurred);
    let binary = adaptive_threshold(&gray, config.block_size, config.constant);
    let bbox = bounding_box_of_nonzero(&binary).ok_or(SimilarityError::EmptyForeground)?;

    debug!(
        width = img.width(),
        height = img.height(),
        crop_x = bbox.left(),
        crop_y = bbox.top(),
        crop_w = bbox.width(),
        crop_h = bbox.height(),
        "preprocessed"
    );
    Ok(crop(&binary, bbox))
}
