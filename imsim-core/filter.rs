//! Separable Gaussian filtering on row-major interleaved 8-bit buffers.

use rayon::prelude::*;

/// Border extrapolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    /// `aaaa|abcd|dddd`
    Replicate,
    /// `dcb|abcd|cba`
    Reflect101,
}

/// Sigma implied by a kernel size when none is given
pub fn sigma_for_kernel(ksize: usize) -> f64 {
    0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian kernel of odd length `ksize`
pub fn gaussian_kernel(ksize: usize, sigma: f64) -> Vec<f32> {
    assert!(ksize % 2 == 1, "kernel size must be odd");
    let sigma = if sigma > 0.0 { sigma } else { sigma_for_kernel(ksize) };
    let half = (ksize / 2) as f64;
    let scale = -0.5 / (sigma * sigma);

    let raw: Vec<f64> = (0..ksize)
        .map(|i| {
            let x = i as f64 - half;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

/// Map a possibly out-of-range coordinate back into `0..len`
pub fn border_index(i: isize, len: usize, border: Border) -> usize {
    let n = len as isize;
    match border {
        Border::Replicate => i.clamp(0, n - 1) as usize,
        Border::Reflect101 => {
            if n == 1 {
                return 0;
            }
            let period = 2 * (n - 1);
            let j = i.rem_euclid(period);
            (if j >= n { period - j } else { j }) as usize
        }
    }
}

/// Convolve every channel with `kernel` horizontally then vertically.
pub fn separable_filter(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    border: Border,
) -> Vec<u8> {
    assert_eq!(src.len(), width * height * channels);
    if src.is_empty() {
        return Vec::new();
    }
    let half = (kernel.len() / 2) as isize;
    let stride = width * channels;

    let mut horizontal = vec![0f32; src.len()];
    horizontal
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &src[y * stride..(y + 1) * stride];
            for x in 0..width {
                for c in 0..channels {
                    let mut acc = 0f32;
                    for (k, &w) in kernel.iter().enumerate() {
                        let xx = border_index(x as isize + k as isize - half, width, border);
                        acc += w * src_row[xx * channels + c] as f32;
                    }
                    row[x * channels + c] = acc;
                }
            }
        });

    let mut out = vec![0u8; src.len()];
    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (i, px) in row.iter_mut().enumerate() {
                let mut acc = 0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let yy = border_index(y as isize + k as isize - half, height, border);
                    acc += w * horizontal[yy * stride + i];
                }
                *px = acc.round().clamp(0.0, 255.0) as u8;
            }
        });

    out
}

/// Gaussian blur of a single-channel image
pub fn gaussian_blur(src: &[u8], width: usize, height: usize, ksize: usize, border: Border) -> Vec<u8> {
    let kernel = gaussian_kernel(ksize, 0.0);
    separable_filter(src, width, height, 1, &kernel, border)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sigma_for_common_kernels() {
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-12);
        assert!((sigma_for_kernel(11) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(5, 0.0);
        let sum: f32 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(k[0], k[4]);
        assert_eq!(k[1], k[3]);
        assert!(k[2] > k[1] && k[1] > k[0]);
    }

    #[test]
    fn test_border_index_modes() {
        assert_eq!(border_index(-1, 5, Border::Replicate), 0);
        assert_eq!(border_index(6, 5, Border::Replicate), 4);
        assert_eq!(border_index(-1, 5, Border::Reflect101), 1);
        assert_eq!(border_index(-2, 5, Border::Reflect101), 2);
        assert_eq!(border_index(5, 5, Border::Reflect101), 3);
        assert_eq!(border_index(3, 1, Border::Reflect101), 0);
    }

    #[test]
    fn test_flat_image_is_unchanged() {
        let img = vec![77u8; 12 * 9];
        let out = gaussian_blur(&img, 12, 9, 5, Border::Reflect101);
        assert_eq!(out, img);
    }

    #[test]
    fn test_multichannel_filter_keeps_channels_apart() {
        let (w, h) = (6, 4);
        let mut img = Vec::with_capacity(w * h * 3);
        for _ in 0..w * h {
            img.extend_from_slice(&[10, 200, 90]);
        }
        let kernel = gaussian_kernel(3, 0.0);
        let out = separable_filter(&img, w, h, 3, &kernel, Border::Replicate);
        for px in out.chunks(3) {
            assert_eq!(px, &[10, 200, 90]);
        }
    }

    #[test]
    fn test_impulse_spreads_symmetrically() {
        let (w, h) = (9, 9);
        let mut img = vec![0u8; w * h];
        img[4 * w + 4] = 255;
        let out = gaussian_blur(&img, w, h, 5, Border::Replicate);
        assert_eq!(out[4 * w + 3], out[4 * w + 5]);
        assert_eq!(out[3 * w + 4], out[5 * w + 4]);
        assert!(out[4 * w + 4] < 255);
        assert_eq!(out[0], 0);
    }

    proptest! {
        #[test]
        fn prop_blur_stays_within_input_range(data in proptest::collection::vec(any::<u8>(), 64)) {
            let out = gaussian_blur(&data, 8, 8, 5, Border::Reflect101);
            let lo = *data.iter().min().unwrap();
            let hi = *data.iter().max().unwrap();
            prop_assert!(out.iter().all(|&v| v >= lo && v <= hi));
        }
    }
}
