pub mod filter;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
pub type Image = Vec<u8>;

/// Key-point ≙ FAST corner + orientation (radians) in full-resolution coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    /// Harris response used for ranking
    pub response: f32,
    /// Pyramid level the corner was found on
    pub octave: usize,
    /// Patch diameter in full-resolution pixels
    pub size: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            angle: 0.0,
            response: 0.0,
            octave: 0,
            size: 0.0,
        }
    }
}

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// Pairing of a query descriptor with a train descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    /// Hamming distance between the two descriptors
    pub distance: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OrbConfig {
    /// FAST intensity threshold
    pub threshold: u8,
    /// Orientation and descriptor patch diameter (odd)
    pub patch_size: usize,
    /// Border excluded from detection at every pyramid level
    pub edge_threshold: usize,
    /// Upper bound on retained keypoints across all levels
    pub n_features: usize,
    pub n_levels: usize,
    pub scale_factor: f32,
    pub n_threads: usize,
}

impl Default for OrbConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            patch_size: 31,
            edge_threshold: 31,
            n_features: 2000,
            n_levels: 8,
            scale_factor: 1.2,
            n_threads: num_cpus::get().max(1),
        }
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_reference_values() {
        let cfg = OrbConfig::default();
        assert_eq!(cfg.n_features, 2000);
        assert_eq!(cfg.patch_size % 2, 1);
        assert!(cfg.n_threads >= 1);
        assert!(cfg.scale_factor > 1.0);
    }

    #[test]
    fn test_keypoint_new() {
        let kp = Keypoint::new(3.5, 4.0);
        assert_eq!(kp.octave, 0);
        assert_eq!(kp.angle, 0.0);
        assert_eq!((kp.x, kp.y), (3.5, 4.0));
    }
}
