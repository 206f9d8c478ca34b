use imsim_core::{Image, Keypoint};

/// Keypoint with FAST segment score for NMS
#[derive(Debug, Clone, Copy)]
pub struct ScoredKeypoint {
    pub keypoint: Keypoint,
    pub response: f32,
}

/// Scale information for pyramid levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub level: usize,
    pub scale: f32,
    pub width: usize,
    pub height: usize,
    /// Keypoints this level may contribute
    pub n_features: usize,
}

/// One pyramid level together with the keypoints found on it.
///
/// Keypoint coordinates are in the level's own pixel frame so descriptors can
/// be sampled from `image` directly.
#[derive(Debug, Clone)]
pub struct LevelDetections {
    pub level: ScaleLevel,
    pub image: Image,
    pub keypoints: Vec<Keypoint>,
}

/// Corner type classification for the segment test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CornerType {
    Bright,
    Dark,
    None,
}
