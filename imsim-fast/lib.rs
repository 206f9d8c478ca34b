//! Multi-scale oriented FAST detection for ORB.
//!
//! Corners are found with the FAST-9 segment test on every pyramid level,
//! thinned by 3x3 non-maximum suppression, ranked by Harris response against
//! a per-level budget and oriented by intensity centroid.

pub mod corner_detection;
pub mod detector;
pub mod error;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

pub use detector::{validate_config, FastDetector};
pub use error::{FastError, FastResult};
pub use types::{LevelDetections, ScaleLevel, ScoredKeypoint};
