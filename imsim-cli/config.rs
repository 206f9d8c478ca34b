use crate::error::{SimilarityError, SimilarityResult};
use crate::homography::RansacConfig;
use crate::hu::HuConfig;
use crate::preprocess::PreprocessConfig;
use crate::similarity::ScoreMode;
use imsim_core::OrbConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference image compared against when none is given
pub const DEFAULT_REFERENCE_PATH: &str = "server/ReferenceImages/RO_Upscaled_Beta.png";

/// Upper bound on decoded image size (width * height)
pub const DEFAULT_MAX_PIXELS: u64 = 50_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Write the match composite here when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Most matches drawn, best distance first
    pub max_matches: usize,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            output: None,
            max_matches: 20,
        }
    }
}

/// Complete comparison settings; every section falls back to its defaults
/// when omitted from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub reference_path: PathBuf,
    /// Limit applied to both images of an ORB comparison
    pub max_pixels: u64,
    pub score: ScoreMode,
    pub preprocess: PreprocessConfig,
    pub orb: OrbConfig,
    pub ransac: RansacConfig,
    pub hu: HuConfig,
    pub visualization: VisualizationConfig,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            reference_path: PathBuf::from(DEFAULT_REFERENCE_PATH),
            max_pixels: DEFAULT_MAX_PIXELS,
            score: ScoreMode::default(),
            preprocess: PreprocessConfig::default(),
            orb: OrbConfig::default(),
            ransac: RansacConfig::default(),
            hu: HuConfig::default(),
            visualization: VisualizationConfig::default(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> SimilarityError {
    SimilarityError::Config(msg.into())
}

impl SimilarityConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> SimilarityResult<()> {
        self.preprocess.validate()?;
        imsim_fast::validate_config(&self.orb)?;

        if self.max_pixels == 0 || self.hu.max_pixels == 0 {
            return Err(invalid("max_pixels must be positive"));
        }
        let r = &self.ransac;
        if !(r.reprojection_threshold > 0.0) || !r.reprojection_threshold.is_finite() {
            return Err(invalid(format!(
                "ransac.reprojection_threshold must be positive, got {}",
                r.reprojection_threshold
            )));
        }
        if r.max_iters == 0 {
            return Err(invalid("ransac.max_iters must be at least 1"));
        }
        if !(r.confidence > 0.0 && r.confidence < 1.0) {
            return Err(invalid(format!("ransac.confidence must be in (0, 1), got {}", r.confidence)));
        }
        if !(self.hu.epsilon > 0.0) {
            return Err(invalid(format!("hu.epsilon must be positive, got {}", self.hu.epsilon)));
        }
        Ok(())
    }

    /// Load by extension: `.json`, otherwise TOML
    pub fn load<P: AsRef<Path>>(path: P) -> SimilarityResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::load_json(path),
            _ => Self::load_toml(path),
        }
    }

    /// Save configuration to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> SimilarityResult<()> {
        let json = self.to_json()?;
        write_file(path.as_ref(), &json)
    }

    /// Load configuration from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> SimilarityResult<Self> {
        Self::from_json(&read_file(path.as_ref())?)
    }

    /// Save configuration to TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> SimilarityResult<()> {
        let toml = self.to_toml()?;
        write_file(path.as_ref(), &toml)
    }

    /// Load configuration from TOML file
    pub fn load_toml<P: AsRef<Path>>(path: P) -> SimilarityResult<Self> {
        Self::from_toml(&read_file(path.as_ref())?)
    }

    pub fn to_json(&self) -> SimilarityResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))
    }

    pub fn from_json(json: &str) -> SimilarityResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> SimilarityResult<String> {
        toml::to_string_pretty(self).map_err(|e| invalid(e.to_string()))
    }

    pub fn from_toml(toml_str: &str) -> SimilarityResult<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

fn read_file(path: &Path) -> SimilarityResult<String> {
    std::fs::read_to_string(path).map_err(|e| invalid(format!("{}: {}", path.display(), e)))
}

fn write_file(path: &Path, contents: &str) -> SimilarityResult<()> {
    std::fs::write(path, contents).map_err(|e| invalid(format!("{}: {}", path.display(), e)))
}
