#[derive(Debug, Clone, PartialEq)]
pub enum FastError {
    InvalidImageSize { width: usize, height: usize },
    InvalidImageData { expected_len: usize, actual_len: usize },
    InvalidThreshold(u8),
    InvalidPatchSize(usize),
    InvalidEdgeThreshold(usize),
    InvalidScaleFactor(f32),
    InvalidLevelCount(usize),
}

impl std::fmt::Display for FastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FastError::InvalidImageSize { width, height } => {
                write!(f, "Invalid image dimensions: {}x{} (must be > 0)", width, height)
            }
            FastError::InvalidImageData { expected_len, actual_len } => {
                write!(f, "Image data length mismatch: expected {}, got {}", expected_len, actual_len)
            }
            FastError::InvalidThreshold(t) => {
                write!(f, "Invalid threshold: {} (must be 1-127)", t)
            }
            FastError::InvalidPatchSize(p) => {
                write!(f, "Invalid patch size: {} (must be odd and at least 3)", p)
            }
            FastError::InvalidEdgeThreshold(e) => {
                write!(f, "Invalid edge threshold: {} (must be at least 3)", e)
            }
            FastError::InvalidScaleFactor(s) => {
                write!(f, "Invalid scale factor: {} (must be > 1)", s)
            }
            FastError::InvalidLevelCount(n) => {
                write!(f, "Invalid pyramid level count: {} (must be 1-32)", n)
            }
        }
    }
}

impl std::error::Error for FastError {}

pub type FastResult<T> = Result<T, FastError>;
