use imsim_fast::FastError;
use std::path::PathBuf;

#[derive(Debug)]
pub enum SimilarityError {
    /// The file could not be opened or decoded as an image
    Decode { path: PathBuf, message: String },
    /// Pixel count above the configured limit
    ImageTooLarge { path: PathBuf, pixels: u64, limit: u64 },
    /// Thresholding left no external contour
    NoContour { path: Option<PathBuf> },
    /// Adaptive thresholding left no foreground pixel to crop to
    EmptyForeground,
    Detector(FastError),
    Config(String),
    Visualization(String),
}

impl std::fmt::Display for SimilarityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityError::Decode { path, message } => {
                write!(f, "Could not read image: {} ({})", path.display(), message)
            }
            SimilarityError::ImageTooLarge { path, pixels, limit } => {
                write!(f, "Image {} has {} pixels (limit {})", path.display(), pixels, limit)
            }
            SimilarityError::NoContour { path: Some(path) } => {
                write!(f, "No contours found in image: {}", path.display())
            }
            SimilarityError::NoContour { path: None } => write!(f, "No contours found in image"),
            SimilarityError::EmptyForeground => {
                write!(f, "No foreground pixels left after adaptive thresholding")
            }
            SimilarityError::Detector(e) => write!(f, "Detector error: {}", e),
            SimilarityError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
            SimilarityError::Visualization(msg) => write!(f, "Visualization failed: {}", msg),
        }
    }
}

impl std::error::Error for SimilarityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimilarityError::Detector(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FastError> for SimilarityError {
    fn from(err: FastError) -> Self {
        SimilarityError::Detector(err)
    }
}

pub type SimilarityResult<T> = Result<T, SimilarityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_path() {
        let err = SimilarityError::Decode {
            path: PathBuf::from("scan.png"),
            message: "unsupported format".into(),
        };
        assert_eq!(err.to_string(), "Could not read image: scan.png (unsupported format)");

        let err = SimilarityError::NoContour { path: Some(PathBuf::from("blank.png")) };
        assert_eq!(err.to_string(), "No contours found in image: blank.png");
    }

    #[test]
    fn test_detector_error_converts() {
        let err: SimilarityError = FastError::InvalidThreshold(0).into();
        assert!(matches!(err, SimilarityError::Detector(FastError::InvalidThreshold(0))));
        assert!(std::error::Error::source(&err).is_some());
    }
}
