//! Multimodal preprocessing errors.

use std::path::PathBuf;

use thiserror::Error;

pub type MultiModalResult<T> = Result<T, MultiModalError>;

#[derive(Debug, Error)]
pub enum MultiModalError {
    #[error("absolute aspect ratio must be at most {max_ratio}, got {ratio:.3}")]
    AspectRatioTooLarge { ratio: f64, max_ratio: f64 },

    #[error("invalid image dimensions {height}x{width}")]
    InvalidDimensions { height: u32, width: u32 },

    #[error("invalid pixel budget: {0}")]
    InvalidBudget(String),

    #[error("failed to decode image '{path}': {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),

    #[error("failed to decode video '{path}': {reason}")]
    VideoDecode { path: PathBuf, reason: String },

    #[error("video '{0}' contains no frames")]
    EmptyVideo(PathBuf),

    #[error("invalid vision config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MultiModalError {
    pub(crate) fn video_decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::VideoDecode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from input validation rather than media I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::AspectRatioTooLarge { .. }
                | Self::InvalidDimensions { .. }
                | Self::InvalidBudget(_)
                | Self::Config(_)
        )
    }
}
