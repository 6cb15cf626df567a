//! Media inputs and encoded outputs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How a media file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    /// Single frame taken from a live capture buffer
    CaptureFrame,
}

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "m4v", "flv", "wmv", "mpeg", "mpg", "3gp", "ts",
];

impl MediaKind {
    /// Guess the kind from a file extension: video containers are videos,
    /// `.webp` snapshots are capture frames, anything else is an image and
    /// fails later at decode time if it is not.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Self::Video
        } else if ext == "webp" {
            Self::CaptureFrame
        } else {
            Self::Image
        }
    }
}

/// A local media file attached to a user turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInput {
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Position of a capture frame in its session, rendered as `[<n> second]`.
    /// When absent the frame's position in the turn's media list is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_sequence_number: Option<u64>,
}

impl MediaInput {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self {
            path,
            kind,
            capture_sequence_number: None,
        }
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::Image,
            capture_sequence_number: None,
        }
    }

    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::Video,
            capture_sequence_number: None,
        }
    }

    pub fn capture_frame(path: impl Into<PathBuf>, sequence_number: u64) -> Self {
        Self {
            path: path.into(),
            kind: MediaKind::CaptureFrame,
            capture_sequence_number: Some(sequence_number),
        }
    }
}

/// A JPEG ready for an `image_url` content part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard base64 of the JPEG bytes, no data-URL prefix
    pub data: String,
    pub width: u32,
    pub height: u32,
}

/// An encoded video frame with its presentation time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedFrame {
    pub image: EncodedImage,
    pub timestamp: Option<f64>,
}
