//! Vision preprocessing configuration.

use serde::{Deserialize, Serialize};

use crate::{
    error::{MultiModalError, MultiModalResult},
    resize::{PixelBudget, ResolutionSolver, DEFAULT_FACTOR, DEFAULT_MAX_RATIO},
    sampling::FrameSampler,
};

const PATCH_AREA: u64 = (DEFAULT_FACTOR as u64) * (DEFAULT_FACTOR as u64);

/// Image and video budgeting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Lower pixel bound for every image and frame
    #[serde(default = "default_min_pixels")]
    pub min_pixels: u64,

    /// Upper pixel bound for still images
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,

    /// Both output sides are multiples of this
    #[serde(default = "default_factor")]
    pub factor: u32,

    /// Largest accepted aspect ratio
    #[serde(default = "default_max_ratio")]
    pub max_ratio: u32,

    /// JPEG quality (1-100) of encoded images
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Pixel ceiling for live-capture frames. Defaults to the smallest video
    /// candidate budget.
    #[serde(default)]
    pub capture_frame_budget: Option<u64>,

    #[serde(default)]
    pub video: VideoSamplingConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            min_pixels: default_min_pixels(),
            max_pixels: default_max_pixels(),
            factor: default_factor(),
            max_ratio: default_max_ratio(),
            jpeg_quality: default_jpeg_quality(),
            capture_frame_budget: None,
            video: VideoSamplingConfig::default(),
        }
    }
}

impl VisionConfig {
    pub fn solver(&self) -> ResolutionSolver {
        ResolutionSolver::new(self.factor, f64::from(self.max_ratio))
    }

    /// Budget applied to still images.
    pub fn image_budget(&self) -> PixelBudget {
        PixelBudget {
            min_pixels: self.min_pixels,
            max_pixels: self.max_pixels,
        }
    }

    /// Budget applied to live-capture frames.
    pub fn capture_budget(&self) -> PixelBudget {
        let max_pixels = self
            .capture_frame_budget
            .or_else(|| self.video.max_pixels_choices.last().copied())
            .unwrap_or(self.max_pixels);
        self.image_budget().with_max(max_pixels)
    }

    pub fn frame_sampler(&self) -> FrameSampler {
        FrameSampler {
            sampling_fps: self.video.sampling_fps,
            min_n_frames: self.video.min_n_frames,
            max_video_length: self.video.max_video_length,
            max_pixels_choices: self.video.max_pixels_choices.clone(),
            fallback_max_pixels: self.max_pixels,
            factor: self.factor,
            use_timestamp: self.video.use_timestamp,
        }
    }

    pub fn validate(&self) -> MultiModalResult<()> {
        if self.factor == 0 {
            return Err(MultiModalError::Config("factor must be positive".to_string()));
        }
        if self.max_ratio == 0 {
            return Err(MultiModalError::Config(
                "max_ratio must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MultiModalError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }

        let budget = PixelBudget::new(self.min_pixels, self.max_pixels)
            .map_err(|e| MultiModalError::Config(e.to_string()))?;
        if !budget.is_aligned(self.factor) {
            return Err(MultiModalError::Config(format!(
                "min_pixels and max_pixels must be multiples of factor^2 ({})",
                u64::from(self.factor) * u64::from(self.factor)
            )));
        }
        if let Some(capture) = self.capture_frame_budget {
            if capture < self.min_pixels {
                return Err(MultiModalError::Config(format!(
                    "capture_frame_budget ({capture}) is below min_pixels ({})",
                    self.min_pixels
                )));
            }
        }
        self.video.validate(self.min_pixels)
    }
}

/// Frame sampling strategy for video inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSamplingConfig {
    /// Target frames per second of video time
    #[serde(default = "default_sampling_fps")]
    pub sampling_fps: f64,

    /// Frame count floor (capped by the video's length)
    #[serde(default = "default_min_n_frames")]
    pub min_n_frames: usize,

    /// Total token-equivalent budget: `frames * max_pixels / factor²`
    #[serde(default = "default_max_video_length")]
    pub max_video_length: u64,

    /// Per-frame pixel ceilings, highest fidelity first
    #[serde(default = "default_max_pixels_choices")]
    pub max_pixels_choices: Vec<u64>,

    /// Prefix every frame with a `[<seconds> second]` label
    #[serde(default = "default_use_timestamp")]
    pub use_timestamp: bool,
}

impl Default for VideoSamplingConfig {
    fn default() -> Self {
        Self {
            sampling_fps: default_sampling_fps(),
            min_n_frames: default_min_n_frames(),
            max_video_length: default_max_video_length(),
            max_pixels_choices: default_max_pixels_choices(),
            use_timestamp: default_use_timestamp(),
        }
    }
}

impl VideoSamplingConfig {
    fn validate(&self, min_pixels: u64) -> MultiModalResult<()> {
        if !(self.sampling_fps.is_finite() && self.sampling_fps > 0.0) {
            return Err(MultiModalError::Config(format!(
                "sampling_fps must be positive, got {}",
                self.sampling_fps
            )));
        }
        if self.max_video_length == 0 {
            return Err(MultiModalError::Config(
                "max_video_length must be positive".to_string(),
            ));
        }
        if self.max_pixels_choices.is_empty() {
            return Err(MultiModalError::Config(
                "max_pixels_choices must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .max_pixels_choices
            .iter()
            .find(|choice| **choice < min_pixels)
        {
            return Err(MultiModalError::Config(format!(
                "max_pixels_choices entry {bad} is below min_pixels ({min_pixels})"
            )));
        }
        Ok(())
    }
}

fn default_min_pixels() -> u64 {
    4 * PATCH_AREA
}

fn default_max_pixels() -> u64 {
    5120 * PATCH_AREA
}

fn default_factor() -> u32 {
    DEFAULT_FACTOR
}

fn default_max_ratio() -> u32 {
    DEFAULT_MAX_RATIO
}

fn default_jpeg_quality() -> u8 {
    75
}

fn default_sampling_fps() -> f64 {
    1.0
}

fn default_min_n_frames() -> usize {
    16
}

fn default_max_video_length() -> u64 {
    81920
}

fn default_max_pixels_choices() -> Vec<u64> {
    [640, 512, 384, 256, 160, 128]
        .iter()
        .map(|patches| patches * PATCH_AREA)
        .collect()
}

fn default_use_timestamp() -> bool {
    true
}
