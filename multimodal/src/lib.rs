pub mod config;
pub mod encoder;
pub mod error;
pub mod resize;
pub mod sampling;
pub mod types;
pub mod video;

pub use config::{VideoSamplingConfig, VisionConfig};
pub use encoder::{load_image, MediaEncoder};
pub use error::{MultiModalError, MultiModalResult};
pub use resize::{smart_resize, PixelBudget, ResizedDims, ResolutionSolver};
pub use sampling::{sequence_label, timestamp_label, FrameSampler, FrameSelection, SampledFrame};
pub use types::{EncodedImage, MediaInput, MediaKind, TimedFrame};
// Re-export video decoding components
pub use video::{load_video, AnimationDecoder, FfmpegDecoder, VideoDecoder, VideoInfo};
