//! Video frame sampling under a total token-equivalent budget.

use tracing::debug;

/// One selected frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledFrame {
    /// Position in the source video, `0..total_frames`
    pub index: usize,
    /// Presentation time in seconds, rounded to one decimal
    pub timestamp: Option<f64>,
}

/// Frames chosen for a video together with the per-frame pixel ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSelection {
    pub frames: Vec<SampledFrame>,
    pub max_pixels: u64,
}

impl FrameSelection {
    pub fn indices(&self) -> Vec<usize> {
        self.frames.iter().map(|frame| frame.index).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `frames * max_pixels / factor²`
    pub fn token_cost(&self, factor: u32) -> f64 {
        let patch_area = f64::from(factor) * f64::from(factor);
        self.frames.len() as f64 * self.max_pixels as f64 / patch_area
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameSampler {
    pub sampling_fps: f64,
    pub min_n_frames: usize,
    pub max_video_length: u64,
    /// Candidate per-frame ceilings, highest fidelity first
    pub max_pixels_choices: Vec<u64>,
    /// Ceiling used when there are no candidates
    pub fallback_max_pixels: u64,
    pub factor: u32,
    pub use_timestamp: bool,
}

impl FrameSampler {
    /// Select frames of a `total_frames` long video decoded at `native_fps`.
    ///
    /// The target count is `ceil(duration * sampling_fps)` clamped to
    /// `[min_n_frames, total_frames]`, spread evenly over the video. The first
    /// candidate ceiling whose total cost fits `max_video_length` wins; if none
    /// fits, the smallest candidate is kept and the frames are thinned evenly
    /// down to what that candidate allows.
    pub fn sample(&self, total_frames: usize, native_fps: f64) -> FrameSelection {
        let fps = if native_fps.is_finite() && native_fps > 0.0 {
            native_fps
        } else {
            debug!(native_fps, "Invalid native fps, assuming 1 fps");
            1.0
        };

        if total_frames == 0 {
            return FrameSelection {
                frames: Vec::new(),
                max_pixels: self
                    .max_pixels_choices
                    .first()
                    .copied()
                    .unwrap_or(self.fallback_max_pixels),
            };
        }

        let wanted = (total_frames as f64 / fps * self.sampling_fps).ceil() as usize;
        let n_frames = wanted.max(self.min_n_frames).min(total_frames);
        let mut indices = linspace_rounded(total_frames - 1, n_frames);

        let patch_area = f64::from(self.factor) * f64::from(self.factor);
        let mut max_pixels = self.fallback_max_pixels;
        let last_round = self.max_pixels_choices.len().saturating_sub(1);

        for (round, &candidate) in self.max_pixels_choices.iter().enumerate() {
            max_pixels = candidate;
            let cost = indices.len() as f64 * candidate as f64 / patch_area;
            if cost <= self.max_video_length as f64 {
                break;
            }
            if round == last_round {
                let max_frames =
                    (self.max_video_length as f64 / candidate as f64 * patch_area) as usize;
                let keep = linspace_rounded(indices.len() - 1, max_frames);
                indices = keep.into_iter().map(|i| indices[i]).collect();
                debug!(
                    max_pixels = candidate,
                    max_frames, "Every candidate over budget, thinning frames"
                );
            }
        }

        debug!(
            total_frames,
            native_fps = fps,
            selected = indices.len(),
            max_pixels,
            "Sampled video frames"
        );

        let frames = indices
            .into_iter()
            .map(|index| SampledFrame {
                index,
                timestamp: self
                    .use_timestamp
                    .then(|| round_one_decimal(index as f64 / fps)),
            })
            .collect();

        FrameSelection { frames, max_pixels }
    }
}

/// `count` evenly spaced values over `[0, stop]`, rounded half to even.
fn linspace_rounded(stop: usize, count: usize) -> Vec<usize> {
    match count {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let step = stop as f64 / (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        stop
                    } else {
                        (i as f64 * step).round_ties_even() as usize
                    }
                })
                .collect()
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// Label placed before a timed frame, e.g. `[1.5 second]`.
pub fn timestamp_label(seconds: f64) -> String {
    format!("[{seconds:.1} second]")
}

/// Label placed before a live-capture frame, e.g. `[3 second]`.
pub fn sequence_label(sequence_number: u64) -> String {
    format!("[{sequence_number} second]")
}
