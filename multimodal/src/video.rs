//! Video decoding and frame extraction.
//!
//! [`FfmpegDecoder`] shells out to `ffprobe`/`ffmpeg` for real containers.
//! [`AnimationDecoder`] covers files that are not videos at all (animated
//! GIF/WebP/APNG or a single still) by treating every frame as one second.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use image::{
    codecs::{gif::GifDecoder, png::PngDecoder, webp::WebPDecoder},
    AnimationDecoder as _, DynamicImage, Frame, RgbImage,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::VisionConfig,
    encoder::{load_image, MediaEncoder},
    error::{MultiModalError, MultiModalResult},
    types::TimedFrame,
};

/// Stream properties needed for sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub total_frames: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

pub trait VideoDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn probe(&self, path: &Path) -> MultiModalResult<VideoInfo>;

    /// Decode the frames at `indices` (ascending) as RGB.
    fn read_frames(
        &self,
        path: &Path,
        info: &VideoInfo,
        indices: &[usize],
    ) -> MultiModalResult<Vec<RgbImage>>;
}

#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    pub ffprobe: PathBuf,
    pub ffmpeg: PathBuf,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self {
            ffprobe: PathBuf::from("ffprobe"),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_read_packets: Option<String>,
    nb_frames: Option<String>,
}

impl FfmpegDecoder {
    pub fn new(ffprobe: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            ffmpeg: ffmpeg.into(),
        }
    }

    /// Frames are extracted in coded orientation (`-noautorotate`) so they
    /// match the dimensions reported by `probe`.
    fn frames_command(&self, path: &Path, indices: &[usize]) -> Command {
        let mut command = Command::new(&self.ffmpeg);
        command
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .arg("-vf")
            .arg(select_filter(indices))
            .args(["-fps_mode", "passthrough"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);
        command
    }

    fn run(mut command: Command, path: &Path) -> MultiModalResult<Vec<u8>> {
        let program = command.get_program().to_string_lossy().into_owned();
        let output = command
            .stdin(Stdio::null())
            .output()
            .map_err(|e| MultiModalError::video_decode(path, format!("failed to run {program}: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MultiModalError::video_decode(
                path,
                format!("{program} exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(output.stdout)
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn probe(&self, path: &Path) -> MultiModalResult<VideoInfo> {
        let mut command = Command::new(&self.ffprobe);
        command
            .args(["-v", "error", "-select_streams", "v:0", "-count_packets"])
            .args([
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate,nb_read_packets,nb_frames",
            ])
            .args(["-of", "json"])
            .arg(path);
        let stdout = Self::run(command, path)?;
        parse_probe_output(&stdout).map_err(|reason| MultiModalError::video_decode(path, reason))
    }

    fn read_frames(
        &self,
        path: &Path,
        info: &VideoInfo,
        indices: &[usize],
    ) -> MultiModalResult<Vec<RgbImage>> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }
        let raw = Self::run(self.frames_command(path, indices), path)?;
        split_raw_frames(raw, info.width, info.height)
            .map_err(|reason| MultiModalError::video_decode(path, reason))
    }
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoInfo, String> {
    let output: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable ffprobe output: {e}"))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("video stream has no dimensions".to_string()),
    };
    let total_frames = [stream.nb_read_packets.as_deref(), stream.nb_frames.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|count| count.trim().parse::<usize>().ok())
        .ok_or_else(|| "video stream has no frame count".to_string())?;
    let fps = [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .find_map(parse_frame_rate)
        .unwrap_or(1.0);

    Ok(VideoInfo {
        total_frames,
        fps,
        width,
        height,
    })
}

/// Parse an ffprobe rational such as `30000/1001`. `0/0` yields `None`.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

/// `select=eq(n\,0)+eq(n\,15)+...`; commas inside the expression are escaped
/// for the filtergraph parser.
fn select_filter(indices: &[usize]) -> String {
    let terms: Vec<String> = indices.iter().map(|i| format!("eq(n\\,{i})")).collect();
    format!("select={}", terms.join("+"))
}

fn split_raw_frames(raw: Vec<u8>, width: u32, height: u32) -> Result<Vec<RgbImage>, String> {
    let frame_len = width as usize * height as usize * 3;
    if frame_len == 0 || raw.len() % frame_len != 0 {
        return Err(format!(
            "raw output of {} bytes is not a whole number of {width}x{height} frames",
            raw.len()
        ));
    }
    raw.chunks_exact(frame_len)
        .map(|chunk| {
            RgbImage::from_raw(width, height, chunk.to_vec())
                .ok_or_else(|| "frame buffer size mismatch".to_string())
        })
        .collect()
}

/// Treats every frame of an animated image, or a single still, as one second
/// of video.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimationDecoder;

impl AnimationDecoder {
    fn decode_all(&self, path: &Path) -> MultiModalResult<Vec<RgbImage>> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let decode_err = |source| MultiModalError::ImageDecode {
            path: path.to_path_buf(),
            source,
        };
        let open = || -> MultiModalResult<BufReader<File>> { Ok(BufReader::new(File::open(path)?)) };

        let frames: Vec<Frame> = match ext.as_str() {
            "gif" => GifDecoder::new(open()?)
                .map_err(decode_err)?
                .into_frames()
                .collect_frames()
                .map_err(decode_err)?,
            "webp" => {
                let decoder = WebPDecoder::new(open()?).map_err(decode_err)?;
                if !decoder.has_animation() {
                    return Ok(vec![load_image(path)?.to_rgb8()]);
                }
                decoder.into_frames().collect_frames().map_err(decode_err)?
            }
            "png" | "apng" => {
                let decoder = PngDecoder::new(open()?).map_err(decode_err)?;
                if !decoder.is_apng().map_err(decode_err)? {
                    return Ok(vec![load_image(path)?.to_rgb8()]);
                }
                decoder
                    .apng()
                    .map_err(decode_err)?
                    .into_frames()
                    .collect_frames()
                    .map_err(decode_err)?
            }
            _ => return Ok(vec![load_image(path)?.to_rgb8()]),
        };

        Ok(frames
            .into_iter()
            .map(|frame| DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8())
            .collect())
    }
}

impl VideoDecoder for AnimationDecoder {
    fn name(&self) -> &'static str {
        "animation"
    }

    fn probe(&self, path: &Path) -> MultiModalResult<VideoInfo> {
        let frames = self.decode_all(path)?;
        let (width, height) = frames
            .first()
            .map(|frame| frame.dimensions())
            .ok_or_else(|| MultiModalError::EmptyVideo(path.to_path_buf()))?;
        Ok(VideoInfo {
            total_frames: frames.len(),
            fps: 1.0,
            width,
            height,
        })
    }

    fn read_frames(
        &self,
        path: &Path,
        _info: &VideoInfo,
        indices: &[usize],
    ) -> MultiModalResult<Vec<RgbImage>> {
        let mut frames: Vec<Option<RgbImage>> = self.decode_all(path)?.into_iter().map(Some).collect();
        indices
            .iter()
            .map(|&i| {
                frames.get_mut(i).and_then(Option::take).ok_or_else(|| {
                    MultiModalError::video_decode(path, format!("frame {i} out of range"))
                })
            })
            .collect()
    }
}

fn decode_sampled(
    decoder: &dyn VideoDecoder,
    path: &Path,
    config: &VisionConfig,
) -> MultiModalResult<Vec<TimedFrame>> {
    let info = decoder.probe(path)?;
    if info.total_frames == 0 {
        return Err(MultiModalError::EmptyVideo(path.to_path_buf()));
    }

    let selection = config.frame_sampler().sample(info.total_frames, info.fps);
    let indices = selection.indices();
    let frames = decoder.read_frames(path, &info, &indices)?;
    let first = frames
        .first()
        .ok_or_else(|| MultiModalError::EmptyVideo(path.to_path_buf()))?;
    if frames.len() != indices.len() {
        return Err(MultiModalError::video_decode(
            path,
            format!(
                "{} decoded {} of {} requested frames",
                decoder.name(),
                frames.len(),
                indices.len()
            ),
        ));
    }

    let solver = config.solver();
    let budget = config.image_budget().with_max(selection.max_pixels);
    let dims = solver.solve(first.height(), first.width(), budget)?;
    let encoder = MediaEncoder::new(solver, config.jpeg_quality);

    let timed = frames
        .into_iter()
        .zip(selection.frames)
        .map(|(frame, sampled)| {
            Ok(TimedFrame {
                image: encoder.encode_to(&DynamicImage::ImageRgb8(frame), dims)?,
                timestamp: sampled.timestamp,
            })
        })
        .collect::<MultiModalResult<Vec<_>>>()?;

    info!(
        path = %path.display(),
        decoder = decoder.name(),
        total_frames = info.total_frames,
        fps = info.fps,
        frames = timed.len(),
        width = dims.width,
        height = dims.height,
        "Sampled video"
    );
    Ok(timed)
}

/// Decode, sample, resize and encode a video.
///
/// `primary` is tried first; if it cannot handle the file, every frame of the
/// file is used as an image at 1 fps and the same budget applies. All frames
/// share the size solved from the first frame.
pub fn load_video(
    path: &Path,
    config: &VisionConfig,
    primary: &dyn VideoDecoder,
) -> MultiModalResult<Vec<TimedFrame>> {
    match decode_sampled(primary, path, config) {
        Ok(frames) => Ok(frames),
        Err(err) if err.is_validation() => Err(err),
        Err(primary_err) => {
            debug!(
                path = %path.display(),
                decoder = primary.name(),
                error = %primary_err,
                "Primary video decoder failed, falling back to per-frame decoding"
            );
            decode_sampled(&AnimationDecoder, path, config).map_err(|fallback_err| {
                MultiModalError::video_decode(
                    path,
                    format!("{primary_err}; fallback: {fallback_err}"),
                )
            })
        }
    }
}
