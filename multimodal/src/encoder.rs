//! Image loading, budgeted resampling and JPEG/base64 encoding.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageError, ImageReader,
};
use tracing::debug;

use crate::{
    error::{MultiModalError, MultiModalResult},
    resize::{PixelBudget, ResizedDims, ResolutionSolver},
    types::EncodedImage,
};

/// Decode an image file, guessing the format from its contents.
pub fn load_image(path: &Path) -> MultiModalResult<DynamicImage> {
    let decode_err = |source| MultiModalError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|e| decode_err(ImageError::IoError(e)))?
        .decode()
        .map_err(decode_err)
}

/// Resizes images into a pixel budget and encodes them as base64 JPEG.
#[derive(Debug, Clone, Copy)]
pub struct MediaEncoder {
    pub solver: ResolutionSolver,
    pub quality: u8,
}

impl MediaEncoder {
    pub fn new(solver: ResolutionSolver, quality: u8) -> Self {
        Self { solver, quality }
    }

    /// Solve the target size for `image` under `budget`, resample and encode.
    pub fn encode(&self, image: &DynamicImage, budget: PixelBudget) -> MultiModalResult<EncodedImage> {
        let dims = self.solver.solve(image.height(), image.width(), budget)?;
        self.encode_to(image, dims)
    }

    /// Resample to exactly `dims` and encode.
    pub fn encode_to(&self, image: &DynamicImage, dims: ResizedDims) -> MultiModalResult<EncodedImage> {
        let resized = if image.width() == dims.width && image.height() == dims.height {
            image.to_rgb8()
        } else {
            image::imageops::resize(
                &image.to_rgb8(),
                dims.width,
                dims.height,
                FilterType::CatmullRom,
            )
        };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&resized)
            .map_err(MultiModalError::ImageEncode)?;

        debug!(
            src_width = image.width(),
            src_height = image.height(),
            width = dims.width,
            height = dims.height,
            bytes = jpeg.len(),
            "Encoded image"
        );

        Ok(EncodedImage {
            data: STANDARD.encode(&jpeg),
            width: dims.width,
            height: dims.height,
        })
    }

    /// Load `path` and encode it under `budget`.
    pub fn encode_file(&self, path: &Path, budget: PixelBudget) -> MultiModalResult<EncodedImage> {
        let image = load_image(path)?;
        self.encode(&image, budget)
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    fn decode(encoded: &EncodedImage) -> DynamicImage {
        let bytes = STANDARD.decode(&encoded.data).unwrap();
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn encoded_jpeg_has_solved_dimensions() {
        let encoder = MediaEncoder::new(ResolutionSolver::default(), 75);
        let budget = PixelBudget::new(3136, 5120 * 784).unwrap();
        let encoded = encoder.encode(&gradient(300, 200), budget).unwrap();

        // 200 -> 196 and 300 -> 308 after rounding to 28.
        assert_eq!((encoded.width, encoded.height), (308, 196));
        let decoded = decode(&encoded);
        assert_eq!((decoded.width(), decoded.height()), (308, 196));
    }

    #[test]
    fn downscales_into_ceiling() {
        let encoder = MediaEncoder::new(ResolutionSolver::default(), 75);
        let budget = PixelBudget::new(3136, 128 * 784).unwrap();
        let encoded = encoder.encode(&gradient(1280, 720), budget).unwrap();
        assert!(u64::from(encoded.width) * u64::from(encoded.height) <= 128 * 784);
        assert_eq!(encoded.width % 28, 0);
        assert_eq!(encoded.height % 28, 0);
    }

    #[test]
    fn rejects_extreme_aspect_ratio() {
        let encoder = MediaEncoder::new(ResolutionSolver::default(), 75);
        let budget = PixelBudget::new(3136, 5120 * 784).unwrap();
        let err = encoder.encode(&gradient(1005, 5), budget).unwrap_err();
        assert!(matches!(err, MultiModalError::AspectRatioTooLarge { .. }));
    }

    #[test]
    fn load_image_reports_path_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = load_image(&path).unwrap_err();
        assert!(err.to_string().contains("broken.png"), "{err}");
    }

    #[test]
    fn load_image_reports_path_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.jpg");
        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, MultiModalError::ImageDecode { .. }), "{err:?}");
        assert!(err.to_string().contains("gone.jpg"), "{err}");
    }
}
