//! Downscale and recompress images to JPEG.

use std::io::Cursor;
use std::time::Instant;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, GenericImageView};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Target size and encoder quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeOptions {
    /// Longest edge of the output, in pixels. Smaller images are not upscaled.
    pub max_edge: u32,
    /// JPEG quality in `(0, 1]`.
    pub quality: f32,
}

impl OptimizeOptions {
    /// Regular recompression.
    pub const STANDARD: Self = Self {
        max_edge: 2560,
        quality: 0.82,
    };

    /// Used once the album is over its storage budget.
    pub const OVER_BUDGET: Self = Self {
        max_edge: 2560,
        quality: 0.80,
    };

    pub const THUMBNAIL: Self = Self {
        max_edge: 640,
        quality: 0.72,
    };

    fn jpeg_quality(&self) -> u8 {
        (self.quality.clamp(0.01, 1.0) * 100.0).round() as u8
    }
}

/// Encoded output of the optimizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: String,
}

impl OptimizedImage {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Image optimizer used by the ingestion pipeline.
#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    /// Downscale/recompress `bytes`. `Ok(None)` means the result would not be
    /// smaller than the input.
    async fn optimize(
        &self,
        bytes: &[u8],
        options: OptimizeOptions,
    ) -> MediaResult<Option<OptimizedImage>>;

    /// Small JPEG preview.
    async fn thumbnail(&self, bytes: &[u8]) -> MediaResult<OptimizedImage>;

    /// Pixel dimensions read from the header, without a full decode.
    fn dimensions(&self, bytes: &[u8]) -> Option<(u32, u32)>;
}

/// [`ImageOptimizer`] backed by the `image` crate. Work runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegOptimizer;

impl JpegOptimizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ImageOptimizer for JpegOptimizer {
    async fn optimize(
        &self,
        bytes: &[u8],
        options: OptimizeOptions,
    ) -> MediaResult<Option<OptimizedImage>> {
        let input = bytes.to_vec();
        let original_size = input.len();
        let start = Instant::now();

        let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&input, options))
            .await
            .map_err(|e| MediaError::Internal(e.to_string()))??;

        metrics::histogram!("momentos_optimizer_seconds").record(start.elapsed().as_secs_f64());

        if encoded.bytes.len() >= original_size {
            debug!(
                original_size,
                encoded_size = encoded.bytes.len(),
                "Recompression did not shrink image"
            );
            return Ok(None);
        }

        debug!(
            original_size,
            encoded_size = encoded.bytes.len(),
            width = encoded.width,
            height = encoded.height,
            "Image optimized"
        );
        Ok(Some(encoded))
    }

    async fn thumbnail(&self, bytes: &[u8]) -> MediaResult<OptimizedImage> {
        let input = bytes.to_vec();
        tokio::task::spawn_blocking(move || encode_jpeg(&input, OptimizeOptions::THUMBNAIL))
            .await
            .map_err(|e| MediaError::Internal(e.to_string()))?
    }

    fn dimensions(&self, bytes: &[u8]) -> Option<(u32, u32)> {
        image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }
}

fn encode_jpeg(bytes: &[u8], options: OptimizeOptions) -> MediaResult<OptimizedImage> {
    let img = image::load_from_memory(bytes)?;
    let (w, h) = img.dimensions();

    let img = if w.max(h) > options.max_edge {
        img.resize(options.max_edge, options.max_edge, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, options.jpeg_quality())
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)?;

    Ok(OptimizedImage {
        bytes: out,
        width,
        height,
        content_type: "image/jpeg".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_jpeg_quality_mapping() {
        assert_eq!(OptimizeOptions::STANDARD.jpeg_quality(), 82);
        assert_eq!(OptimizeOptions::OVER_BUDGET.jpeg_quality(), 80);
        assert_eq!(OptimizeOptions::THUMBNAIL.jpeg_quality(), 72);
    }

    #[tokio::test]
    async fn test_optimize_downscales_long_edge() {
        let input = png(2600, 120);
        let out = JpegOptimizer::new()
            .optimize(&input, OptimizeOptions::STANDARD)
            .await
            .unwrap()
            .expect("png should shrink as jpeg");

        assert_eq!(out.width, 2560);
        assert!(out.height < 120);
        assert_eq!(out.content_type, "image/jpeg");
        assert!(out.size() < input.len() as u64);
    }

    #[tokio::test]
    async fn test_thumbnail_and_dimensions() {
        let input = png(1280, 720);
        let optimizer = JpegOptimizer::new();
        assert_eq!(optimizer.dimensions(&input), Some((1280, 720)));

        let thumb = optimizer.thumbnail(&input).await.unwrap();
        assert_eq!((thumb.width, thumb.height), (640, 360));
    }

    #[tokio::test]
    async fn test_non_image_is_an_error() {
        let optimizer = JpegOptimizer::new();
        assert!(optimizer
            .optimize(b"definitely not an image", OptimizeOptions::STANDARD)
            .await
            .is_err());
        assert_eq!(optimizer.dimensions(b"nope"), None);
    }
}
