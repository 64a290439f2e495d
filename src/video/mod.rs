/*!
 * Frame Encoding Module
 *
 * Downscales and compresses cropped frames before they are written to the
 * session directory.
 */

pub mod frame;

pub use frame::{PixelFormat, RawFrame};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// On-disk image format for saved frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Lossy, honours the configured quality
    #[default]
    Jpeg,
    /// Lossless, quality is ignored
    Png,
}

impl FrameFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpg",
            FrameFormat::Png => "png",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(FrameFormat::Jpeg),
            "png" => Some(FrameFormat::Png),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "image/jpeg",
            FrameFormat::Png => "image/png",
        }
    }
}

/// Frame optimizer: downscale + compress
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    format: FrameFormat,
    quality: u8,
    max_width: u32,
}

impl FrameEncoder {
    pub fn new(format: FrameFormat, quality: u8, max_width: u32) -> Self {
        Self {
            format,
            // JPEG quality 0 is rejected by the codec
            quality: quality.clamp(1, 100),
            max_width: max_width.max(1),
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Target size after downscaling, preserving aspect ratio.
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.max_width {
            return (width, height);
        }
        let scaled_h = (height as u64 * self.max_width as u64 / width as u64).max(1);
        (self.max_width, scaled_h as u32)
    }

    /// Downscale if wider than the configured maximum.
    pub fn downscale(&self, image: RgbImage) -> RgbImage {
        let (w, h) = image.dimensions();
        let (tw, th) = self.target_size(w, h);
        if (tw, th) == (w, h) {
            return image;
        }
        imageops::resize(&image, tw, th, FilterType::Triangle)
    }

    /// Compress to the configured format.
    pub fn encode(&self, image: &RgbImage) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(image.as_raw().len() / 8);
        match self.format {
            FrameFormat::Jpeg => image
                .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, self.quality))
                .context("JPEG encode failed")?,
            FrameFormat::Png => image
                .write_with_encoder(PngEncoder::new(&mut buf))
                .context("PNG encode failed")?,
        }
        Ok(buf)
    }

    /// Downscale then encode.
    pub fn optimize(&self, image: RgbImage) -> Result<(Vec<u8>, u32, u32)> {
        let image = self.downscale(image);
        let bytes = self.encode(&image)?;
        Ok((bytes, image.width(), image.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn target_size_preserves_aspect_ratio() {
        let enc = FrameEncoder::new(FrameFormat::Jpeg, 80, 1280);
        assert_eq!(enc.target_size(1920, 1080), (1280, 720));
        assert_eq!(enc.target_size(800, 600), (800, 600));
    }

    #[test]
    fn jpeg_output_decodes_to_same_size() {
        let enc = FrameEncoder::new(FrameFormat::Jpeg, 75, 1280);
        let img = RgbImage::from_pixel(64, 48, Rgb([200, 30, 30]));
        let bytes = enc.encode(&img).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn png_output_has_signature() {
        let enc = FrameEncoder::new(FrameFormat::Png, 0, 1280);
        let bytes = enc.encode(&RgbImage::new(8, 8)).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }

    #[test]
    fn optimize_downscales_wide_frames() {
        let enc = FrameEncoder::new(FrameFormat::Jpeg, 80, 320);
        let (_, w, h) = enc.optimize(RgbImage::new(640, 400)).unwrap();
        assert_eq!((w, h), (320, 200));
    }

    #[test]
    fn extension_round_trip() {
        assert_eq!(FrameFormat::from_extension("JPG"), Some(FrameFormat::Jpeg));
        assert_eq!(FrameFormat::from_extension(FrameFormat::Png.extension()), Some(FrameFormat::Png));
        assert_eq!(FrameFormat::from_extension("gif"), None);
    }
}
