/*!
 * Raw Frame Representation
 *
 * Bitmaps as delivered by a window backend, before cropping and encoding.
 */

use image::{DynamicImage, RgbImage, RgbaImage};

/// Pixel format for raw frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// BGRA 8-bit per channel (GDI, CoreGraphics)
    BGRA,
    /// RGBA 8-bit per channel
    RGBA,
    /// RGB 24-bit
    RGB24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::BGRA | PixelFormat::RGBA => 4,
            PixelFormat::RGB24 => 3,
        }
    }
}

/// Uncompressed bitmap grabbed from a window, rows tightly packed.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Wrap an RGBA bitmap as delivered by xcap.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, PixelFormat::RGBA)
    }

    pub fn expected_size(&self) -> usize {
        (self.width as usize) * (self.height as usize) * self.format.bytes_per_pixel()
    }

    /// Non-empty and exactly as long as the dimensions require.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_size()
    }

    /// Convert to a 3-channel image, discarding alpha.
    ///
    /// Returns `None` for empty or truncated bitmaps.
    pub fn into_rgb(self) -> Option<RgbImage> {
        if !self.is_valid() {
            return None;
        }

        match self.format {
            PixelFormat::RGB24 => RgbImage::from_raw(self.width, self.height, self.data),
            PixelFormat::RGBA => RgbaImage::from_raw(self.width, self.height, self.data)
                .map(|rgba| DynamicImage::ImageRgba8(rgba).into_rgb8()),
            PixelFormat::BGRA => {
                let data = self
                    .data
                    .chunks_exact(4)
                    .flat_map(|px| [px[2], px[1], px[0]])
                    .collect();
                RgbImage::from_raw(self.width, self.height, data)
            }
        }
    }
}
