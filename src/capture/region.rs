//! Capture regions and preview-to-raw coordinate mapping.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rectangle in raw-frame pixel coordinates.
///
/// Width and height are always positive. The origin may lie outside a given
/// frame; use [`CaptureRegion::clamp_to`] before slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct CaptureRegion {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl CaptureRegion {
    /// `None` unless width and height are positive.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Whole-frame region.
    pub fn full(width: u32, height: u32) -> Option<Self> {
        Self::new(0, 0, to_i32(width), to_i32(height))
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Intersect with a `frame_width` x `frame_height` frame.
    ///
    /// `None` when nothing of the region lies inside the frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Self> {
        let fw = to_i64(frame_width);
        let fh = to_i64(frame_height);

        let left = (self.x as i64).clamp(0, fw);
        let top = (self.y as i64).clamp(0, fh);
        let right = (self.x as i64 + self.width as i64).clamp(0, fw);
        let bottom = (self.y as i64 + self.height as i64).clamp(0, fh);

        Self::new(
            left as i32,
            top as i32,
            (right - left) as i32,
            (bottom - top) as i32,
        )
    }

    /// True when the region lies entirely inside the frame.
    pub fn fits(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= to_i64(frame_width)
            && self.y as i64 + self.height as i64 <= to_i64(frame_height)
    }

    /// `(x, y, width, height)` as unsigned values; only meaningful after
    /// clamping.
    pub fn as_crop(&self) -> (u32, u32, u32, u32) {
        (
            self.x.max(0) as u32,
            self.y.max(0) as u32,
            self.width as u32,
            self.height as u32,
        )
    }
}

impl TryFrom<[i32; 4]> for CaptureRegion {
    type Error = String;

    fn try_from([x, y, w, h]: [i32; 4]) -> Result<Self, Self::Error> {
        Self::new(x, y, w, h)
            .ok_or_else(|| format!("region {}x{} at ({}, {}) has no area", w, h, x, y))
    }
}

impl From<CaptureRegion> for [i32; 4] {
    fn from(r: CaptureRegion) -> Self {
        [r.x, r.y, r.width, r.height]
    }
}

fn to_i32(v: u32) -> i32 {
    v.min(i32::MAX as u32) as i32
}

fn to_i64(v: u32) -> i64 {
    v as i64
}

/// Rectangle drawn by the user on a (possibly downscaled) preview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreviewRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PreviewRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle from a drag gesture, in whichever direction it was drawn.
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }
}

/// Maps selections on a preview back into raw-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRegionSelector {
    raw_width: u32,
    raw_height: u32,
    scale: f64,
}

impl CaptureRegionSelector {
    /// Selector for a preview rendered at `scale` times the raw frame size.
    ///
    /// `None` for a non-finite or non-positive scale.
    pub fn new(raw_width: u32, raw_height: u32, scale: f64) -> Option<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return None;
        }
        Some(Self {
            raw_width,
            raw_height,
            scale,
        })
    }

    /// Selector whose preview fits within `max_width` x `max_height`.
    pub fn for_preview(raw_width: u32, raw_height: u32, max_width: u32, max_height: u32) -> Self {
        Self {
            raw_width,
            raw_height,
            scale: preview_scale(raw_width, raw_height, max_width, max_height),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Preview dimensions implied by the scale.
    pub fn preview_size(&self) -> (u32, u32) {
        (
            ((self.raw_width as f64) * self.scale).round().max(1.0) as u32,
            ((self.raw_height as f64) * self.scale).round().max(1.0) as u32,
        )
    }

    /// Convert a preview rectangle into a raw-frame region.
    ///
    /// Returns `None` ("no selection") for rectangles without area, either as
    /// drawn or after mapping, or lying entirely outside the frame.
    pub fn select(&self, rect: PreviewRect) -> Option<CaptureRegion> {
        if !(rect.width > 0.0 && rect.height > 0.0) {
            debug!("Rejecting empty selection {:?}", rect);
            return None;
        }

        let x = (rect.x / self.scale).round() as i32;
        let y = (rect.y / self.scale).round() as i32;
        let w = (rect.width / self.scale).round() as i32;
        let h = (rect.height / self.scale).round() as i32;

        let region = CaptureRegion::new(x, y, w, h)?.clamp_to(self.raw_width, self.raw_height)?;
        debug!(
            "Selection {:?} at scale {:.3} -> raw region {:?}",
            rect, self.scale, region
        );
        Some(region)
    }
}

/// Scale factor (<= 1.0) that fits a frame inside the preview bounds.
pub fn preview_scale(frame_width: u32, frame_height: u32, max_width: u32, max_height: u32) -> f64 {
    if frame_width == 0 || frame_height == 0 {
        return 1.0;
    }
    let sx = max_width as f64 / frame_width as f64;
    let sy = max_height as f64 / frame_height as f64;
    let scale = sx.min(sy).min(1.0);
    if scale > 0.0 {
        scale
    } else {
        1.0
    }
}
