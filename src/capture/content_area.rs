//! Content-area heuristic used when no explicit region is configured.
//!
//! Policy: build a Sobel edge mask on a downscaled grayscale copy, group edge
//! pixels into 8-connected components and take the largest component bounding
//! box that covers at least [`MIN_COVERAGE`] of both frame dimensions without
//! spanning (nearly) the whole frame. When nothing qualifies, crop the centred
//! [`FALLBACK_COVERAGE`] of the frame.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use tracing::debug;

use super::region::CaptureRegion;

/// Minimum share of width and height a detected area must cover.
pub const MIN_COVERAGE: f64 = 0.30;
/// Share of width and height kept by the centred fallback crop.
pub const FALLBACK_COVERAGE: f64 = 0.70;

/// Components spanning at least this share of both dimensions are treated as
/// window chrome rather than content.
const FULL_FRAME_COVERAGE: f64 = 0.98;
const ANALYSIS_WIDTH: u32 = 320;
const EDGE_THRESHOLD: u32 = 96;

/// Content rectangle for `frame`: detected, or the centred fallback.
pub fn content_region(frame: &RgbImage) -> Option<CaptureRegion> {
    detect_content_area(frame).or_else(|| centered_fallback(frame.width(), frame.height()))
}

/// Centred crop covering [`FALLBACK_COVERAGE`] of each dimension.
pub fn centered_fallback(width: u32, height: u32) -> Option<CaptureRegion> {
    let cw = ((width as f64) * FALLBACK_COVERAGE).round() as i32;
    let ch = ((height as f64) * FALLBACK_COVERAGE).round() as i32;
    let x = (width as i32 - cw) / 2;
    let y = (height as i32 - ch) / 2;
    CaptureRegion::new(x, y, cw, ch)
}

/// Largest plausible content rectangle, in `frame` coordinates.
pub fn detect_content_area(frame: &RgbImage) -> Option<CaptureRegion> {
    let (fw, fh) = frame.dimensions();
    if fw < 8 || fh < 8 {
        return None;
    }

    let gray = if fw > ANALYSIS_WIDTH {
        let sh = ((fh as u64 * ANALYSIS_WIDTH as u64) / fw as u64).max(1) as u32;
        imageops::grayscale(&imageops::resize(frame, ANALYSIS_WIDTH, sh, FilterType::Triangle))
    } else {
        imageops::grayscale(frame)
    };

    let (sw, sh) = gray.dimensions();
    let mask = edge_mask(&gray);
    let best = largest_plausible_box(&mask, sw, sh)?;

    let fx = fw as f64 / sw as f64;
    let fy = fh as f64 / sh as f64;
    let region = CaptureRegion::new(
        (best.left as f64 * fx).round() as i32,
        (best.top as f64 * fy).round() as i32,
        ((best.right - best.left + 1) as f64 * fx).round() as i32,
        ((best.bottom - best.top + 1) as f64 * fy).round() as i32,
    )?
    .clamp_to(fw, fh)?;

    debug!("Detected content area {:?} in {}x{} frame", region, fw, fh);
    Some(region)
}

#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl BoundingBox {
    fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Sobel magnitude (|gx| + |gy|) thresholded into a boolean mask.
fn edge_mask(gray: &GrayImage) -> Vec<bool> {
    let (w, h) = gray.dimensions();
    let mut mask = vec![false; (w * h) as usize];
    if w < 3 || h < 3 {
        return mask;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as i32;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x - 1, y) + px(x - 1, y + 1));
            let gy = (px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1))
                - (px(x - 1, y - 1) + 2 * px(x, y - 1) + px(x + 1, y - 1));
            if gx.unsigned_abs() + gy.unsigned_abs() > EDGE_THRESHOLD {
                mask[(y * w + x) as usize] = true;
            }
        }
    }
    mask
}

fn largest_plausible_box(mask: &[bool], w: u32, h: u32) -> Option<BoundingBox> {
    let min_w = (w as f64 * MIN_COVERAGE).ceil() as u32;
    let min_h = (h as f64 * MIN_COVERAGE).ceil() as u32;
    let full_w = (w as f64 * FULL_FRAME_COVERAGE).floor() as u32;
    let full_h = (h as f64 * FULL_FRAME_COVERAGE).floor() as u32;

    let mut visited = vec![false; mask.len()];
    let mut stack = Vec::new();
    let mut best: Option<BoundingBox> = None;

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        let sx = start as u32 % w;
        let sy = start as u32 / w;
        let mut bbox = BoundingBox {
            left: sx,
            top: sy,
            right: sx,
            bottom: sy,
        };

        visited[start] = true;
        stack.push(start);
        while let Some(idx) = stack.pop() {
            let x = idx as u32 % w;
            let y = idx as u32 / w;
            bbox.left = bbox.left.min(x);
            bbox.right = bbox.right.max(x);
            bbox.top = bbox.top.min(y);
            bbox.bottom = bbox.bottom.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = (ny * w + nx) as usize;
                    if mask[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        let plausible = bbox.width() >= min_w
            && bbox.height() >= min_h
            && !(bbox.width() >= full_w && bbox.height() >= full_h);
        if plausible && best.map_or(true, |b| bbox.area() > b.area()) {
            best = Some(bbox);
        }
    }

    best
}
