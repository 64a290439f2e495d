//! Input validation for capture settings and hand-off file names.
//!
//! Provides range checks with descriptive error messages suitable for
//! exposing to the UI/backend that drives the control surface.

use anyhow::{bail, Result};

/// Lowest accepted capture frame rate.
pub const MIN_FPS: u32 = 1;
/// Highest accepted capture frame rate.
pub const MAX_FPS: u32 = 60;
/// Smallest accepted maximum frame width.
pub const MIN_FRAME_WIDTH: u32 = 16;

/// Ensures the frame rate lies within the supported cadence range.
pub fn validate_fps(fps: u32) -> Result<()> {
    if !(MIN_FPS..=MAX_FPS).contains(&fps) {
        bail!("Frame rate {} is out of range ({}-{})", fps, MIN_FPS, MAX_FPS);
    }
    Ok(())
}

/// Ensures image quality is a percentage.
pub fn validate_quality(quality: u8) -> Result<()> {
    if quality > 100 {
        bail!("Image quality {} is out of range (0-100)", quality);
    }
    Ok(())
}

/// Ensures the downscale target width is usable.
pub fn validate_max_width(width: u32) -> Result<()> {
    if width < MIN_FRAME_WIDTH {
        bail!(
            "Maximum frame width {} is too small (min: {})",
            width,
            MIN_FRAME_WIDTH
        );
    }
    Ok(())
}

/// Ensures a crop rectangle given as four integers has a positive area.
pub fn validate_crop(x: i32, y: i32, width: i32, height: i32) -> Result<()> {
    if width <= 0 || height <= 0 {
        bail!(
            "Crop region {}x{} at ({}, {}) must have positive width and height",
            width,
            height,
            x,
            y
        );
    }
    Ok(())
}

/// Ensures the window title keyword set is usable for matching.
pub fn validate_keywords(keywords: &[String]) -> Result<()> {
    if keywords.is_empty() {
        bail!("At least one window title keyword is required");
    }
    if let Some(blank) = keywords.iter().find(|k| k.trim().is_empty()) {
        bail!("Window title keyword {:?} is blank", blank);
    }
    Ok(())
}

/// Ensures the requested audio format can be written as 16-bit PCM WAV.
pub fn validate_audio_format(sample_rate: u32, channels: u16) -> Result<()> {
    if !(8_000..=192_000).contains(&sample_rate) {
        bail!("Sample rate {} is out of range (8000-192000)", sample_rate);
    }
    if !(1..=2).contains(&channels) {
        bail!("Channel count {} is unsupported (1 or 2)", channels);
    }
    Ok(())
}

/// Validates a file name supplied by an external uploader.
///
/// Only plain names are accepted; anything that could escape the session
/// directory is rejected.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("File name cannot be empty");
    }
    if name.len() > 255 {
        bail!("File name is too long: {} characters (max: 255)", name.len());
    }
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        bail!("File name contains invalid path characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_fps_bounds() {
        assert!(validate_fps(1).is_ok());
        assert!(validate_fps(60).is_ok());
        assert!(validate_fps(0).is_err());
        assert!(validate_fps(61).is_err());
    }

    #[test]
    fn rejects_quality_above_hundred() {
        assert!(validate_quality(0).is_ok());
        assert!(validate_quality(100).is_ok());
        assert!(validate_quality(101).is_err());
    }

    #[test]
    fn rejects_tiny_frame_width() {
        assert!(validate_max_width(1280).is_ok());
        assert!(validate_max_width(8).is_err());
    }

    #[test]
    fn rejects_degenerate_crop() {
        assert!(validate_crop(0, 0, 10, 10).is_ok());
        assert!(validate_crop(-5, -5, 10, 10).is_ok());
        assert!(validate_crop(0, 0, 0, 10).is_err());
        assert!(validate_crop(0, 0, 10, -1).is_err());
    }

    #[test]
    fn validates_keywords() {
        assert!(validate_keywords(&["meet".to_string()]).is_ok());
        assert!(validate_keywords(&[]).is_err());
        assert!(validate_keywords(&["meet".to_string(), "  ".to_string()]).is_err());
    }

    #[test]
    fn validates_audio_format() {
        assert!(validate_audio_format(44_100, 2).is_ok());
        assert!(validate_audio_format(16_000, 1).is_ok());
        assert!(validate_audio_format(100, 1).is_err());
        assert!(validate_audio_format(48_000, 6).is_err());
    }

    #[test]
    fn validates_file_names() {
        assert!(validate_file_name("slides.pdf").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("a/b.png").is_err());
        assert!(validate_file_name("a\\b.png").is_err());
    }
}
