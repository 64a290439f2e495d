//! Agent configuration.
//!
//! Loaded from a JSON file in the platform config directory:
//! - Linux: `~/.config/capture-agent/config.json`
//! - macOS: `~/Library/Application Support/capture-agent/config.json`
//! - Windows: `%APPDATA%\capture-agent\config.json`
//!
//! A missing file yields defaults; a malformed or out-of-range file is an error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::AudioConfig;
use crate::capture::region::CaptureRegion;
use crate::validation;
use crate::video::FrameFormat;

const APP_DIR: &str = "capture-agent";
const CONFIG_FILE: &str = "config.json";

/// Frame capture settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Target cadence; a soft target, not a guarantee.
    pub fps: u32,
    /// Encoder quality, 0-100 (JPEG only).
    pub image_quality: u8,
    pub image_format: FrameFormat,
    /// Frames wider than this are downscaled, preserving aspect ratio.
    pub max_frame_width: u32,
    /// Crop rectangle `[x, y, width, height]` in raw-frame coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_region: Option<[i32; 4]>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: 15,
            image_quality: 80,
            image_format: FrameFormat::Jpeg,
            max_frame_width: 1280,
            crop_region: None,
        }
    }
}

impl CaptureSettings {
    /// Configured crop as a region, if one is set and has positive area.
    pub fn crop(&self) -> Option<CaptureRegion> {
        self.crop_region
            .and_then(|[x, y, w, h]| CaptureRegion::new(x, y, w, h))
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_fps(self.fps)?;
        validation::validate_quality(self.image_quality)?;
        validation::validate_max_width(self.max_frame_width)?;
        if let Some([x, y, w, h]) = self.crop_region {
            validation::validate_crop(x, y, w, h)?;
        }
        Ok(())
    }
}

/// Which windows count as the target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Case-insensitive substrings matched against window titles.
    pub title_keywords: Vec<String>,
    /// Executable names of host applications whose windows are enumerated.
    pub host_processes: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            title_keywords: ["meet", "zoom", "teams", "webex"]
                .into_iter()
                .map(String::from)
                .collect(),
            host_processes: [
                "chrome", "chromium", "firefox", "msedge", "safari", "brave", "opera", "vivaldi",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        validation::validate_keywords(&self.title_keywords)
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub capture: CaptureSettings,
    pub detection: DetectionConfig,
    pub audio: AudioConfig,
    /// Root for session and processed directories. Defaults to the platform
    /// data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Path of the config file in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` (or the default location); defaults when absent.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        self.detection.validate()?;
        self.audio.validate()?;
        Ok(())
    }

    /// Directory under which sessions are written.
    pub fn output_root(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("captures"))
        })
    }
}
