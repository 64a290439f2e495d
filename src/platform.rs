//! Platform detection and backend selection.
//!
//! [`PlatformAdapter`] is built once at startup and handed to the session;
//! nothing below it branches on the operating system again.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::{cpal_input::CpalAudioBackend, AudioBackend};
use crate::capture::{native::NativeWindowBackend, WindowBackend};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub hostname: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// What the current machine can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub window_enumeration: bool,
    pub audio_input: bool,
}

/// Window and audio backends selected for this process.
#[derive(Clone)]
pub struct PlatformAdapter {
    windows: Arc<dyn WindowBackend>,
    audio: Arc<dyn AudioBackend>,
}

impl PlatformAdapter {
    /// Pick the native backends for the running OS.
    pub fn detect() -> Self {
        info!("Detecting capture backends for platform: {}", get_platform_name());
        let adapter = Self::new(
            Arc::new(NativeWindowBackend::new()),
            Arc::new(CpalAudioBackend::new()),
        );

        let caps = adapter.capabilities();
        if !caps.window_enumeration {
            warn!("Window enumeration unavailable, detection falls back to the primary display");
        }
        if !caps.audio_input {
            warn!("No audio input device, sessions will be video-only");
        }
        adapter
    }

    /// Build an adapter from explicit backends.
    pub fn new(windows: Arc<dyn WindowBackend>, audio: Arc<dyn AudioBackend>) -> Self {
        Self { windows, audio }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            window_enumeration: self.windows.is_available(),
            audio_input: self.audio.is_available(),
        }
    }

    pub fn window_backend(&self) -> Arc<dyn WindowBackend> {
        Arc::clone(&self.windows)
    }

    pub fn audio_backend(&self) -> Arc<dyn AudioBackend> {
        Arc::clone(&self.audio)
    }
}

impl std::fmt::Debug for PlatformAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformAdapter")
            .field("windows", &self.windows.name())
            .field("audio", &self.audio.name())
            .finish()
    }
}

/// Get platform name
pub fn get_platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "windows";

    #[cfg(target_os = "macos")]
    return "macos";

    #[cfg(target_os = "linux")]
    return "linux";

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    return "unknown";
}

/// Get system information
pub fn get_system_info() -> Result<SystemInfo> {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let (screen_width, screen_height) = get_primary_display_size()?;

    Ok(SystemInfo {
        os: get_platform_name().to_string(),
        arch: std::env::consts::ARCH.to_string(),
        hostname,
        screen_width,
        screen_height,
    })
}

/// Get primary display size
pub fn get_primary_display_size() -> Result<(u32, u32)> {
    #[cfg(target_os = "windows")]
    {
        windows_display_size()
    }

    #[cfg(target_os = "macos")]
    {
        macos_display_size()
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        monitor_display_size()
    }
}

#[cfg(target_os = "windows")]
fn windows_display_size() -> Result<(u32, u32)> {
    use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

    let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    if width <= 0 || height <= 0 {
        anyhow::bail!("GetSystemMetrics reported {}x{}", width, height);
    }
    Ok((width as u32, height as u32))
}

#[cfg(target_os = "macos")]
fn macos_display_size() -> Result<(u32, u32)> {
    use core_graphics::display::CGDisplay;

    let display = CGDisplay::main();
    Ok((display.pixels_wide() as u32, display.pixels_high() as u32))
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn monitor_display_size() -> Result<(u32, u32)> {
    // X11/Wayland: ask the monitor list, fall back to a common default when
    // no display server is reachable (headless CI).
    match xcap::Monitor::all() {
        Ok(monitors) => {
            let primary = monitors
                .iter()
                .find(|m| m.is_primary())
                .or_else(|| monitors.first());
            match primary {
                Some(m) => Ok((m.width(), m.height())),
                None => {
                    warn!("No monitors reported, using default 1920x1080");
                    Ok((1920, 1080))
                }
            }
        }
        Err(e) => {
            warn!("Could not query monitors ({}), using default 1920x1080", e);
            Ok((1920, 1080))
        }
    }
}
