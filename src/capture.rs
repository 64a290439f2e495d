//! Window capture: discovery, region selection and the frame loop.
//!
//! Platform APIs sit behind [`WindowBackend`]; everything else in this
//! module works on plain [`WindowInfo`] values and [`RawFrame`] bitmaps.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::video::RawFrame;

pub mod content_area;
pub mod detector;
pub mod native;
pub mod region;
pub mod synthetic;
pub mod worker;

pub use detector::WindowDetector;
pub use region::{CaptureRegion, CaptureRegionSelector, PreviewRect};
pub use worker::{FrameCaptureWorker, FrameWorkerConfig, WorkerState};

/// Identifies what a [`FrameSource`] should grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowHandle {
    /// Backend-specific window id (HWND, CGWindowID, X11 window)
    Native(u32),
    /// Whole primary display; used when windows cannot be enumerated
    PrimaryDisplay,
}

/// A window as reported by a backend, before target-app filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeWindow {
    pub id: u32,
    pub pid: u32,
    pub title: String,
    pub app_name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_minimized: bool,
}

/// A capturable window, snapshotted at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub pid: u32,
    pub title: String,
    pub app_name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Title matched one of the configured keywords
    pub is_target_app: bool,
}

impl WindowInfo {
    /// Synthetic window spanning the primary display.
    pub fn primary_display(width: u32, height: u32) -> Self {
        Self {
            handle: WindowHandle::PrimaryDisplay,
            pid: std::process::id(),
            title: "Primary Display".to_string(),
            app_name: String::new(),
            x: 0,
            y: 0,
            width,
            height,
            is_target_app: false,
        }
    }
}

/// Native window enumeration and grabbing for one platform.
pub trait WindowBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the native enumeration API can be used at all.
    fn is_available(&self) -> bool;

    /// All visible, non-minimized windows.
    fn visible_windows(&self) -> Result<Vec<NativeWindow>>;

    /// Visible windows owned by one process.
    fn windows_for_process(&self, pid: u32) -> Result<Vec<NativeWindow>> {
        Ok(self
            .visible_windows()?
            .into_iter()
            .filter(|w| w.pid == pid)
            .collect())
    }

    /// Size of the primary display in pixels.
    fn primary_display_size(&self) -> (u32, u32);

    /// Acquire a grab handle for `window`.
    ///
    /// Called on the capture thread; the returned source never leaves it.
    fn open_source(&self, window: &WindowInfo) -> Result<Box<dyn FrameSource>>;
}

/// Produces bitmaps of one window at its current bounds.
pub trait FrameSource {
    /// `Ok(None)` means the grab produced nothing usable this tick.
    fn grab(&mut self) -> Result<Option<RawFrame>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_display_window_is_not_target() {
        let w = WindowInfo::primary_display(1920, 1080);
        assert_eq!(w.handle, WindowHandle::PrimaryDisplay);
        assert_eq!((w.x, w.y, w.width, w.height), (0, 0, 1920, 1080));
        assert!(!w.is_target_app);
    }
}
