//! Test-pattern window backend.
//!
//! Reports a fixed set of windows. Each source renders its gradient once and
//! stamps the grab counter into the top row, so consecutive frames differ at
//! the cost of a buffer copy. Used by the test suite and by `capture-agent record --synthetic` to
//! exercise the full pipeline without a display server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use image::{Rgba, RgbaImage};

use super::{FrameSource, NativeWindow, WindowBackend, WindowHandle, WindowInfo};
use crate::video::RawFrame;

/// Deterministic in-memory window backend
#[derive(Debug, Clone)]
pub struct SyntheticWindowBackend {
    windows: Vec<NativeWindow>,
    display: (u32, u32),
    available: bool,
    failing_pids: Vec<u32>,
    drop_every: Option<u64>,
    grab_delay: Duration,
    refuse_open: bool,
    grabs: Arc<AtomicU64>,
}

impl SyntheticWindowBackend {
    /// No windows, 1920x1080 display.
    pub fn new() -> Self {
        Self {
            windows: Vec::new(),
            display: (1920, 1080),
            available: true,
            failing_pids: Vec::new(),
            drop_every: None,
            grab_delay: Duration::ZERO,
            refuse_open: false,
            grabs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// One browser window at the origin with the given size.
    pub fn single(width: u32, height: u32) -> Self {
        Self::new().with_window(NativeWindow {
            id: 1,
            pid: 4242,
            title: "Weekly sync - Google Meet".to_string(),
            app_name: "chrome".to_string(),
            x: 0,
            y: 0,
            width,
            height,
            is_minimized: false,
        })
    }

    pub fn with_window(mut self, window: NativeWindow) -> Self {
        self.windows.push(window);
        self
    }

    pub fn with_display(mut self, width: u32, height: u32) -> Self {
        self.display = (width, height);
        self
    }

    /// Pretend the enumeration API is missing.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Enumeration for `pid` fails as if the process exited mid-pass.
    pub fn failing_process(mut self, pid: u32) -> Self {
        self.failing_pids.push(pid);
        self
    }

    /// Every `n`th grab returns an empty result.
    pub fn drop_every(mut self, n: u64) -> Self {
        self.drop_every = Some(n.max(1));
        self
    }

    /// Each grab blocks for `delay`.
    pub fn grab_delay(mut self, delay: Duration) -> Self {
        self.grab_delay = delay;
        self
    }

    /// `open_source` always fails.
    pub fn refuse_open(mut self) -> Self {
        self.refuse_open = true;
        self
    }

    /// Total grabs performed across all sources.
    pub fn grab_count(&self) -> u64 {
        self.grabs.load(Ordering::Relaxed)
    }

    /// First window as a [`WindowInfo`], for tests.
    pub fn first_window_info(&self) -> Option<WindowInfo> {
        self.windows.first().map(|w| WindowInfo {
            handle: WindowHandle::Native(w.id),
            pid: w.pid,
            title: w.title.clone(),
            app_name: w.app_name.clone(),
            x: w.x,
            y: w.y,
            width: w.width,
            height: w.height,
            is_target_app: true,
        })
    }
}

impl Default for SyntheticWindowBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBackend for SyntheticWindowBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn visible_windows(&self) -> Result<Vec<NativeWindow>> {
        if !self.available {
            bail!("window enumeration unavailable");
        }
        Ok(self
            .windows
            .iter()
            .filter(|w| !w.is_minimized)
            .cloned()
            .collect())
    }

    fn windows_for_process(&self, pid: u32) -> Result<Vec<NativeWindow>> {
        if self.failing_pids.contains(&pid) {
            bail!("process {} exited during enumeration", pid);
        }
        Ok(self
            .visible_windows()?
            .into_iter()
            .filter(|w| w.pid == pid)
            .collect())
    }

    fn primary_display_size(&self) -> (u32, u32) {
        self.display
    }

    fn open_source(&self, window: &WindowInfo) -> Result<Box<dyn FrameSource>> {
        if self.refuse_open {
            bail!("capture handle for {:?} refused", window.handle);
        }

        let (width, height) = match window.handle {
            WindowHandle::PrimaryDisplay => self.display,
            WindowHandle::Native(id) => match self.windows.iter().find(|w| w.id == id) {
                Some(w) => (w.width, w.height),
                None => bail!("window {} not found", id),
            },
        };

        Ok(Box::new(PatternSource {
            base: gradient(width, height),
            drop_every: self.drop_every,
            delay: self.grab_delay,
            grabs: Arc::clone(&self.grabs),
            tick: 0,
        }))
    }
}

struct PatternSource {
    base: RgbaImage,
    drop_every: Option<u64>,
    delay: Duration,
    grabs: Arc<AtomicU64>,
    tick: u64,
}

impl FrameSource for PatternSource {
    fn grab(&mut self) -> Result<Option<RawFrame>> {
        self.tick += 1;
        self.grabs.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        if let Some(n) = self.drop_every {
            if self.tick % n == 0 {
                return Ok(None);
            }
        }

        let mut frame = self.base.clone();
        let stamp = self.tick.to_le_bytes();
        for (x, byte) in stamp.iter().enumerate().take(frame.width() as usize) {
            frame.put_pixel(x as u32, 0, Rgba([*byte, *byte, *byte, 255]));
        }
        Ok(Some(RawFrame::from_rgba(frame)))
    }
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grabs_window_sized_frames() {
        let backend = SyntheticWindowBackend::single(64, 32);
        let info = backend.first_window_info().unwrap();
        let mut source = backend.open_source(&info).unwrap();

        let frame = source.grab().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (64, 32));
        assert!(frame.is_valid());
        assert_eq!(backend.grab_count(), 1);
    }

    #[test]
    fn consecutive_grabs_differ() {
        let backend = SyntheticWindowBackend::single(16, 4);
        let mut source = backend.open_source(&backend.first_window_info().unwrap()).unwrap();
        let a = source.grab().unwrap().unwrap();
        let b = source.grab().unwrap().unwrap();
        assert_ne!(a.data, b.data);
        assert_eq!(a.data[16 * 4..], b.data[16 * 4..]);
    }

    #[test]
    fn drops_every_nth_grab() {
        let backend = SyntheticWindowBackend::single(8, 8).drop_every(2);
        let mut source = backend.open_source(&backend.first_window_info().unwrap()).unwrap();
        assert!(source.grab().unwrap().is_some());
        assert!(source.grab().unwrap().is_none());
        assert!(source.grab().unwrap().is_some());
    }

    #[test]
    fn refusing_backend_fails_to_open() {
        let backend = SyntheticWindowBackend::single(8, 8).refuse_open();
        assert!(backend.open_source(&backend.first_window_info().unwrap()).is_err());
    }

    #[test]
    fn unavailable_backend_reports_error() {
        let backend = SyntheticWindowBackend::single(8, 8).unavailable();
        assert!(!backend.is_available());
        assert!(backend.visible_windows().is_err());
    }
}
