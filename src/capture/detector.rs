//! Target window discovery.
//!
//! Walks the process table for known host applications (browsers by
//! default), asks the window backend for each one's visible windows, and
//! flags those whose title mentions a configured keyword.

use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::System;
use tracing::{debug, info, warn};

use super::{NativeWindow, WindowBackend, WindowHandle, WindowInfo};
use crate::config::DetectionConfig;

/// A running process as seen by the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

/// Source of the current process table.
pub trait ProcessLister: Send + Sync {
    fn processes(&self) -> Vec<ProcessEntry>;
}

/// Process table read through sysinfo.
pub struct SystemProcesses {
    system: Mutex<System>,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcesses {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLister for SystemProcesses {
    fn processes(&self) -> Vec<ProcessEntry> {
        let mut system = self.system.lock();
        system.refresh_processes();
        system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                name: process.name().to_string(),
            })
            .collect()
    }
}

/// Fixed process list, for tests and replay.
#[derive(Debug, Clone, Default)]
pub struct StaticProcesses(pub Vec<ProcessEntry>);

impl ProcessLister for StaticProcesses {
    fn processes(&self) -> Vec<ProcessEntry> {
        self.0.clone()
    }
}

/// Finds windows belonging to the target application.
pub struct WindowDetector {
    backend: Arc<dyn WindowBackend>,
    processes: Arc<dyn ProcessLister>,
    keywords: Vec<String>,
    host_processes: Vec<String>,
}

impl WindowDetector {
    /// Detector reading the live process table.
    pub fn new(backend: Arc<dyn WindowBackend>, config: &DetectionConfig) -> Self {
        Self::with_processes(backend, Arc::new(SystemProcesses::new()), config)
    }

    pub fn with_processes(
        backend: Arc<dyn WindowBackend>,
        processes: Arc<dyn ProcessLister>,
        config: &DetectionConfig,
    ) -> Self {
        Self {
            backend,
            processes,
            keywords: config.title_keywords.iter().map(|k| k.to_lowercase()).collect(),
            host_processes: config
                .host_processes
                .iter()
                .map(|p| normalize_process_name(p))
                .collect(),
        }
    }

    /// True when `title` contains any keyword, ignoring case.
    pub fn is_target_title(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.keywords.iter().any(|k| title.contains(k.as_str()))
    }

    fn is_host_process(&self, name: &str) -> bool {
        let name = normalize_process_name(name);
        self.host_processes.iter().any(|h| name.contains(h.as_str()))
    }

    /// Windows of host-application processes, in enumeration order.
    ///
    /// Without a usable enumeration API this returns a single synthetic window
    /// spanning the primary display.
    pub fn find_target_windows(&self) -> Vec<WindowInfo> {
        if !self.backend.is_available() {
            return vec![self.display_fallback()];
        }

        let hosts: Vec<ProcessEntry> = self
            .processes
            .processes()
            .into_iter()
            .filter(|p| self.is_host_process(&p.name))
            .collect();
        debug!("{} host processes match {:?}", hosts.len(), self.host_processes);

        let mut found = Vec::new();
        for process in &hosts {
            match self.backend.windows_for_process(process.pid) {
                Ok(windows) => {
                    found.extend(windows.into_iter().map(|w| self.to_info(w)));
                }
                Err(e) => {
                    debug!(
                        "Skipping process {} ({}): {}",
                        process.pid, process.name, e
                    );
                }
            }
        }

        info!(
            "Found {} windows ({} target) across {} host processes",
            found.len(),
            found.iter().filter(|w| w.is_target_app).count(),
            hosts.len()
        );
        found
    }

    /// Every visible window, ignoring the host-process filter.
    pub fn find_all_windows(&self) -> Vec<WindowInfo> {
        if !self.backend.is_available() {
            return vec![self.display_fallback()];
        }
        match self.backend.visible_windows() {
            Ok(windows) => windows.into_iter().map(|w| self.to_info(w)).collect(),
            Err(e) => {
                warn!("Window enumeration failed: {}", e);
                vec![self.display_fallback()]
            }
        }
    }

    fn to_info(&self, w: NativeWindow) -> WindowInfo {
        let is_target_app = self.is_target_title(&w.title);
        WindowInfo {
            handle: WindowHandle::Native(w.id),
            pid: w.pid,
            title: w.title,
            app_name: w.app_name,
            x: w.x,
            y: w.y,
            width: w.width,
            height: w.height,
            is_target_app,
        }
    }

    fn display_fallback(&self) -> WindowInfo {
        let (width, height) = self.backend.primary_display_size();
        warn!(
            "Window enumeration unavailable, offering primary display {}x{}",
            width, height
        );
        WindowInfo::primary_display(width, height)
    }
}

/// Sort windows by title for stable presentation.
pub fn sort_by_title(windows: &mut [WindowInfo]) {
    windows.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
}

fn normalize_process_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower
        .strip_suffix(".exe")
        .map(str::to_string)
        .unwrap_or(lower)
}
