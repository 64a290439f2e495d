/*!
 * Capture Session
 *
 * Orchestrates one window + region selection and the two capture workers:
 *
 *   Idle --start_capture--> Capturing --stop_capture--> Stopped --hand-off--> Idle
 *
 * The session is owned by the caller; collaborators (platform backends and
 * the file store) are injected. Status can be read from other threads through
 * a [`StatusHandle`] while the owning thread drives the state machine.
 */

pub mod events;
pub mod store;

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audio::{AudioCaptureWorker, AudioConfig};
use crate::capture::content_area;
use crate::capture::{CaptureRegion, FrameCaptureWorker, FrameWorkerConfig, WindowInfo};
use crate::config::{AgentConfig, CaptureSettings};
use crate::error::{CaptureError, CaptureResult};
use crate::metrics::CaptureCounters;
use crate::platform::PlatformAdapter;
use crate::validation;
use crate::video::FrameEncoder;

pub use events::{ErrorKind, EventBus, EventSink, SessionEvent};
pub use store::{FileRecord, FrameRecord, ProcessingReport, ProcessingStatus, SessionFileStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Capturing,
    Stopped,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub is_capturing: bool,
    pub frame_count: u64,
    pub frames_dropped: u64,
    pub selected_window_title: Option<String>,
    pub audio_available: bool,
    pub session_id: Option<String>,
}

#[derive(Debug)]
struct LiveStatus {
    state: SessionState,
    counters: CaptureCounters,
    selected_window_title: Option<String>,
    audio_available: bool,
    session_id: Option<String>,
}

/// Cloneable, thread-safe reader for a session's status.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    live: Arc<RwLock<LiveStatus>>,
}

impl StatusHandle {
    pub fn get(&self) -> SessionStatus {
        let live = self.live.read();
        SessionStatus {
            state: live.state,
            is_capturing: live.state == SessionState::Capturing,
            frame_count: live.counters.frames_saved(),
            frames_dropped: live.counters.frames_dropped(),
            selected_window_title: live.selected_window_title.clone(),
            audio_available: live.audio_available,
            session_id: live.session_id.clone(),
        }
    }
}

struct ActiveRun {
    session_id: String,
    frames: FrameCaptureWorker,
    audio: AudioCaptureWorker,
    // Held for the whole Capturing period
    lease: store::CaptureLease,
    started: Instant,
}

pub struct CaptureSession {
    platform: PlatformAdapter,
    store: Arc<SessionFileStore>,
    capture: CaptureSettings,
    audio: AudioConfig,
    window: Option<WindowInfo>,
    region: Option<CaptureRegion>,
    live: Arc<RwLock<LiveStatus>>,
    bus: EventBus,
    run: Option<ActiveRun>,
    last_report: Option<ProcessingReport>,
}

impl CaptureSession {
    pub fn new(platform: PlatformAdapter, store: Arc<SessionFileStore>, config: &AgentConfig) -> Self {
        let audio_available = config.audio.enabled && platform.audio_backend().is_available();
        let live = LiveStatus {
            state: SessionState::Idle,
            counters: CaptureCounters::new(),
            selected_window_title: None,
            audio_available,
            session_id: None,
        };
        Self {
            platform,
            store,
            capture: config.capture.clone(),
            audio: config.audio.clone(),
            window: None,
            region: config.capture.crop(),
            live: Arc::new(RwLock::new(live)),
            bus: EventBus::new(),
            run: None,
            last_report: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.live.read().state
    }

    fn require_idle(&self) -> CaptureResult<()> {
        match self.state() {
            SessionState::Idle => Ok(()),
            other => Err(CaptureError::InvalidState(other)),
        }
    }

    pub fn selected_window(&self) -> Option<&WindowInfo> {
        self.window.as_ref()
    }

    pub fn region(&self) -> Option<CaptureRegion> {
        self.region
    }

    pub fn select_window(&mut self, window: WindowInfo) -> CaptureResult<()> {
        self.require_idle()?;
        info!(
            "Selected window {:?} ({}x{}, pid {})",
            window.title, window.width, window.height, window.pid
        );
        self.live.write().selected_window_title = Some(window.title.clone());
        self.window = Some(window);
        Ok(())
    }

    /// Set the capture region, clamped to the selected window when known.
    pub fn set_region(&mut self, region: CaptureRegion) -> CaptureResult<()> {
        self.require_idle()?;
        let region = match &self.window {
            Some(w) if w.width > 0 && w.height > 0 => region.clamp_to(w.width, w.height).ok_or_else(|| {
                CaptureError::InvalidRegion(format!(
                    "{:?} lies outside the {}x{} window",
                    region, w.width, w.height
                ))
            })?,
            _ => region,
        };
        debug!("Capture region set to {:?}", region);
        self.region = Some(region);
        Ok(())
    }

    /// [`Self::set_region`] from raw integers; rejects empty rectangles.
    pub fn set_region_rect(&mut self, x: i32, y: i32, width: i32, height: i32) -> CaptureResult<()> {
        self.require_idle()?;
        let region = CaptureRegion::new(x, y, width, height).ok_or_else(|| {
            CaptureError::InvalidRegion(format!("{}x{} has no area", width, height))
        })?;
        self.set_region(region)
    }

    /// Grab one frame of the selected window and run the content-area
    /// heuristic on it.
    pub fn suggest_region(&self) -> CaptureResult<CaptureRegion> {
        self.require_idle()?;
        let window = self.window.as_ref().ok_or(CaptureError::NoWindowSelected)?;
        let unavailable = |detail: String| CaptureError::SourceUnavailable(detail);

        let mut source = self
            .platform
            .window_backend()
            .open_source(window)
            .map_err(|e| unavailable(format!("{:#}", e)))?;
        let frame = source
            .grab()
            .map_err(|e| unavailable(format!("{:#}", e)))?
            .and_then(|raw| raw.into_rgb())
            .ok_or_else(|| unavailable("grab produced no frame".to_string()))?;

        content_area::content_region(&frame)
            .ok_or_else(|| CaptureError::InvalidRegion("frame too small for a content area".to_string()))
    }

    /// Start capturing. Returns false, with nothing started or written, when
    /// the selection is incomplete, `fps` is out of range, the store is busy
    /// or the window cannot be grabbed.
    pub fn start_capture(&mut self, fps: u32) -> bool {
        match self.try_start(fps) {
            Ok(session_id) => {
                debug!("Session {} capturing", session_id);
                true
            }
            Err(e) => {
                warn!("start_capture rejected: {}", e);
                false
            }
        }
    }

    /// [`Self::start_capture`] with the failure cause. Returns the session id.
    pub fn try_start(&mut self, fps: u32) -> CaptureResult<String> {
        self.require_idle()?;
        let window = self.window.clone().ok_or(CaptureError::NoWindowSelected)?;
        let region = self.region.ok_or(CaptureError::NoRegionSet)?;
        validation::validate_fps(fps).map_err(|_| CaptureError::InvalidFrameRate(fps))?;

        let session_id = new_session_id();
        let lease = self.store.acquire_capture(&session_id)?;
        let session_dir = self.store.create_session(&session_id)?;

        let counters = CaptureCounters::new();
        let mut frames = FrameCaptureWorker::new(counters.clone(), self.bus.sink());
        let worker_config = FrameWorkerConfig {
            fps,
            region: Some(region),
            encoder: FrameEncoder::new(
                self.capture.image_format,
                self.capture.image_quality,
                self.capture.max_frame_width,
            ),
            session_dir: session_dir.clone(),
        };
        if let Err(e) = frames.start(self.platform.window_backend(), window.clone(), worker_config) {
            // Nothing was written; leave no trace of the attempt.
            if let Err(rm) = fs::remove_dir(&session_dir) {
                debug!("Could not remove {}: {}", session_dir.display(), rm);
            }
            return Err(CaptureError::SourceUnavailable(format!("{:#}", e)));
        }

        let mut audio = AudioCaptureWorker::new(counters.clone());
        let audio_active = self.audio.enabled && {
            let path = session_dir.join(format!("audio_{}.wav", chrono::Utc::now().timestamp()));
            audio.start(self.platform.audio_backend(), self.audio.format(), &path)
        };

        {
            let mut live = self.live.write();
            live.state = SessionState::Capturing;
            live.counters = counters;
            live.audio_available = audio_active;
            live.session_id = Some(session_id.clone());
        }

        info!(
            "Session {} started: {:?} region {:?} at {} fps, audio {}",
            session_id,
            window.title,
            region,
            fps,
            if audio_active { "on" } else { "off" }
        );
        self.bus.sink().emit(SessionEvent::Started {
            session_id: session_id.clone(),
            window_title: window.title,
            audio: audio_active,
        });

        self.run = Some(ActiveRun {
            session_id: session_id.clone(),
            frames,
            audio,
            lease,
            started: Instant::now(),
        });
        Ok(session_id)
    }

    /// Stop both workers, hand the files off, and return to Idle.
    /// Does nothing unless Capturing.
    pub fn stop_capture(&mut self) {
        let Some(mut run) = self.run.take() else {
            debug!("stop_capture ignored, session is {:?}", self.state());
            return;
        };
        let sink = self.bus.sink();

        let frames = run.frames.stop().unwrap_or_default();
        if let Some(clip) = run.audio.stop() {
            if let Ok(meta) = fs::metadata(&clip.path) {
                if let Some(name) = clip.path.file_name().and_then(|n| n.to_str()) {
                    self.store.record_file(
                        &run.session_id,
                        FileRecord {
                            filename: name.to_string(),
                            size: meta.len(),
                            declared_type: "audio/wav".to_string(),
                            recorded_at: chrono::Utc::now().to_rfc3339(),
                        },
                    );
                }
            }
            sink.emit(SessionEvent::AudioFinalized {
                path: clip.path,
                duration: clip.duration,
            });
        }

        self.live.write().state = SessionState::Stopped;
        info!(
            "Session {} stopped after {:.1}s: {} frames, {} dropped",
            run.session_id,
            run.started.elapsed().as_secs_f64(),
            frames.frames_saved,
            frames.frames_dropped
        );
        sink.emit(SessionEvent::Stopped {
            session_id: run.session_id.clone(),
            frames: frames.frames_saved,
            dropped: frames.frames_dropped,
        });

        // Workers are joined; nothing writes to the session directory now.
        drop(run.lease);
        let report = self.store.trigger_processing(&run.session_id);
        if report.status == ProcessingStatus::Error {
            sink.error(ErrorKind::HandOff, report.failures.join("; "));
        }
        sink.emit(SessionEvent::HandOff(report.clone()));
        self.last_report = Some(report);

        let mut live = self.live.write();
        live.state = SessionState::Idle;
        live.audio_available = self.audio.enabled && self.platform.audio_backend().is_available();
    }

    pub fn get_status(&self) -> SessionStatus {
        self.status_handle().get()
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle {
            live: Arc::clone(&self.live),
        }
    }

    /// Receiver for events emitted from now on. Each call gets its own queue.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.bus.subscribe()
    }

    /// Hand-off result of the most recent run.
    pub fn last_report(&self) -> Option<&ProcessingReport> {
        self.last_report.as_ref()
    }

    /// Forget the selection and last report so the session can be reused
    /// for a different window.
    pub fn discard(&mut self) -> CaptureResult<()> {
        self.require_idle()?;
        self.window = None;
        self.region = self.capture.crop();
        self.last_report = None;
        let mut live = self.live.write();
        live.selected_window_title = None;
        live.session_id = None;
        live.counters = CaptureCounters::new();
        Ok(())
    }

    pub fn store(&self) -> &Arc<SessionFileStore> {
        &self.store
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.run.is_some() {
            warn!("Capture session dropped while capturing, stopping");
            self.stop_capture();
        }
    }
}

/// `session_{YYYYmmdd_HHMMSS}_{8 hex}`
pub fn new_session_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        &uuid[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synthetic::SyntheticAudioBackend;
    use crate::capture::synthetic::SyntheticWindowBackend;
    use std::collections::HashSet;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<SessionFileStore>,
        backend: SyntheticWindowBackend,
    }

    fn fixture(backend: SyntheticWindowBackend) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SessionFileStore::new(dir.path()).unwrap());
        Fixture {
            _dir: dir,
            store,
            backend,
        }
    }

    fn session(fx: &Fixture, audio: SyntheticAudioBackend) -> CaptureSession {
        let platform = PlatformAdapter::new(Arc::new(fx.backend.clone()), Arc::new(audio));
        CaptureSession::new(platform, Arc::clone(&fx.store), &AgentConfig::default())
    }

    fn session_dirs(store: &SessionFileStore) -> usize {
        fs::read_dir(store.root().join("sessions")).unwrap().count()
    }

    fn file_names(dir: &Path) -> HashSet<String> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn records_region_frames_for_two_seconds() {
        let fx = fixture(SyntheticWindowBackend::single(800, 600));
        let mut session = session(&fx, SyntheticAudioBackend::unavailable());
        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        session.set_region_rect(50, 50, 400, 300).unwrap();

        assert!(session.start_capture(15));
        assert!(session.get_status().is_capturing);
        thread::sleep(Duration::from_secs(2));
        session.stop_capture();

        let report = session.last_report().unwrap().clone();
        let frames = fx.store.frame_records(&report.session_id).unwrap();
        assert!((28..=32).contains(&frames.len()), "got {} frames", frames.len());
        assert_eq!(session.get_status().frame_count, frames.len() as u64);

        let frame = image::open(&frames[0].path).unwrap();
        assert_eq!((frame.width(), frame.height()), (400, 300));

        assert_eq!(report.status, ProcessingStatus::Processed);
        assert_eq!(report.processed_file_count, frames.len());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn stop_while_idle_changes_nothing() {
        let fx = fixture(SyntheticWindowBackend::single(64, 64));
        let mut session = session(&fx, SyntheticAudioBackend::new());
        let before = session.get_status();

        session.stop_capture();
        assert_eq!(session.get_status(), before);
        assert_eq!(session_dirs(&fx.store), 0);
        assert!(session.last_report().is_none());
    }

    #[test]
    fn sequential_runs_use_disjoint_directories() {
        let fx = fixture(SyntheticWindowBackend::single(64, 48));
        let mut session = session(&fx, SyntheticAudioBackend::new());
        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        session.set_region_rect(0, 0, 32, 32).unwrap();

        let mut runs = Vec::new();
        for _ in 0..2 {
            assert!(session.start_capture(20));
            thread::sleep(Duration::from_millis(200));
            session.stop_capture();
            runs.push(session.last_report().unwrap().session_id.clone());
        }

        assert_ne!(runs[0], runs[1]);
        let first = fx.store.session_dir(&runs[0]);
        let second = fx.store.session_dir(&runs[1]);
        assert_ne!(first, second);

        let a = file_names(&first);
        let b = file_names(&second);
        assert!(!a.is_empty() && !b.is_empty());
        let paths_a: HashSet<_> = a.iter().map(|n| first.join(n)).collect();
        let paths_b: HashSet<_> = b.iter().map(|n| second.join(n)).collect();
        assert!(paths_a.is_disjoint(&paths_b));
        assert_eq!(a.iter().filter(|n| n.starts_with("audio_")).count(), 1);
        assert_eq!(b.iter().filter(|n| n.starts_with("audio_")).count(), 1);
    }

    #[test]
    fn double_stop_hands_off_once() {
        let fx = fixture(SyntheticWindowBackend::single(64, 48));
        let mut session = session(&fx, SyntheticAudioBackend::new());
        let events = session.subscribe();
        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        session.set_region_rect(0, 0, 64, 48).unwrap();

        assert!(session.start_capture(10));
        thread::sleep(Duration::from_millis(150));
        session.stop_capture();
        let report = session.last_report().cloned().unwrap();
        session.stop_capture();
        assert_eq!(session.last_report(), Some(&report));

        let all: Vec<SessionEvent> = events.try_iter().collect();
        let hand_offs = all.iter().filter(|e| matches!(e, SessionEvent::HandOff(_))).count();
        let audio = all
            .iter()
            .filter(|e| matches!(e, SessionEvent::AudioFinalized { .. }))
            .count();
        assert_eq!(hand_offs, 1);
        assert_eq!(audio, 1);
        assert!(all
            .iter()
            .any(|e| matches!(e, SessionEvent::Started { audio: true, .. })));

        let wavs = file_names(&fx.store.session_dir(&report.session_id))
            .into_iter()
            .filter(|n| n.ends_with(".wav"))
            .count();
        assert_eq!(wavs, 1);
    }

    #[test]
    fn late_subscriber_sees_only_its_own_run() {
        let fx = fixture(SyntheticWindowBackend::single(64, 48));
        let mut session = session(&fx, SyntheticAudioBackend::unavailable());
        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        session.set_region_rect(0, 0, 64, 48).unwrap();

        assert!(session.start_capture(30));
        thread::sleep(Duration::from_millis(150));
        session.stop_capture();
        let first = session.last_report().cloned().unwrap();

        let events = session.subscribe();
        assert!(events.is_empty());

        assert!(session.start_capture(30));
        thread::sleep(Duration::from_millis(150));
        session.stop_capture();
        let second = session.last_report().cloned().unwrap();
        assert_ne!(first.session_id, second.session_id);

        let all: Vec<SessionEvent> = events.try_iter().collect();
        let started: Vec<&String> = all
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Started { session_id, .. } => Some(session_id),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![&second.session_id]);
        assert!(matches!(all.last(), Some(SessionEvent::HandOff(r)) if r.session_id == second.session_id));
    }

    #[test]
    fn empty_region_is_rejected_and_nothing_starts() {
        let fx = fixture(SyntheticWindowBackend::single(64, 64));
        let mut session = session(&fx, SyntheticAudioBackend::new());
        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();

        assert!(matches!(
            session.set_region_rect(0, 0, 0, 10),
            Err(CaptureError::InvalidRegion(_))
        ));
        assert!(session.set_region_rect(0, 0, 10, -5).is_err());
        assert!(!session.start_capture(15));
        assert_eq!(session_dirs(&fx.store), 0);
        assert_eq!(fx.backend.grab_count(), 0);
    }

    #[test]
    fn start_requires_window_and_valid_rate() {
        let fx = fixture(SyntheticWindowBackend::single(64, 64));
        let mut session = session(&fx, SyntheticAudioBackend::new());
        assert!(matches!(session.try_start(15), Err(CaptureError::NoWindowSelected)));

        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        assert!(matches!(session.try_start(15), Err(CaptureError::NoRegionSet)));

        session.set_region_rect(0, 0, 8, 8).unwrap();
        assert!(matches!(session.try_start(0), Err(CaptureError::InvalidFrameRate(0))));
        assert!(matches!(session.try_start(61), Err(CaptureError::InvalidFrameRate(61))));
        assert_eq!(session_dirs(&fx.store), 0);
    }

    #[test]
    fn unopenable_window_fails_without_files() {
        let fx = fixture(SyntheticWindowBackend::single(64, 64).refuse_open());
        let mut session = session(&fx, SyntheticAudioBackend::new());
        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        session.set_region_rect(0, 0, 8, 8).unwrap();

        assert!(matches!(session.try_start(15), Err(CaptureError::SourceUnavailable(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session_dirs(&fx.store), 0);
        assert!(fx.store.active_capture().is_none());
    }

    #[test]
    fn selection_is_frozen_while_capturing() {
        let fx = fixture(SyntheticWindowBackend::single(64, 64));
        let mut session = session(&fx, SyntheticAudioBackend::unavailable());
        let window = fx.backend.first_window_info().unwrap();
        session.select_window(window.clone()).unwrap();
        session.set_region_rect(0, 0, 8, 8).unwrap();
        assert!(session.start_capture(10));

        assert!(matches!(
            session.select_window(window),
            Err(CaptureError::InvalidState(SessionState::Capturing))
        ));
        assert!(session.set_region_rect(0, 0, 4, 4).is_err());
        assert!(session.discard().is_err());
        session.stop_capture();
        assert!(session.discard().is_ok());
        assert!(session.selected_window().is_none());
    }

    #[test]
    fn video_only_when_audio_missing() {
        let fx = fixture(SyntheticWindowBackend::single(64, 64));
        let mut session = session(&fx, SyntheticAudioBackend::unavailable());
        assert!(!session.get_status().audio_available);

        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        session.set_region_rect(0, 0, 16, 16).unwrap();
        assert!(session.start_capture(10));
        let status = session.status_handle();
        assert!(!status.get().audio_available);
        assert_eq!(status.get().selected_window_title.as_deref(), Some("Weekly sync - Google Meet"));
        thread::sleep(Duration::from_millis(150));
        session.stop_capture();

        let id = session.last_report().unwrap().session_id.clone();
        let names = file_names(&fx.store.session_dir(&id));
        assert!(names.iter().all(|n| n.starts_with("frame_")));
    }

    #[test]
    fn one_capturing_session_per_store() {
        let fx = fixture(SyntheticWindowBackend::single(64, 64));
        let mut first = session(&fx, SyntheticAudioBackend::unavailable());
        let mut second = session(&fx, SyntheticAudioBackend::unavailable());
        for s in [&mut first, &mut second] {
            s.select_window(fx.backend.first_window_info().unwrap()).unwrap();
            s.set_region_rect(0, 0, 16, 16).unwrap();
        }

        assert!(first.start_capture(10));
        assert!(matches!(second.try_start(10), Err(CaptureError::OutputBusy(_))));
        first.stop_capture();
        assert!(second.start_capture(10));
        second.stop_capture();
    }

    #[test]
    fn region_is_clamped_to_selected_window() {
        let fx = fixture(SyntheticWindowBackend::single(100, 80));
        let mut session = session(&fx, SyntheticAudioBackend::unavailable());
        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        session.set_region_rect(-10, 0, 200, 40).unwrap();

        let region = session.region().unwrap();
        assert_eq!((region.x(), region.y(), region.width(), region.height()), (0, 0, 100, 40));
        assert!(session.set_region_rect(500, 500, 10, 10).is_err());
    }

    #[test]
    fn suggested_region_lies_inside_window() {
        let fx = fixture(SyntheticWindowBackend::single(200, 100));
        let mut session = session(&fx, SyntheticAudioBackend::unavailable());
        assert!(matches!(session.suggest_region(), Err(CaptureError::NoWindowSelected)));

        session.select_window(fx.backend.first_window_info().unwrap()).unwrap();
        let region = session.suggest_region().unwrap();
        assert!(region.fits(200, 100));
        session.set_region(region).unwrap();
        assert_eq!(session.region(), Some(region));
    }

    #[test]
    fn session_ids_are_unique_and_well_formed() {
        let a = new_session_id();
        let b = new_session_id();
        assert_ne!(a, b);
        assert!(a.starts_with("session_"));
        assert_eq!(a.len(), "session_20240101_120000_abcdef12".len());
    }
}
