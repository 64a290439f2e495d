//! Dedicated frame-capture thread.
//!
//! One worker per session run: it grabs the selected window at the requested
//! cadence, crops, downsizes and compresses each bitmap, and writes it to the
//! session directory. The frame index is owned by the worker thread alone and
//! advances only on a successful write, so indices in a session directory are
//! gap-free and strictly increasing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use image::{imageops, RgbImage};
use tracing::{debug, error, info, warn};

use super::content_area;
use super::{CaptureRegion, FrameSource, WindowBackend, WindowInfo};
use crate::metrics::{CaptureCounters, PerformanceStats};
use crate::session::events::{ErrorKind, EventSink, SessionEvent};
use crate::signal::StopSignal;
use crate::validation;
use crate::video::FrameEncoder;

/// Frames between throughput log lines.
const LOG_EVERY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Capturing,
    Stopped,
}

/// Parameters fixed for one capture run.
#[derive(Debug, Clone)]
pub struct FrameWorkerConfig {
    pub fps: u32,
    /// `None` applies the content-area heuristic to every frame.
    pub region: Option<CaptureRegion>,
    pub encoder: FrameEncoder,
    pub session_dir: PathBuf,
}

impl FrameWorkerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameRunSummary {
    pub frames_saved: u64,
    pub frames_dropped: u64,
    pub bytes_written: u64,
    pub mean_capture_time: Duration,
    pub mean_save_time: Duration,
}

pub struct FrameCaptureWorker {
    state: WorkerState,
    counters: CaptureCounters,
    events: EventSink,
    stop: StopSignal,
    handle: Option<JoinHandle<FrameRunSummary>>,
    summary: Option<FrameRunSummary>,
}

impl FrameCaptureWorker {
    pub fn new(counters: CaptureCounters, events: EventSink) -> Self {
        Self {
            state: WorkerState::Idle,
            counters,
            events,
            stop: StopSignal::new(),
            handle: None,
            summary: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Summary of the finished run, once stopped.
    pub fn summary(&self) -> Option<FrameRunSummary> {
        self.summary
    }

    /// Spawn the capture thread and wait until it holds a grab handle.
    ///
    /// Failing to acquire the handle is the only error; the worker is then
    /// Stopped and nothing was written.
    pub fn start(
        &mut self,
        backend: Arc<dyn WindowBackend>,
        window: WindowInfo,
        config: FrameWorkerConfig,
    ) -> Result<()> {
        if self.state != WorkerState::Idle {
            bail!("frame worker already used (state {:?})", self.state);
        }
        validation::validate_fps(config.fps)?;

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let counters = self.counters.clone();
        let events = self.events.clone();
        let stop = self.stop.clone();

        let handle = thread::Builder::new()
            .name("frame-capture".to_string())
            .spawn(move || {
                let source = match backend.open_source(&window) {
                    Ok(source) => {
                        let _ = ready_tx.send(Ok(()));
                        source
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{:#}", e)));
                        return FrameRunSummary::default();
                    }
                };
                run_capture_loop(source, &window, &config, &stop, &counters, &events)
            })
            .context("failed to spawn frame capture thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.handle = Some(handle);
                self.state = WorkerState::Capturing;
                Ok(())
            }
            Ok(Err(detail)) => {
                let _ = handle.join();
                self.state = WorkerState::Stopped;
                error!("Cannot acquire capture handle: {}", detail);
                Err(anyhow!("cannot acquire capture handle: {}", detail))
            }
            Err(_) => {
                let _ = handle.join();
                self.state = WorkerState::Stopped;
                Err(anyhow!("frame capture thread exited before reporting"))
            }
        }
    }

    /// Signal the loop and wait for the in-flight frame to finish.
    /// Calling this again, or before `start`, does nothing.
    pub fn stop(&mut self) -> Option<FrameRunSummary> {
        self.stop.trigger();
        let handle = self.handle.take()?;
        let summary = match handle.join() {
            Ok(summary) => summary,
            Err(_) => {
                error!("Frame capture thread panicked");
                FrameRunSummary {
                    frames_saved: self.counters.frames_saved(),
                    frames_dropped: self.counters.frames_dropped(),
                    ..FrameRunSummary::default()
                }
            }
        };
        self.state = WorkerState::Stopped;
        self.summary = Some(summary);
        info!(
            "Frame capture stopped: {} saved, {} dropped, {} bytes",
            summary.frames_saved, summary.frames_dropped, summary.bytes_written
        );
        Some(summary)
    }
}

impl Drop for FrameCaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture_loop(
    mut source: Box<dyn FrameSource>,
    window: &WindowInfo,
    config: &FrameWorkerConfig,
    stop: &StopSignal,
    counters: &CaptureCounters,
    events: &EventSink,
) -> FrameRunSummary {
    let interval = config.frame_interval();
    let mut stats = PerformanceStats::new();
    let mut next_index: u64 = 0;

    info!(
        "Capturing {:?} at {} fps into {}",
        window.title,
        config.fps,
        config.session_dir.display()
    );

    loop {
        let loop_start = Instant::now();

        match grab_cropped(source.as_mut(), config.region) {
            Ok(Some(frame)) => {
                let capture_time = loop_start.elapsed();
                let save_start = Instant::now();
                match save_frame(frame, next_index, config) {
                    Ok((path, bytes)) => {
                        let save_time = save_start.elapsed();
                        stats.record_frame(capture_time, save_time, bytes);
                        counters.record_saved();
                        debug!("Saved frame {} ({} bytes)", next_index, bytes);
                        events.emit(SessionEvent::FrameSaved {
                            path,
                            index: next_index,
                        });
                        next_index += 1;

                        if stats.saved() % LOG_EVERY == 0 {
                            info!(
                                "{} frames ({:.1} fps), capture {:?}, save {:?}, {} dropped",
                                stats.saved(),
                                stats.throughput_fps(),
                                stats.mean_capture_time(),
                                stats.mean_save_time(),
                                stats.dropped()
                            );
                        }
                    }
                    Err(SaveError::Encode(e)) => {
                        warn!("Skipping frame, encode failed: {:#}", e);
                        events.error(ErrorKind::Encode, format!("{:#}", e));
                    }
                    Err(SaveError::Write(e)) => {
                        warn!("Frame lost, write failed: {:#}", e);
                        events.error(ErrorKind::Write, format!("{:#}", e));
                    }
                }
            }
            Ok(None) => {
                stats.record_drop();
                counters.record_dropped();
                debug!("Dropped frame (empty grab)");
            }
            Err(e) => {
                stats.record_drop();
                counters.record_dropped();
                debug!("Dropped frame: {:#}", e);
                events.error(ErrorKind::Grab, format!("{:#}", e));
            }
        }

        let mut sleep = interval.saturating_sub(loop_start.elapsed());
        if stats.is_behind(interval) {
            sleep /= 2;
        }
        if stop.wait_timeout(sleep) {
            break;
        }
    }

    FrameRunSummary {
        frames_saved: stats.saved(),
        frames_dropped: stats.dropped(),
        bytes_written: stats.bytes_written(),
        mean_capture_time: stats.mean_capture_time(),
        mean_save_time: stats.mean_save_time(),
    }
}

/// Grab one bitmap and cut out the persisted area.
fn grab_cropped(source: &mut dyn FrameSource, region: Option<CaptureRegion>) -> Result<Option<RgbImage>> {
    let Some(raw) = source.grab()? else {
        return Ok(None);
    };
    let Some(image) = raw.into_rgb() else {
        bail!("grab returned a malformed bitmap");
    };
    let (width, height) = image.dimensions();

    let crop = match region {
        Some(region) => region.clamp_to(width, height),
        None => content_area::content_region(&image),
    };
    let Some(crop) = crop else {
        return Ok(None);
    };

    let (x, y, w, h) = crop.as_crop();
    if (x, y, w, h) == (0, 0, width, height) {
        return Ok(Some(image));
    }
    Ok(Some(imageops::crop_imm(&image, x, y, w, h).to_image()))
}

enum SaveError {
    Encode(anyhow::Error),
    Write(anyhow::Error),
}

fn save_frame(frame: RgbImage, index: u64, config: &FrameWorkerConfig) -> std::result::Result<(PathBuf, u64), SaveError> {
    let (bytes, _, _) = config.encoder.optimize(frame).map_err(SaveError::Encode)?;
    let path = frame_path(&config.session_dir, index, &config.encoder);
    fs::write(&path, &bytes)
        .with_context(|| format!("writing {}", path.display()))
        .map_err(SaveError::Write)?;
    Ok((path, bytes.len() as u64))
}

fn frame_path(dir: &Path, index: u64, encoder: &FrameEncoder) -> PathBuf {
    dir.join(format!(
        "frame_{:06}_{}.{}",
        index,
        chrono::Utc::now().timestamp_millis(),
        encoder.format().extension()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::SyntheticWindowBackend;
    use crate::session::events::EventBus;
    use crate::video::FrameFormat;

    fn config(dir: &Path, fps: u32, region: Option<CaptureRegion>) -> FrameWorkerConfig {
        FrameWorkerConfig {
            fps,
            region,
            encoder: FrameEncoder::new(FrameFormat::Jpeg, 80, 1280),
            session_dir: dir.to_path_buf(),
        }
    }

    fn frame_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with("frame_"))
            })
            .collect();
        files.sort();
        files
    }

    fn index_of(path: &Path) -> u64 {
        let name = path.file_name().unwrap().to_str().unwrap();
        name["frame_".len().."frame_".len() + 6].parse().unwrap()
    }

    #[test]
    fn captures_region_at_requested_rate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyntheticWindowBackend::single(800, 600);
        let window = backend.first_window_info().unwrap();
        let counters = CaptureCounters::new();
        let mut worker = FrameCaptureWorker::new(counters.clone(), EventSink::disabled());

        let region = CaptureRegion::new(50, 50, 400, 300);
        worker
            .start(Arc::new(backend), window, config(dir.path(), 15, region))
            .unwrap();
        assert_eq!(worker.state(), WorkerState::Capturing);

        thread::sleep(Duration::from_secs(2));
        let summary = worker.stop().unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);

        let files = frame_files(dir.path());
        assert_eq!(files.len() as u64, summary.frames_saved);
        assert_eq!(counters.frames_saved(), summary.frames_saved);
        // 2.0 s at 15 fps, one frame of slack either way
        assert!(
            (28..=32).contains(&files.len()),
            "unexpected frame count {}",
            files.len()
        );

        let first = image::open(&files[0]).unwrap();
        assert_eq!((first.width(), first.height()), (400, 300));
    }

    #[test]
    fn indices_are_gap_free_and_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyntheticWindowBackend::single(64, 48).drop_every(3);
        let window = backend.first_window_info().unwrap();
        let counters = CaptureCounters::new();
        let mut worker = FrameCaptureWorker::new(counters.clone(), EventSink::disabled());

        worker
            .start(Arc::new(backend), window, config(dir.path(), 50, CaptureRegion::new(0, 0, 32, 32)))
            .unwrap();
        thread::sleep(Duration::from_millis(400));
        let summary = worker.stop().unwrap();

        let indices: Vec<u64> = frame_files(dir.path()).iter().map(|p| index_of(p)).collect();
        assert!(!indices.is_empty());
        let expected: Vec<u64> = (0..indices.len() as u64).collect();
        assert_eq!(indices, expected);

        assert!(summary.frames_dropped > 0);
        assert_eq!(counters.frames_dropped(), summary.frames_dropped);
    }

    #[test]
    fn mean_interval_respects_frame_rate() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyntheticWindowBackend::single(32, 32);
        let window = backend.first_window_info().unwrap();
        let bus = EventBus::new();
        let events = bus.subscribe();
        let mut worker = FrameCaptureWorker::new(CaptureCounters::new(), bus.sink());

        let fps = 20;
        let start = Instant::now();
        worker
            .start(Arc::new(backend), window, config(dir.path(), fps, CaptureRegion::full(32, 32)))
            .unwrap();
        thread::sleep(Duration::from_millis(600));
        let summary = worker.stop().unwrap();
        let elapsed = start.elapsed();

        assert!(summary.frames_saved >= 2);
        let mean = elapsed / summary.frames_saved as u32;
        let interval = Duration::from_secs_f64(1.0 / fps as f64);
        assert!(mean >= interval.mul_f64(0.85), "mean interval {:?}", mean);

        let saved_events = events
            .try_iter()
            .filter(|e| matches!(e, SessionEvent::FrameSaved { .. }))
            .count() as u64;
        assert_eq!(saved_events, summary.frames_saved);
    }

    #[test]
    fn slow_grabs_back_off_without_outrunning_cadence() {
        let root = tempfile::tempdir().unwrap();
        let store = crate::session::SessionFileStore::new(root.path()).unwrap();
        let session_dir = store.create_session("slow").unwrap();

        let fps = 10;
        let interval = Duration::from_secs_f64(1.0 / fps as f64);
        let backend = SyntheticWindowBackend::single(64, 64).grab_delay(interval.mul_f64(0.85));
        let window = backend.first_window_info().unwrap();
        let mut worker = FrameCaptureWorker::new(CaptureCounters::new(), EventSink::disabled());

        worker
            .start(Arc::new(backend), window, config(&session_dir, fps, CaptureRegion::full(64, 64)))
            .unwrap();
        thread::sleep(Duration::from_millis(1300));
        let summary = worker.stop().unwrap();

        // Grab alone exceeds 80% of the interval, so the loop is running behind
        assert!(summary.mean_capture_time >= interval.mul_f64(0.8));

        let frames = store.frame_records("slow").unwrap();
        assert!(frames.len() >= 8, "only {} frames", frames.len());
        assert_eq!(frames.len() as u64, summary.frames_saved);

        let span = (frames[frames.len() - 1].timestamp_ms - frames[0].timestamp_ms) as f64;
        let mean_ms = span / (frames.len() - 1) as f64;
        let interval_ms = interval.as_secs_f64() * 1000.0;
        assert!(mean_ms >= interval_ms * 0.8, "mean interval {:.1} ms", mean_ms);
        assert!(mean_ms <= interval_ms * 1.15, "mean interval {:.1} ms", mean_ms);
    }

    #[test]
    fn oversized_region_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyntheticWindowBackend::single(120, 80);
        let window = backend.first_window_info().unwrap();
        let mut worker = FrameCaptureWorker::new(CaptureCounters::new(), EventSink::disabled());

        let region = CaptureRegion::new(-10, 0, 120 + 100, 40);
        worker
            .start(Arc::new(backend), window, config(dir.path(), 30, region))
            .unwrap();
        thread::sleep(Duration::from_millis(150));
        worker.stop();

        let files = frame_files(dir.path());
        assert!(!files.is_empty());
        let frame = image::open(&files[0]).unwrap();
        assert_eq!((frame.width(), frame.height()), (120, 40));
    }

    #[test]
    fn heuristic_crop_without_region() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyntheticWindowBackend::single(200, 100);
        let window = backend.first_window_info().unwrap();
        let mut worker = FrameCaptureWorker::new(CaptureCounters::new(), EventSink::disabled());

        worker
            .start(Arc::new(backend), window, config(dir.path(), 30, None))
            .unwrap();
        thread::sleep(Duration::from_millis(150));
        worker.stop();

        let files = frame_files(dir.path());
        assert!(!files.is_empty());
        let frame = image::open(&files[0]).unwrap();
        assert!(frame.width() <= 200 && frame.height() <= 100);
        assert!(frame.width() >= 60 && frame.height() >= 30);
    }

    #[test]
    fn unopenable_source_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SyntheticWindowBackend::single(64, 64).refuse_open();
        let window = backend.first_window_info().unwrap();
        let mut worker = FrameCaptureWorker::new(CaptureCounters::new(), EventSink::disabled());

        let result = worker.start(Arc::new(backend), window, config(dir.path(), 15, CaptureRegion::full(64, 64)));
        assert!(result.is_err());
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(worker.stop().is_none());
        assert!(frame_files(dir.path()).is_empty());
    }

    #[test]
    fn stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut worker = FrameCaptureWorker::new(CaptureCounters::new(), EventSink::disabled());
        assert!(worker.stop().is_none());
        assert_eq!(worker.state(), WorkerState::Idle);

        let backend = SyntheticWindowBackend::single(16, 16);
        let window = backend.first_window_info().unwrap();
        let mut worker = FrameCaptureWorker::new(CaptureCounters::new(), EventSink::disabled());
        worker
            .start(Arc::new(backend), window, config(dir.path(), 10, CaptureRegion::full(16, 16)))
            .unwrap();
        assert!(worker.stop().is_some());
        assert!(worker.stop().is_none());
        assert!(worker.summary().is_some());
    }
}
