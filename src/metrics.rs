//! Counters and rolling timing statistics for the capture workers.
//!
//! [`CaptureCounters`] is the only state shared between a running worker and
//! the controlling thread; everything else here is owned by one worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Number of recent frames kept in the rolling timing window.
pub const PERF_WINDOW: usize = 30;

/// Atomically updated counters readable from any thread.
#[derive(Clone, Debug, Default)]
pub struct CaptureCounters {
    frames_saved: Arc<AtomicU64>,
    frames_dropped: Arc<AtomicU64>,
    audio_chunks: Arc<AtomicU64>,
    audio_active: Arc<AtomicBool>,
}

impl CaptureCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_saved(&self) -> u64 {
        self.frames_saved.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_chunk(&self) {
        self.audio_chunks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_audio_active(&self, active: bool) {
        self.audio_active.store(active, Ordering::Relaxed);
    }

    pub fn frames_saved(&self) -> u64 {
        self.frames_saved.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn audio_chunks(&self) -> u64 {
        self.audio_chunks.load(Ordering::Relaxed)
    }

    pub fn audio_active(&self) -> bool {
        self.audio_active.load(Ordering::Relaxed)
    }
}

/// Rolling capture/save timings for one frame worker run.
#[derive(Debug)]
pub struct PerformanceStats {
    capture_times: VecDeque<Duration>,
    save_times: VecDeque<Duration>,
    window: usize,
    dropped: u64,
    saved: u64,
    bytes_written: u64,
    started: Instant,
}

impl PerformanceStats {
    pub fn new() -> Self {
        Self::with_window(PERF_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            capture_times: VecDeque::with_capacity(window),
            save_times: VecDeque::with_capacity(window),
            window,
            dropped: 0,
            saved: 0,
            bytes_written: 0,
            started: Instant::now(),
        }
    }

    /// Record one saved frame.
    pub fn record_frame(&mut self, capture: Duration, save: Duration, bytes: u64) {
        if self.capture_times.len() == self.window {
            self.capture_times.pop_front();
            self.save_times.pop_front();
        }
        self.capture_times.push_back(capture);
        self.save_times.push_back(save);
        self.saved += 1;
        self.bytes_written += bytes;
    }

    pub fn record_drop(&mut self) {
        self.dropped += 1;
    }

    /// Mean of capture + save over the rolling window.
    pub fn mean_frame_cost(&self) -> Duration {
        let n = self.capture_times.len();
        if n == 0 {
            return Duration::ZERO;
        }
        let total: Duration = self
            .capture_times
            .iter()
            .zip(self.save_times.iter())
            .map(|(c, s)| *c + *s)
            .sum();
        total / n as u32
    }

    pub fn mean_capture_time(&self) -> Duration {
        mean(&self.capture_times)
    }

    pub fn mean_save_time(&self) -> Duration {
        mean(&self.save_times)
    }

    /// True when recent frames use more than 80% of the frame budget.
    pub fn is_behind(&self, frame_interval: Duration) -> bool {
        !self.capture_times.is_empty() && self.mean_frame_cost() > frame_interval.mul_f64(0.8)
    }

    pub fn saved(&self) -> u64 {
        self.saved
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Saved frames per second since the run started.
    pub fn throughput_fps(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.saved as f64 / secs
    }
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(samples: &VecDeque<Duration>) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    samples.iter().sum::<Duration>() / samples.len() as u32
}

/// Chunks/sec and bytes/sec over a reporting interval.
#[derive(Debug)]
pub struct ThroughputCounter {
    chunks: u64,
    bytes: u64,
    total_chunks: u64,
    total_bytes: u64,
    interval_start: Instant,
    interval: Duration,
}

/// One completed reporting interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputReport {
    pub chunks_per_sec: f64,
    pub bytes_per_sec: f64,
    pub total_chunks: u64,
    pub total_bytes: u64,
}

impl ThroughputCounter {
    pub fn new(interval: Duration) -> Self {
        Self {
            chunks: 0,
            bytes: 0,
            total_chunks: 0,
            total_bytes: 0,
            interval_start: Instant::now(),
            interval,
        }
    }

    /// Count a chunk; returns a report once per elapsed interval.
    pub fn record(&mut self, bytes: u64) -> Option<ThroughputReport> {
        self.chunks += 1;
        self.bytes += bytes;
        self.total_chunks += 1;
        self.total_bytes += bytes;

        let elapsed = self.interval_start.elapsed();
        if elapsed < self.interval {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let report = ThroughputReport {
            chunks_per_sec: self.chunks as f64 / secs,
            bytes_per_sec: self.bytes as f64 / secs,
            total_chunks: self.total_chunks,
            total_bytes: self.total_bytes,
        };
        self.chunks = 0;
        self.bytes = 0;
        self.interval_start = Instant::now();
        Some(report)
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn counters_are_shared_between_clones() {
        let counters = CaptureCounters::new();
        let clone = counters.clone();
        assert_eq!(clone.record_saved(), 1);
        clone.record_dropped();
        counters.set_audio_active(true);

        assert_eq!(counters.frames_saved(), 1);
        assert_eq!(counters.frames_dropped(), 1);
        assert!(clone.audio_active());
    }

    #[test]
    fn rolling_window_evicts_old_samples() {
        let mut stats = PerformanceStats::with_window(2);
        stats.record_frame(Duration::from_millis(100), Duration::from_millis(100), 10);
        stats.record_frame(Duration::from_millis(10), Duration::from_millis(10), 10);
        stats.record_frame(Duration::from_millis(10), Duration::from_millis(10), 10);

        assert_eq!(stats.mean_frame_cost(), Duration::from_millis(20));
        assert_eq!(stats.saved(), 3);
        assert_eq!(stats.bytes_written(), 30);
    }

    #[test]
    fn behind_when_cost_exceeds_eighty_percent() {
        let interval = Duration::from_millis(100);
        let mut stats = PerformanceStats::new();
        assert!(!stats.is_behind(interval));

        stats.record_frame(Duration::from_millis(50), Duration::from_millis(20), 0);
        assert!(!stats.is_behind(interval));

        stats.record_frame(Duration::from_millis(80), Duration::from_millis(30), 0);
        stats.record_frame(Duration::from_millis(80), Duration::from_millis(30), 0);
        assert!(stats.is_behind(interval));
    }

    #[test]
    fn throughput_reports_after_interval() {
        let mut counter = ThroughputCounter::new(Duration::from_millis(20));
        assert!(counter.record(100).is_none());
        thread::sleep(Duration::from_millis(25));
        let report = counter.record(100).unwrap();
        assert_eq!(report.total_chunks, 2);
        assert_eq!(report.total_bytes, 200);
        assert!(report.bytes_per_sec > 0.0);
        assert!(counter.record(1).is_none());
    }
}
