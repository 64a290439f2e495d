//! Audio accumulation thread.
//!
//! The backend callback copies each buffer onto a channel; this worker's
//! thread owns the accumulator and the open stream. Nothing is written until
//! `stop`, which finalizes at most one WAV file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{select, unbounded};
use tracing::{debug, error, info, warn};

use super::{wav, AudioBackend, AudioFormat};
use crate::metrics::{CaptureCounters, ThroughputCounter};
use crate::signal::StopSignal;

const THROUGHPUT_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// A finalized audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub samples: u64,
    pub duration: Duration,
}

struct Accumulated {
    format: AudioFormat,
    chunks: Vec<Vec<i16>>,
}

pub struct AudioCaptureWorker {
    counters: CaptureCounters,
    stop: StopSignal,
    handle: Option<JoinHandle<Accumulated>>,
    output_path: Option<PathBuf>,
    format: Option<AudioFormat>,
}

impl AudioCaptureWorker {
    pub fn new(counters: CaptureCounters) -> Self {
        Self {
            counters,
            stop: StopSignal::new(),
            handle: None,
            output_path: None,
            format: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Format delivered by the device, once started.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    /// Open the input stream and begin accumulating.
    ///
    /// Returns false, without spawning anything that outlives the call, when
    /// the backend has no device or the stream cannot be opened.
    pub fn start(&mut self, backend: Arc<dyn AudioBackend>, requested: AudioFormat, output_path: &Path) -> bool {
        if self.handle.is_some() {
            warn!("Audio capture already running");
            return false;
        }
        if !backend.is_available() {
            info!("No audio input available ({}), continuing video-only", backend.name());
            return false;
        }

        match self.spawn(backend, requested) {
            Ok(format) => {
                self.output_path = Some(output_path.to_path_buf());
                self.format = Some(format);
                self.counters.set_audio_active(true);
                info!(
                    "Audio capture started: {} Hz, {} ch -> {}",
                    format.sample_rate,
                    format.channels,
                    output_path.display()
                );
                true
            }
            Err(e) => {
                warn!("Audio capture unavailable, continuing video-only: {:#}", e);
                false
            }
        }
    }

    fn spawn(&mut self, backend: Arc<dyn AudioBackend>, requested: AudioFormat) -> Result<AudioFormat> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<AudioFormat, String>>(1);
        let stop = self.stop.clone();
        let counters = self.counters.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let (chunk_tx, chunk_rx) = unbounded::<Vec<i16>>();
                let chunk_counters = counters.clone();
                let sink = Box::new(move |data: &[i16]| {
                    if chunk_tx.send(data.to_vec()).is_ok() {
                        chunk_counters.record_audio_chunk();
                    }
                });

                let stream = match backend.open_input(requested, sink) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("{:#}", e)));
                        return Accumulated {
                            format: requested,
                            chunks: Vec::new(),
                        };
                    }
                };
                let format = stream.format();
                let _ = ready_tx.send(Ok(format));

                let mut chunks = Vec::new();
                let mut throughput = ThroughputCounter::new(THROUGHPUT_LOG_INTERVAL);
                let mut accept = |chunk: Vec<i16>, chunks: &mut Vec<Vec<i16>>| {
                    if let Some(report) = throughput.record(chunk.len() as u64 * 2) {
                        info!(
                            "Audio: {:.1} chunks/s, {:.0} B/s ({} chunks total)",
                            report.chunks_per_sec, report.bytes_per_sec, report.total_chunks
                        );
                    }
                    chunks.push(chunk);
                };

                loop {
                    select! {
                        recv(chunk_rx) -> msg => match msg {
                            Ok(chunk) => accept(chunk, &mut chunks),
                            Err(_) => {
                                warn!("Audio stream ended before stop");
                                break;
                            }
                        },
                        recv(stop.receiver()) -> _ => break,
                    }
                }

                // Dropping the stream ends delivery; keep what was in flight.
                drop(stream);
                for chunk in chunk_rx.try_iter() {
                    accept(chunk, &mut chunks);
                }
                Accumulated { format, chunks }
            })
            .context("failed to spawn audio capture thread")?;

        match ready_rx.recv() {
            Ok(Ok(format)) => {
                self.handle = Some(handle);
                Ok(format)
            }
            Ok(Err(detail)) => {
                let _ = handle.join();
                Err(anyhow!("cannot open input stream: {}", detail))
            }
            Err(_) => {
                let _ = handle.join();
                Err(anyhow!("audio thread exited before reporting"))
            }
        }
    }

    /// Stop accumulating and write the WAV file if anything was captured.
    ///
    /// No-op when never started or already stopped.
    pub fn stop(&mut self) -> Option<AudioClip> {
        self.stop.trigger();
        let handle = self.handle.take()?;
        self.counters.set_audio_active(false);

        let accumulated = match handle.join() {
            Ok(accumulated) => accumulated,
            Err(_) => {
                error!("Audio capture thread panicked");
                return None;
            }
        };

        if accumulated.chunks.is_empty() {
            info!("Audio capture stopped with no samples, no file written");
            return None;
        }

        let path = self.output_path.take()?;
        match wav::write_wav(&path, accumulated.format, &accumulated.chunks) {
            Ok(samples) => {
                let duration = wav::duration_of(accumulated.format, samples);
                info!(
                    "Audio finalized: {} ({} chunks, {} samples, {:.1}s)",
                    path.display(),
                    accumulated.chunks.len(),
                    samples,
                    duration.as_secs_f64()
                );
                Some(AudioClip {
                    path,
                    format: accumulated.format,
                    samples,
                    duration,
                })
            }
            Err(e) => {
                error!("Failed to write audio file {}: {:#}", path.display(), e);
                None
            }
        }
    }
}

impl Drop for AudioCaptureWorker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("Audio worker dropped while running, finalizing");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::synthetic::SyntheticAudioBackend;

    const STEREO_44K: AudioFormat = AudioFormat {
        sample_rate: 44100,
        channels: 2,
    };

    #[test]
    fn wav_matches_requested_format_and_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_1.wav");
        let backend = SyntheticAudioBackend::new();
        let counters = CaptureCounters::new();
        let mut worker = AudioCaptureWorker::new(counters.clone());

        assert!(worker.start(Arc::new(backend.clone()), STEREO_44K, &path));
        assert!(counters.audio_active());
        thread::sleep(Duration::from_millis(120));
        let clip = worker.stop().unwrap();
        assert!(!counters.audio_active());

        let (header, samples) = wav::read_wav_info(&path).unwrap();
        assert_eq!(header, STEREO_44K);
        assert_eq!(samples, clip.samples);
        assert_eq!(samples, backend.samples_emitted());
        assert!(counters.audio_chunks() > 0);
    }

    #[test]
    fn negotiated_format_lands_in_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_2.wav");
        let device = AudioFormat { sample_rate: 48000, channels: 1 };
        let backend = SyntheticAudioBackend::new().with_device_format(device);
        let mut worker = AudioCaptureWorker::new(CaptureCounters::new());

        assert!(worker.start(Arc::new(backend), STEREO_44K, &path));
        assert_eq!(worker.format(), Some(device));
        thread::sleep(Duration::from_millis(50));
        worker.stop().unwrap();

        let (header, _) = wav::read_wav_info(&path).unwrap();
        assert_eq!(header, device);
    }

    #[test]
    fn unavailable_device_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_3.wav");
        let mut worker = AudioCaptureWorker::new(CaptureCounters::new());

        assert!(!worker.start(Arc::new(SyntheticAudioBackend::unavailable()), STEREO_44K, &path));
        assert!(!worker.is_running());
        assert!(worker.stop().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn second_stop_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio_4.wav");
        let mut worker = AudioCaptureWorker::new(CaptureCounters::new());

        assert!(worker.start(Arc::new(SyntheticAudioBackend::new()), STEREO_44K, &path));
        thread::sleep(Duration::from_millis(30));
        assert!(worker.stop().is_some());
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert!(worker.stop().is_none());
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
