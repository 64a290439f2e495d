//! Tone-generating audio backend for tests and `record --synthetic`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{bail, Result};

use super::{AudioBackend, AudioFormat, ChunkSink, InputStream};

const CHUNK_PERIOD: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SyntheticAudioBackend {
    available: bool,
    device_format: Option<AudioFormat>,
    samples_emitted: Arc<AtomicU64>,
}

impl SyntheticAudioBackend {
    pub fn new() -> Self {
        Self {
            available: true,
            device_format: None,
            samples_emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// No input device.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Device that only delivers `format`, whatever is requested.
    pub fn with_device_format(mut self, format: AudioFormat) -> Self {
        self.device_format = Some(format);
        self
    }

    /// Samples handed to sinks so far, across all streams.
    pub fn samples_emitted(&self) -> u64 {
        self.samples_emitted.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for SyntheticAudioBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn open_input(&self, requested: AudioFormat, mut sink: ChunkSink) -> Result<Box<dyn InputStream>> {
        if !self.available {
            bail!("no audio input device");
        }
        let format = self.device_format.unwrap_or(requested);
        let running = Arc::new(AtomicBool::new(true));
        let emitted = Arc::clone(&self.samples_emitted);

        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("synthetic-audio".to_string())
            .spawn(move || {
                let frames = (format.sample_rate / 100).max(1) as usize;
                let mut phase = 0.0f32;
                let step = 440.0 * std::f32::consts::TAU / format.sample_rate as f32;
                let mut chunk = Vec::with_capacity(frames * format.channels as usize);

                while flag.load(Ordering::SeqCst) {
                    chunk.clear();
                    for _ in 0..frames {
                        let value = (phase.sin() * 8000.0) as i16;
                        phase = (phase + step) % std::f32::consts::TAU;
                        for _ in 0..format.channels {
                            chunk.push(value);
                        }
                    }
                    sink(&chunk);
                    emitted.fetch_add(chunk.len() as u64, Ordering::SeqCst);
                    thread::sleep(CHUNK_PERIOD);
                }
            })?;

        Ok(Box::new(ToneStream {
            format,
            running,
            handle: Some(handle),
        }))
    }
}

struct ToneStream {
    format: AudioFormat,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InputStream for ToneStream {
    fn format(&self) -> AudioFormat {
        self.format
    }
}

impl Drop for ToneStream {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
