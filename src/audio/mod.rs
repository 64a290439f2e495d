/*!
 * Audio Capture Module
 *
 * Microphone input for a capture session:
 * - [`AudioBackend`] hides the platform input API (cpal on every OS)
 * - [`AudioCaptureWorker`] accumulates 16-bit PCM on its own thread
 * - [`wav`] finalizes the accumulated samples into one WAV file
 *
 * Audio is optional: when no input device exists the session continues
 * video-only and reports `audio_available = false`.
 */

pub mod cpal_input;
pub mod synthetic;
pub mod wav;
pub mod worker;

pub use worker::{AudioCaptureWorker, AudioClip};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::validation;

/// Audio section of the agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Record microphone input alongside frames
    pub enabled: bool,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Requested channel count (1 or 2)
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate: 44100,
            channels: 2,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        validation::validate_audio_format(self.sample_rate, self.channels)
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// PCM stream layout. Samples are always interleaved signed 16-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;

    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64 * (Self::BITS_PER_SAMPLE / 8) as u64
    }
}

/// Receives each delivered buffer on the backend's callback thread.
pub type ChunkSink = Box<dyn FnMut(&[i16]) + Send + 'static>;

/// An open input stream. Delivery stops when it is dropped.
pub trait InputStream {
    /// Format the device actually delivers.
    fn format(&self) -> AudioFormat;
}

/// Audio input for one platform.
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether an input device is present.
    fn is_available(&self) -> bool;

    /// Start delivering buffers to `sink`.
    ///
    /// Called on the audio thread; the returned stream never leaves it. The
    /// delivered format may differ from `requested` when the device refuses
    /// it.
    fn open_input(&self, requested: AudioFormat, sink: ChunkSink) -> Result<Box<dyn InputStream>>;
}
