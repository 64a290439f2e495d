//! Default-microphone input through cpal.
//!
//! cpal streams are not `Send`, so the stream is built and kept on the audio
//! worker thread; only converted sample buffers cross threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use tracing::{debug, error, info, warn};

use super::{AudioBackend, AudioFormat, ChunkSink, InputStream};

/// Microphone backend for the host's default audio API
pub struct CpalAudioBackend {
    available: OnceLock<bool>,
}

impl CpalAudioBackend {
    pub fn new() -> Self {
        Self {
            available: OnceLock::new(),
        }
    }

    fn default_device() -> Result<Device> {
        cpal::default_host()
            .default_input_device()
            .ok_or_else(|| anyhow!("no default audio input device"))
    }

    /// Device config matching `requested`, or the device default.
    fn negotiate(device: &Device, requested: AudioFormat) -> Result<SupportedStreamConfig> {
        let wanted = SampleRate(requested.sample_rate);
        let matching = device
            .supported_input_configs()
            .context("querying supported input configs")?
            .filter(|range| {
                range.channels() == requested.channels
                    && range.min_sample_rate() <= wanted
                    && range.max_sample_rate() >= wanted
                    && matches!(
                        range.sample_format(),
                        SampleFormat::I16 | SampleFormat::F32 | SampleFormat::U16
                    )
            })
            .max_by_key(|range| range.sample_format() == SampleFormat::I16);

        if let Some(range) = matching {
            return Ok(range.with_sample_rate(wanted));
        }

        let fallback = device
            .default_input_config()
            .context("querying default input config")?;
        warn!(
            "Input device refuses {} Hz/{} ch, using {} Hz/{} ch",
            requested.sample_rate,
            requested.channels,
            fallback.sample_rate().0,
            fallback.channels()
        );
        Ok(fallback)
    }
}

impl Default for CpalAudioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalAudioBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| match Self::default_device() {
            Ok(device) => {
                debug!(
                    "Default input device: {}",
                    device.name().unwrap_or_else(|_| "Unknown".to_string())
                );
                true
            }
            Err(e) => {
                warn!("Audio input unavailable: {}", e);
                false
            }
        })
    }

    fn open_input(&self, requested: AudioFormat, mut sink: ChunkSink) -> Result<Box<dyn InputStream>> {
        let device = Self::default_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let supported = Self::negotiate(&device, requested)?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let format = AudioFormat {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        let cc = Arc::new(AtomicU64::new(0));
        let on_error = |err: cpal::StreamError| error!("Microphone stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    note_callback(&cc, data.len());
                    sink(data);
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => {
                let mut buf = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        note_callback(&cc, data.len());
                        buf.clear();
                        buf.extend(data.iter().map(|&s| f32_to_i16(s)));
                        sink(&buf);
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut buf = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        note_callback(&cc, data.len());
                        buf.clear();
                        buf.extend(data.iter().map(|&s| u16_to_i16(s)));
                        sink(&buf);
                    },
                    on_error,
                    None,
                )
            }
            other => return Err(anyhow!("unsupported microphone sample format {:?}", other)),
        }
        .context("building microphone stream")?;

        stream.play().context("starting microphone stream")?;
        info!(
            "Microphone stream started: {} ({:?}, {} Hz, {} ch)",
            device_name, sample_format, format.sample_rate, format.channels
        );

        Ok(Box::new(CpalStream {
            _stream: stream,
            format,
        }))
    }
}

struct CpalStream {
    _stream: cpal::Stream,
    format: AudioFormat,
}

impl InputStream for CpalStream {
    fn format(&self) -> AudioFormat {
        self.format
    }
}

fn note_callback(count: &AtomicU64, samples: usize) {
    let n = count.fetch_add(1, Ordering::Relaxed);
    if n == 0 {
        info!("Microphone: first callback received");
    } else if n % 500 == 0 {
        debug!("Microphone: {} callbacks, {} samples this batch", n, samples);
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn u16_to_i16(sample: u16) -> i16 {
    (sample as i32 - 32768) as i16
}
