//! WAV finalization for accumulated PCM chunks.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::AudioFormat;

/// Write `chunks` in order as one 16-bit WAV file. Returns the sample count.
pub fn write_wav(path: &Path, format: AudioFormat, chunks: &[Vec<i16>]) -> Result<u64> {
    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: AudioFormat::BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut samples = 0u64;
    for chunk in chunks {
        for &sample in chunk {
            writer.write_sample(sample)?;
        }
        samples += chunk.len() as u64;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(samples)
}

/// Header format and total sample count of an existing WAV file.
pub fn read_wav_info(path: &Path) -> Result<(AudioFormat, u64)> {
    let reader = WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    Ok((
        AudioFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
        reader.len() as u64,
    ))
}

/// Playback length of `samples` interleaved samples.
pub fn duration_of(format: AudioFormat, samples: u64) -> Duration {
    let frames = samples / format.channels.max(1) as u64;
    Duration::from_secs_f64(frames as f64 / format.sample_rate.max(1) as f64)
}
