//! Audio test file generation
//!
//! Writes small WAV fixtures with known contents so decoded output can be
//! compared sample by sample.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Distinct values in [0, 1), 1e-5 apart
pub fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| (i % 100_000) as f32 * 1e-5).collect()
}

/// Write interleaved samples as a 32-bit float WAV file.
pub fn write_f32_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    sample_rate: u32,
    samples: &[f32],
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write interleaved samples as a 16-bit integer WAV file.
pub fn write_i16_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    sample_rate: u32,
    samples: &[i16],
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
