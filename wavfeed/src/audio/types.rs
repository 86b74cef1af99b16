//! Core audio data types
//!
//! Defines the format descriptor, feeder status and statistics, and the
//! events the output callback reports to the playback session.
//!
//! **Format:**
//! - Samples are f32 (floating point -1.0 to 1.0)
//! - Interleaved by channel: [L, R, L, R, ...] for stereo
//! - A frame is one sample per channel at a single instant

use crate::error::Error;
use std::time::Duration;

/// Format metadata read from the source file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFormat {
    /// Channel count (1=mono, 2=stereo, ...)
    pub channels: u16,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Total frames in the file, if the container declares it
    pub total_frames: Option<u64>,
}

impl SourceFormat {
    /// Total interleaved samples (`frames × channels`), if known
    pub fn total_samples(&self) -> Option<u64> {
        self.total_frames.map(|frames| frames * self.channels as u64)
    }

    /// Playback duration of the file when consumed at `output_rate` Hz.
    ///
    /// Coarse estimate used only to bound the completion wait.
    pub fn duration_at(&self, output_rate: u32) -> Option<Duration> {
        if output_rate == 0 {
            return None;
        }
        self.total_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / output_rate as f64))
    }
}

/// Status returned by the feeder for each buffer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Buffer filled entirely from the source; more buffers will follow
    Continue,
    /// Source exhausted; the buffer was padded with silence
    Complete,
}

/// Running counters kept by the feeder.
///
/// Plain integers, so updating them in the audio callback never allocates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Buffer requests served
    pub callbacks: u64,
    /// Samples decoded from the source
    pub samples_decoded: u64,
    /// Samples of silence written after the source ran out
    pub samples_padded: u64,
}

/// Events sent from the audio thread to the playback session.
#[derive(Debug)]
pub enum StreamEvent {
    /// Feeder reported Complete; final statistics attached
    Complete(FeedStats),
    /// Source read failed and the decode error policy is `abort`
    DecodeFailed(Error),
    /// The device reported a stream error
    DeviceError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_samples() {
        let format = SourceFormat { channels: 2, sample_rate: 44100, total_frames: Some(1000) };
        assert_eq!(format.total_samples(), Some(2000));

        let unknown = SourceFormat { total_frames: None, ..format };
        assert_eq!(unknown.total_samples(), None);
    }

    #[test]
    fn test_duration_uses_output_rate() {
        let format = SourceFormat { channels: 1, sample_rate: 48000, total_frames: Some(96000) };
        assert_eq!(format.duration_at(96000), Some(Duration::from_secs(1)));
        assert_eq!(format.duration_at(48000), Some(Duration::from_secs(2)));
        assert_eq!(format.duration_at(0), None);
    }

    #[test]
    fn test_duration_keeps_fractional_seconds() {
        // 1.5 s must not truncate to 1 s
        let format = SourceFormat { channels: 2, sample_rate: 96000, total_frames: Some(144000) };
        assert_eq!(format.duration_at(96000), Some(Duration::from_millis(1500)));
    }
}
