//! Configuration management for wavfeed
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--sample-rate`, `--channels`, ...)
//! 2. Environment variables (`WAVFEED_SAMPLE_RATE`, ...)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Command-line and environment values arrive together as
//! [`ConfigOverrides`]; the argument parser resolves those two layers.
//!
//! # Example
//!
//! ```toml
//! [output]
//! sample_rate = 96000
//! frames_per_buffer = 512
//! channels = 2
//!
//! [playback]
//! completion_grace_ms = 1000
//! decode_errors = "abort"
//! prefetch_ms = 2000
//!
//! [logging]
//! level = "info"
//! ```

use crate::audio::feeder::DecodeErrorPolicy;
use crate::audio::types::SourceFormat;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use wavfeed_common::config::{load_toml_config, Loaded};
use wavfeed_common::logging::LoggingConfig;

/// Default output sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 96000;

/// Default frames per device callback
pub const DEFAULT_FRAMES_PER_BUFFER: u32 = 512;

/// Default slack added to the estimated playback duration
pub const DEFAULT_COMPLETION_GRACE_MS: u64 = 1000;

/// Default audio decoded ahead of the output callback
pub const DEFAULT_PREFETCH_MS: u64 = 2000;

/// Output device settings (`[output]` table)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,

    /// Frames per device callback
    pub frames_per_buffer: u32,

    /// Output channel count; `None` follows the source file
    pub channels: Option<u16>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            channels: None,
        }
    }
}

impl OutputConfig {
    /// Output channel count for a source with `source_channels` channels.
    ///
    /// The feeder frames samples by the source's channel count, so an
    /// explicit output count must agree with it.
    pub fn resolve_channels(&self, source_channels: u16) -> Result<u16> {
        match self.channels {
            None => Ok(source_channels),
            Some(channels) if channels == source_channels => Ok(channels),
            Some(channels) => Err(Error::Config(format!(
                "Output configured for {} channel(s) but source has {}",
                channels, source_channels
            ))),
        }
    }
}

/// Playback session settings (`[playback]` table)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Slack added to the estimated duration before giving up on the
    /// completion signal
    pub completion_grace_ms: u64,

    /// Handling of source read errors
    pub decode_errors: DecodeErrorPolicy,

    /// Audio the decoder thread keeps buffered ahead of playback
    pub prefetch_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            completion_grace_ms: DEFAULT_COMPLETION_GRACE_MS,
            decode_errors: DecodeErrorPolicy::default(),
            prefetch_ms: DEFAULT_PREFETCH_MS,
        }
    }
}

impl PlaybackConfig {
    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    /// Prefetch buffer capacity in samples for `format`.
    ///
    /// Never less than two device buffers.
    pub fn prefetch_samples(&self, format: &SourceFormat, frames_per_buffer: u32) -> usize {
        let channels = format.channels.max(1) as u64;
        let frames = format.sample_rate as u64 * self.prefetch_ms / 1000;
        let floor = 2 * frames_per_buffer as u64;
        (frames.max(floor) * channels) as usize
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub output: OutputConfig,
    pub playback: PlaybackConfig,
    pub logging: LoggingConfig,
}

/// Command-line (or environment) configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub sample_rate: Option<u32>,
    pub frames_per_buffer: Option<u32>,
    pub channels: Option<u16>,
    pub log_level: Option<String>,
}

impl PlayerConfig {
    /// Load configuration from TOML, apply overrides, and validate.
    ///
    /// `path` is the explicit config file, if any; otherwise the platform
    /// default location is tried and built-in defaults used if absent.
    pub fn load(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Loaded<Self>> {
        let mut loaded = load_toml_config::<Self>(path)?;
        loaded.config.apply(overrides);
        loaded.config.validate()?;
        Ok(loaded)
    }

    /// Replace settings with any override that is present.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(rate) = overrides.sample_rate {
            self.output.sample_rate = rate;
        }
        if let Some(frames) = overrides.frames_per_buffer {
            self.output.frames_per_buffer = frames;
        }
        if let Some(channels) = overrides.channels {
            self.output.channels = Some(channels);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".to_string()));
        }
        if self.output.frames_per_buffer == 0 {
            return Err(Error::Config("frames_per_buffer must be positive".to_string()));
        }
        if self.output.channels == Some(0) {
            return Err(Error::Config("channels must be positive".to_string()));
        }
        if self.playback.prefetch_ms == 0 {
            return Err(Error::Config("prefetch_ms must be positive".to_string()));
        }
        self.logging.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(doc: &str) -> PlayerConfig {
        wavfeed_common::config::parse_toml(doc, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.output.sample_rate, 96000);
        assert_eq!(config.output.frames_per_buffer, 512);
        assert_eq!(config.output.channels, None);
        assert_eq!(config.playback.completion_grace(), Duration::from_secs(1));
        assert_eq!(config.playback.decode_errors, DecodeErrorPolicy::Abort);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = parse("[output]\nframes_per_buffer = 256\n");
        assert_eq!(config.output.frames_per_buffer, 256);
        assert_eq!(config.output.sample_rate, 96000);
        assert_eq!(config.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_full_toml() {
        let config = parse(
            r#"
            [output]
            sample_rate = 48000
            frames_per_buffer = 1024
            channels = 1

            [playback]
            completion_grace_ms = 250
            decode_errors = "end_of_stream"
            prefetch_ms = 500

            [logging]
            level = "debug"
            "#,
        );
        assert_eq!(config.output.sample_rate, 48000);
        assert_eq!(config.output.channels, Some(1));
        assert_eq!(config.playback.completion_grace(), Duration::from_millis(250));
        assert_eq!(config.playback.decode_errors, DecodeErrorPolicy::EndOfStream);
        assert_eq!(config.playback.prefetch_ms, 500);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_overrides_take_priority() {
        let mut config = parse("[output]\nsample_rate = 44100\nchannels = 2\n");
        config.apply(ConfigOverrides {
            sample_rate: Some(48000),
            channels: None,
            frames_per_buffer: Some(128),
            log_level: Some("warn".to_string()),
        });
        assert_eq!(config.output.sample_rate, 48000);
        assert_eq!(config.output.channels, Some(2));
        assert_eq!(config.output.frames_per_buffer, 128);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = PlayerConfig::default();
        config.output.sample_rate = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PlayerConfig::default();
        config.output.frames_per_buffer = 0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.output.channels = Some(0);
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.playback.prefetch_ms = 0;
        assert!(config.validate().is_err());

        let mut config = PlayerConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(Error::Common(_))));
    }

    #[test]
    fn test_resolve_channels() {
        let follow = OutputConfig::default();
        assert_eq!(follow.resolve_channels(1).unwrap(), 1);

        let stereo = OutputConfig { channels: Some(2), ..OutputConfig::default() };
        assert_eq!(stereo.resolve_channels(2).unwrap(), 2);
        assert!(matches!(stereo.resolve_channels(1), Err(Error::Config(_))));
    }

    #[test]
    fn test_prefetch_samples() {
        let playback = PlaybackConfig::default();
        let stereo = SourceFormat { channels: 2, sample_rate: 96000, total_frames: None };
        assert_eq!(playback.prefetch_samples(&stereo, 512), 2 * 192000);

        // Tiny prefetch still covers two device buffers
        let tiny = PlaybackConfig { prefetch_ms: 1, ..PlaybackConfig::default() };
        assert_eq!(tiny.prefetch_samples(&stereo, 512), 2 * 1024);
    }
}
