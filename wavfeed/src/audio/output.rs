//! Audio output using cpal
//!
//! Binds the default output device and drives a [`SampleFeeder`] from the
//! device's buffer callback.
//!
//! Output format is fixed to interleaved f32. Channel count, sample rate and
//! frames per buffer come from configuration. cpal has no "complete" return
//! value, so terminal feeder status is forwarded to the session as a
//! [`StreamEvent`] instead.

use crate::audio::feeder::SampleFeeder;
use crate::audio::source::SampleReader;
use crate::audio::types::{FeedStatus, StreamEvent};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Body of the device data callback.
///
/// Fills each buffer through the feeder and sends exactly one terminal
/// event. Sending on the unbounded channel never blocks.
pub struct StreamFeed<R> {
    feeder: SampleFeeder<R>,
    events: UnboundedSender<StreamEvent>,
    reported: bool,
}

impl<R: SampleReader> StreamFeed<R> {
    pub fn new(feeder: SampleFeeder<R>, events: UnboundedSender<StreamEvent>) -> Self {
        Self {
            feeder,
            events,
            reported: false,
        }
    }

    /// Handle one device buffer request.
    pub fn on_buffer(&mut self, data: &mut [f32]) {
        let status = self.feeder.fill(data);
        if self.reported {
            return;
        }

        let event = match status {
            Ok(FeedStatus::Continue) => return,
            Ok(FeedStatus::Complete) => StreamEvent::Complete(self.feeder.stats()),
            Err(e) => StreamEvent::DecodeFailed(e),
        };
        self.reported = true;
        // Receiver gone means the session is already tearing down
        let _ = self.events.send(event);
    }

    pub fn feeder(&self) -> &SampleFeeder<R> {
        &self.feeder
    }
}

/// Audio output manager using cpal.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl AudioOutput {
    /// Open the default output device.
    ///
    /// # Errors
    /// - No default output device
    /// - Device cannot play f32 at `sample_rate` Hz with `channels` channels
    pub fn open(channels: u16, sample_rate: u32, frames_per_buffer: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using default audio device: {}", name);

        let buffer_size = Self::negotiate(&device, channels, sample_rate, frames_per_buffer)?;

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size,
        };

        debug!(
            "Audio config: sample_rate={}, channels={}, format=F32, buffer_size={:?}",
            config.sample_rate.0, config.channels, config.buffer_size
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Check f32 support and pick the buffer size to request.
    fn negotiate(
        device: &Device,
        channels: u16,
        sample_rate: u32,
        frames_per_buffer: u32,
    ) -> Result<BufferSize> {
        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .find(|config| {
                config.channels() == channels
                    && config.sample_format() == SampleFormat::F32
                    && config.min_sample_rate().0 <= sample_rate
                    && config.max_sample_rate().0 >= sample_rate
            })
            .ok_or_else(|| {
                Error::AudioOutput(format!(
                    "Device does not support f32 output at {} Hz with {} channel(s)",
                    sample_rate, channels
                ))
            })?;

        match supported.buffer_size() {
            SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames_per_buffer) => {
                Ok(BufferSize::Fixed(frames_per_buffer))
            }
            SupportedBufferSize::Range { min, max } => {
                warn!(
                    "Buffer size {} outside device range {}..={}, using device default",
                    frames_per_buffer, min, max
                );
                Ok(BufferSize::Default)
            }
            SupportedBufferSize::Unknown => {
                warn!("Device does not report buffer sizes, using device default");
                Ok(BufferSize::Default)
            }
        }
    }

    /// Start the stream, moving `feeder` (and its source) into the callback.
    ///
    /// The feeder is dropped only when the stream is, so the source outlives
    /// every callback invocation.
    pub fn start<R>(&mut self, feeder: SampleFeeder<R>, events: UnboundedSender<StreamEvent>) -> Result<()>
    where
        R: SampleReader + 'static,
    {
        if self.stream.is_some() {
            return Err(Error::AudioOutput("Stream already started".to_string()));
        }

        let source_channels = feeder.format().channels;
        if source_channels != self.config.channels {
            return Err(Error::AudioOutput(format!(
                "Source has {} channel(s) but output is configured for {}",
                source_channels, self.config.channels
            )));
        }

        info!("Starting audio stream");

        let device_events = events.clone();
        let mut feed = StreamFeed::new(feeder, events);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    feed.on_buffer(data);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    let _ = device_events.send(StreamEvent::DeviceError(err.to_string()));
                },
                None, // No timeout
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);

        info!("Audio stream started successfully");
        Ok(())
    }

    /// Stop audio playback.
    ///
    /// Pauses the stream, then drops it. Dropping closes the stream and
    /// releases the feeder and source it owns.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio stream");
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to stop stream: {}", e)))?;
            drop(stream);
        }

        Ok(())
    }

    /// Get sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Frames per callback, if a fixed size was negotiated.
    pub fn buffer_size(&self) -> Option<u32> {
        match self.config.buffer_size {
            BufferSize::Fixed(size) => Some(size),
            BufferSize::Default => None,
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        // Ensure stream is stopped on drop
        if let Err(e) = self.stop() {
            warn!("Failed to stop stream on drop: {}", e);
        }
    }
}
