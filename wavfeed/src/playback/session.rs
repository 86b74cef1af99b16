//! Playback session
//!
//! Owns the output stream for one file and sequences its lifecycle:
//!
//! 1. Open the source, read its format, and prime the prefetch buffer
//! 2. Bind the output device with a matching channel count
//! 3. Start the stream (the feeder moves into the audio callback)
//! 4. Wait for the feeder's completion event, a fault, the duration
//!    deadline, or a shutdown request
//! 5. Stop, then close the stream; the source is released with it
//! 6. Join the decoder thread
//!
//! The duration deadline (`frames / sample_rate` plus a grace period) is
//! only a backstop. The completion event is the real end-of-playback signal.

use crate::audio::feeder::SampleFeeder;
use crate::audio::output::AudioOutput;
use crate::audio::prefetch::{DecoderHandle, PrefetchReader};
use crate::audio::source::PlaybackSource;
use crate::audio::types::{FeedStats, SourceFormat, StreamEvent};
use crate::config::PlayerConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

/// How a playback session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The feeder reported Complete
    Finished(FeedStats),
    /// No completion event before the duration deadline
    DeadlineElapsed,
    /// Shutdown requested (Ctrl+C / SIGTERM)
    Interrupted,
}

/// Deadline for the completion wait: estimated duration plus `grace`.
///
/// `None` when the file does not declare its length.
pub fn completion_deadline(format: &SourceFormat, output_rate: u32, grace: Duration) -> Option<Duration> {
    format.duration_at(output_rate).map(|duration| duration + grace)
}

/// Time for the device to play out buffers already handed to it.
pub fn drain_time(frames_per_buffer: u32, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(2.0 * frames_per_buffer as f64 / sample_rate as f64)
}

/// Wait for the first terminal event of a running stream.
///
/// # Returns
/// - `Ok(Finished)` on the feeder's Complete event
/// - `Ok(DeadlineElapsed)` if `deadline` passes first
/// - `Ok(Interrupted)` if `shutdown` resolves first
/// - `Err` on a decode failure, device error, or if every sender is gone
pub async fn await_completion<S>(
    events: &mut UnboundedReceiver<StreamEvent>,
    deadline: Option<Duration>,
    shutdown: S,
) -> Result<Completion>
where
    S: Future<Output = ()>,
{
    let deadline_elapsed = async {
        match deadline {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        event = events.recv() => match event {
            Some(StreamEvent::Complete(stats)) => Ok(Completion::Finished(stats)),
            Some(StreamEvent::DecodeFailed(e)) => Err(e),
            Some(StreamEvent::DeviceError(msg)) => Err(Error::AudioOutput(msg)),
            None => Err(Error::Playback(
                "Audio stream closed before playback completed".to_string(),
            )),
        },
        _ = deadline_elapsed => Ok(Completion::DeadlineElapsed),
        _ = shutdown => Ok(Completion::Interrupted),
    }
}

/// One playback of one file.
pub struct PlaybackSession {
    output: AudioOutput,
    feeder: Option<SampleFeeder<PrefetchReader>>,
    decoder: DecoderHandle,
    format: SourceFormat,
    completion_grace: Duration,
    frames_per_buffer: u32,
}

impl PlaybackSession {
    /// Open `path`, start decoding ahead, and bind the default output device.
    ///
    /// # Errors
    /// - Source cannot be opened or probed
    /// - Configured channel count does not match the source
    /// - Decoder thread cannot be spawned
    /// - Output device unavailable or unable to play the configuration
    pub fn open(path: &Path, config: &PlayerConfig) -> Result<Self> {
        let source = PlaybackSource::open(path)?;
        let format = source.format();

        info!(
            "Source {}: sample_rate={} Hz, channels={}, frames={}",
            path.display(),
            format.sample_rate,
            format.channels,
            format
                .total_frames
                .map_or_else(|| "unknown".to_string(), |frames| frames.to_string())
        );

        let channels = config.output.resolve_channels(format.channels)?;
        let sample_rate = config.output.sample_rate;
        if format.sample_rate != sample_rate {
            warn!(
                "Source sample rate {} Hz differs from output rate {} Hz; playback speed will change",
                format.sample_rate, sample_rate
            );
        }

        let capacity = config
            .playback
            .prefetch_samples(&format, config.output.frames_per_buffer);
        let (source, decoder) = source.prefetch(capacity)?;

        let output = AudioOutput::open(channels, sample_rate, config.output.frames_per_buffer)?;
        let feeder = SampleFeeder::new(source, config.playback.decode_errors);

        Ok(Self {
            output,
            feeder: Some(feeder),
            decoder,
            format,
            completion_grace: config.playback.completion_grace(),
            frames_per_buffer: config.output.frames_per_buffer,
        })
    }

    /// Start the output stream.
    ///
    /// Returns the receiving end of the stream's event channel. The only
    /// sender lives in the stream, so the channel closes when it is dropped.
    pub fn start(&mut self) -> Result<UnboundedReceiver<StreamEvent>> {
        let feeder = self
            .feeder
            .take()
            .ok_or_else(|| Error::Playback("Session already started".to_string()))?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.output.start(feeder, events_tx)?;
        Ok(events_rx)
    }

    /// Start playback, wait for it to end, and tear the stream down.
    ///
    /// The stream is always stopped and the decoder thread joined before
    /// returning, on success and on every error path. A stop failure is
    /// reported unless an earlier error already is.
    pub async fn play<S>(mut self, shutdown: S) -> Result<Completion>
    where
        S: Future<Output = ()>,
    {
        let mut events = self.start()?;

        let deadline = completion_deadline(&self.format, self.output.sample_rate(), self.completion_grace);
        debug!("Completion deadline: {:?}", deadline);

        let outcome = await_completion(&mut events, deadline, shutdown).await;

        match &outcome {
            Ok(Completion::Finished(stats)) => {
                info!(
                    "Playback complete: {} callbacks, {} samples decoded, {} samples padded",
                    stats.callbacks, stats.samples_decoded, stats.samples_padded
                );
                let frames = self.output.buffer_size().unwrap_or(self.frames_per_buffer);
                tokio::time::sleep(drain_time(frames, self.output.sample_rate())).await;
            }
            Ok(Completion::DeadlineElapsed) => {
                warn!("No completion signal before the estimated duration elapsed, stopping");
            }
            Ok(Completion::Interrupted) => {
                info!("Playback interrupted");
            }
            Err(e) => {
                error!("Playback aborted: {}", e);
            }
        }

        let stopped = self.output.stop();
        self.decoder.stop();

        let decoder = self.decoder.stats();
        info!(
            "Decoder: {} samples buffered, {} corrupt packets skipped, {} underruns",
            decoder.samples_buffered, decoder.skipped_packets, decoder.underruns
        );
        if decoder.underruns > 0 {
            warn!("Output callback ran ahead of the decoder {} time(s)", decoder.underruns);
        }

        let completion = outcome?;
        stopped?;
        Ok(completion)
    }
}
