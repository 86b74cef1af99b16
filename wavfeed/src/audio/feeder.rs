//! Sample feeder: fills output buffers from the playback source
//!
//! Invoked once per device buffer request on the real-time audio thread.
//! Each call reads up to `frames × channels` samples from the source into the
//! device buffer, pads a short final buffer with silence, and reports whether
//! more buffers will follow.
//!
//! **Guarantees:**
//! - The output buffer is fully written on every call, in every branch
//! - The source is only ever read forward; no sample is decoded twice
//! - No allocation, locking, or logging while the source has samples; with
//!   a [`PrefetchReader`](crate::audio::prefetch::PrefetchReader) source the
//!   callback only copies out of a lock-free buffer
//!
//! **State machine:** `Streaming → Complete` on the first short read, or
//! `Streaming → Failed` on a read error. Both are terminal: later calls
//! write silence and return [`FeedStatus::Complete`] without touching the
//! source.

use crate::audio::source::{PlaybackSource, SampleReader, SymphoniaReader};
use crate::audio::types::{FeedStats, FeedStatus, SourceFormat};
use crate::error::Result;
use serde::Deserialize;

/// What to do when the source reports a read error (as opposed to a clean
/// end of stream).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeErrorPolicy {
    /// Surface the error; the session stops and exits with failure
    #[default]
    Abort,
    /// Treat the error like end of stream: pad with silence and complete
    EndOfStream,
}

/// Feeder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    /// Reading from the source
    Streaming,
    /// Source ran out; every later call is silence
    Complete,
    /// Source read failed; every later call is silence
    Failed,
}

/// Fills device buffers from an exclusively owned [`PlaybackSource`].
pub struct SampleFeeder<R = SymphoniaReader> {
    source: PlaybackSource<R>,
    channels: usize,
    policy: DecodeErrorPolicy,
    state: FeederState,
    stats: FeedStats,
}

impl<R: SampleReader> SampleFeeder<R> {
    pub fn new(source: PlaybackSource<R>, policy: DecodeErrorPolicy) -> Self {
        let channels = source.channels().max(1) as usize;
        Self {
            source,
            channels,
            policy,
            state: FeederState::Streaming,
            stats: FeedStats::default(),
        }
    }

    /// Fill one interleaved output buffer.
    ///
    /// The requested frame count is `out.len() / channels`. Samples past the
    /// last whole frame, if any, are written as silence.
    ///
    /// # Returns
    /// - `Ok(Continue)`: `frames × channels` samples were decoded
    /// - `Ok(Complete)`: the source ran out (or already had); the rest of the
    ///   buffer is silence
    /// - `Err(_)`: the source failed under [`DecodeErrorPolicy::Abort`]; the
    ///   whole buffer is silence and the feeder is now `Failed`
    pub fn fill(&mut self, out: &mut [f32]) -> Result<FeedStatus> {
        self.stats.callbacks += 1;

        if self.state != FeederState::Streaming {
            self.pad(out, 0);
            return Ok(FeedStatus::Complete);
        }

        let total = (out.len() / self.channels) * self.channels;
        if total == 0 {
            self.pad(out, 0);
            return Ok(FeedStatus::Continue);
        }

        match self.source.read_samples(&mut out[..total]) {
            Ok(read) => {
                let read = read.min(total);
                self.stats.samples_decoded += read as u64;
                self.pad(out, read);

                if read < total {
                    self.state = FeederState::Complete;
                    Ok(FeedStatus::Complete)
                } else {
                    Ok(FeedStatus::Continue)
                }
            }
            Err(e) => {
                self.pad(out, 0);
                self.state = FeederState::Failed;
                match self.policy {
                    DecodeErrorPolicy::Abort => Err(e),
                    DecodeErrorPolicy::EndOfStream => Ok(FeedStatus::Complete),
                }
            }
        }
    }

    /// Write silence from `from` to the end of `out`.
    fn pad(&mut self, out: &mut [f32], from: usize) {
        let silence = &mut out[from..];
        silence.fill(0.0);
        self.stats.samples_padded += silence.len() as u64;
    }

    pub fn state(&self) -> FeederState {
        self.state
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn format(&self) -> SourceFormat {
        self.source.format()
    }

    pub fn source(&self) -> &PlaybackSource<R> {
        &self.source
    }
}
