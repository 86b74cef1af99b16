//! Decoder thread and lock-free prefetch buffer
//!
//! Decoding (file reads, packet allocation inside symphonia) happens on a
//! dedicated thread. The thread pushes interleaved samples into a `ringbuf`
//! SPSC buffer; the audio callback only drains it through [`PrefetchReader`].
//!
//! ```text
//! SymphoniaReader → decoder thread → HeapRb<f32> → PrefetchReader → SampleFeeder
//! ```
//!
//! The buffer is primed on the calling thread before the decoder thread
//! starts, so a file shorter than the buffer is entirely resident before the
//! first callback.
//!
//! End of stream and read errors travel as a state flag published with
//! Release ordering after the last push. The consumer re-drains after
//! observing a terminal state, so no sample is lost at the boundary.

use crate::audio::source::{PlaybackSource, SampleReader};
use crate::error::{Error, Result};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use ringbuf::traits::Producer as _;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Samples decoded per producer step
const DECODE_CHUNK: usize = 4096;

/// Producer back-off when the buffer is full
const FULL_BACKOFF: Duration = Duration::from_millis(2);

const STATE_RUNNING: u8 = 0;
const STATE_FINISHED: u8 = 1;
const STATE_FAILED: u8 = 2;

/// Counters shared between the decoder thread and the audio callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Samples pushed into the prefetch buffer
    pub samples_buffered: u64,
    /// Corrupt packets the decoder dropped
    pub skipped_packets: u64,
    /// Callbacks that found the buffer empty while decoding was still running
    pub underruns: u64,
}

struct Shared {
    state: AtomicU8,
    stop: AtomicBool,
    error: Mutex<Option<Error>>,
    samples_buffered: AtomicU64,
    skipped_packets: AtomicU64,
    underruns: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_RUNNING),
            stop: AtomicBool::new(false),
            error: Mutex::new(None),
            samples_buffered: AtomicU64::new(0),
            skipped_packets: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
        }
    }

    fn stats(&self) -> DecoderStats {
        DecoderStats {
            samples_buffered: self.samples_buffered.load(Ordering::Relaxed),
            skipped_packets: self.skipped_packets.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }

    fn fail(&self, e: Error) {
        if let Ok(mut slot) = self.error.lock() {
            *slot = Some(e);
        }
        self.state.store(STATE_FAILED, Ordering::Release);
    }
}

/// Producer side: the decoding reader plus the ring buffer's write half.
struct Producer<R> {
    reader: R,
    prod: HeapProd<f32>,
    scratch: Vec<f32>,
    shared: Arc<Shared>,
}

impl<R: SampleReader> Producer<R> {
    /// Decode into free buffer space once.
    ///
    /// Returns `false` when the stream reached a terminal state.
    fn step(&mut self) -> bool {
        let want = self.prod.vacant_len().min(self.scratch.len());
        if want == 0 {
            return true;
        }

        let result = self.reader.read_samples(&mut self.scratch[..want]);
        self.shared
            .skipped_packets
            .store(self.reader.skipped_packets(), Ordering::Relaxed);

        match result {
            Ok(read) => {
                let pushed = self.prod.push_slice(&self.scratch[..read]);
                debug_assert_eq!(pushed, read);
                self.shared.samples_buffered.fetch_add(pushed as u64, Ordering::Relaxed);
                if read < want {
                    self.shared.state.store(STATE_FINISHED, Ordering::Release);
                    return false;
                }
                true
            }
            Err(e) => {
                self.shared.fail(e);
                false
            }
        }
    }

    /// Fill the buffer until it is full or the stream ends.
    fn prime(&mut self) -> bool {
        while self.prod.vacant_len() > 0 {
            if !self.step() {
                return false;
            }
        }
        true
    }

    fn run(mut self) {
        while !self.shared.stop.load(Ordering::Relaxed) {
            if self.prod.is_full() {
                thread::sleep(FULL_BACKOFF);
                continue;
            }
            if !self.step() {
                break;
            }
        }
        debug!("Decoder thread exiting");
    }
}

/// Callback-side reader draining the prefetch buffer.
///
/// Never blocks, locks, or allocates while samples are available. An
/// underrun (buffer empty while decoding continues) is written as silence
/// and counted.
pub struct PrefetchReader {
    cons: HeapCons<f32>,
    shared: Arc<Shared>,
}

impl SampleReader for PrefetchReader {
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        let mut written = self.cons.pop_slice(out);
        if written == out.len() {
            return Ok(written);
        }

        let state = self.shared.state.load(Ordering::Acquire);
        // Samples pushed before the state change are visible now
        written += self.cons.pop_slice(&mut out[written..]);

        match state {
            STATE_RUNNING => {
                if written < out.len() {
                    out[written..].fill(0.0);
                    self.shared.underruns.fetch_add(1, Ordering::Relaxed);
                }
                Ok(out.len())
            }
            STATE_FINISHED => Ok(written),
            _ if written == out.len() => Ok(written),
            _ => {
                let taken = self.shared.error.try_lock().ok().and_then(|mut slot| slot.take());
                Err(taken.unwrap_or_else(|| Error::Decode("Decoder thread failed".to_string())))
            }
        }
    }

    fn skipped_packets(&self) -> u64 {
        self.shared.skipped_packets.load(Ordering::Relaxed)
    }
}

/// Owner of the decoder thread.
///
/// Stopping (or dropping) the handle signals the thread and joins it.
pub struct DecoderHandle {
    thread: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl DecoderHandle {
    pub fn stats(&self) -> DecoderStats {
        self.shared.stats()
    }

    /// Signal the decoder thread to exit and wait for it.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Decoder thread panicked");
            }
        }
    }
}

impl Drop for DecoderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R: SampleReader + 'static> PlaybackSource<R> {
    /// Move decoding onto a background thread behind a buffer of
    /// `capacity` samples.
    ///
    /// The buffer is filled before this returns. The decoder thread is only
    /// spawned if the stream has not already ended.
    ///
    /// # Errors
    /// - `capacity` is smaller than one frame
    /// - The decoder thread cannot be spawned
    pub fn prefetch(self, capacity: usize) -> Result<(PlaybackSource<PrefetchReader>, DecoderHandle)> {
        let format = self.format();
        let channels = format.channels.max(1) as usize;
        // Round down to whole frames
        let requested = capacity;
        let capacity = capacity / channels * channels;
        if capacity == 0 {
            return Err(Error::Config(format!(
                "Prefetch buffer of {} samples holds no whole {}-channel frame",
                requested, channels
            )));
        }

        let (prod, cons) = HeapRb::<f32>::new(capacity).split();
        let shared = Arc::new(Shared::new());
        let chunk = (DECODE_CHUNK / channels).max(1) * channels;

        let mut producer = Producer {
            reader: self.into_reader(),
            prod,
            scratch: vec![0.0; chunk],
            shared: Arc::clone(&shared),
        };

        let thread = if producer.prime() {
            debug!("Prefetch buffer primed with {} samples, starting decoder thread", capacity);
            Some(
                thread::Builder::new()
                    .name("wavfeed-decoder".to_string())
                    .spawn(move || producer.run())?,
            )
        } else {
            let stats = shared.stats();
            if shared.state.load(Ordering::Acquire) == STATE_FAILED {
                warn!("Source failed while priming after {} samples", stats.samples_buffered);
            } else {
                debug!("Source fully buffered: {} samples", stats.samples_buffered);
            }
            None
        };

        let reader = PrefetchReader {
            cons,
            shared: Arc::clone(&shared),
        };

        Ok((PlaybackSource::new(reader, format), DecoderHandle { thread, shared }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::MemoryReader;
    use crate::audio::types::SourceFormat;

    fn ramp(len: usize) -> Vec<f32> {
        (1..=len).map(|i| i as f32).collect()
    }

    /// Yields `good` samples of 0.5, then fails; reports a fixed skip count
    struct FlakyReader {
        good: usize,
        skipped: u64,
    }

    impl SampleReader for FlakyReader {
        fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
            if out.len() > self.good {
                return Err(Error::Decode("simulated read failure".to_string()));
            }
            out.fill(0.5);
            self.good -= out.len();
            Ok(out.len())
        }

        fn skipped_packets(&self) -> u64 {
            self.skipped
        }
    }

    fn flaky(good: usize, skipped: u64) -> PlaybackSource<FlakyReader> {
        let format = SourceFormat { channels: 1, sample_rate: 48000, total_frames: None };
        PlaybackSource::new(FlakyReader { good, skipped }, format)
    }

    #[test]
    fn test_short_source_is_fully_primed() {
        let source = PlaybackSource::from_samples(ramp(10), 2, 48000);
        let (mut source, decoder) = source.prefetch(64).unwrap();

        assert!(decoder.thread.is_none());
        assert_eq!(decoder.stats().samples_buffered, 10);

        let mut out = [f32::NAN; 8];
        assert_eq!(source.read_samples(&mut out).unwrap(), 8);
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(source.read_samples(&mut out).unwrap(), 2);
        assert_eq!(&out[..2], &[9.0, 10.0]);
        assert_eq!(source.read_samples(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_long_source_streams_in_order() {
        let samples = ramp(50_000);
        let source = PlaybackSource::from_samples(samples.clone(), 2, 48000);
        let (mut source, mut decoder) = source.prefetch(1024).unwrap();

        let mut collected = Vec::with_capacity(samples.len());
        let mut out = [0.0f32; 256];
        loop {
            let read = source.read_samples(&mut out).unwrap();
            collected.extend(out[..read].iter().copied().filter(|s| *s != 0.0));
            if read < out.len() {
                break;
            }
        }
        decoder.stop();

        // Underruns insert silence between chunks but never reorder or drop samples
        assert_eq!(collected, samples);
        assert_eq!(decoder.stats().samples_buffered, 50_000);
    }

    #[test]
    fn test_read_error_surfaces_after_buffered_samples() {
        let shared = Arc::new(Shared::new());
        let (prod, cons) = HeapRb::<f32>::new(8).split();
        let mut producer = Producer {
            reader: FlakyReader { good: 4, skipped: 0 },
            prod,
            scratch: vec![0.0; 4],
            shared: Arc::clone(&shared),
        };
        assert!(producer.step());
        assert!(!producer.step());

        let mut reader = PrefetchReader { cons, shared };
        let mut out = [f32::NAN; 2];
        assert_eq!(reader.read_samples(&mut out).unwrap(), 2);
        assert_eq!(reader.read_samples(&mut out).unwrap(), 2);
        assert_eq!(out, [0.5, 0.5]);

        match reader.read_samples(&mut out) {
            Err(Error::Decode(msg)) => assert_eq!(msg, "simulated read failure"),
            other => panic!("expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_skipped_packets_are_published() {
        let (source, decoder) = flaky(0, 3).prefetch(16).unwrap();

        assert!(decoder.thread.is_none());
        assert_eq!(decoder.stats().skipped_packets, 3);
        assert_eq!(source.reader().skipped_packets(), 3);
    }

    #[test]
    fn test_underrun_writes_silence_and_counts() {
        let shared = Arc::new(Shared::new());
        let (_prod, cons) = HeapRb::<f32>::new(8).split();
        let mut reader = PrefetchReader { cons, shared: Arc::clone(&shared) };

        let mut out = [f32::NAN; 4];
        assert_eq!(reader.read_samples(&mut out).unwrap(), 4);
        assert_eq!(out, [0.0; 4]);
        assert_eq!(shared.stats().underruns, 1);
    }

    #[test]
    fn test_capacity_below_one_frame_is_rejected() {
        let source = PlaybackSource::from_samples(ramp(4), 2, 48000);
        assert!(matches!(source.prefetch(1), Err(Error::Config(_))));
    }

    #[test]
    fn test_stop_joins_running_thread() {
        let source = PlaybackSource::<MemoryReader>::from_samples(ramp(100_000), 1, 48000);
        let (_source, mut decoder) = source.prefetch(128).unwrap();
        assert!(decoder.thread.is_some());

        decoder.stop();
        assert!(decoder.thread.is_none());
    }
}
