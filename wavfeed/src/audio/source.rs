//! Playback source: decoding handle plus format metadata
//!
//! The feeder pulls samples through the [`SampleReader`] trait, so the
//! callback logic can be exercised against in-memory data as well as real
//! files. [`SymphoniaReader`] is the file-backed implementation.
//!
//! Reader contract:
//! - `Ok(n)` with `n < out.len()` only at genuine end of stream
//! - `Err(_)` for I/O or container faults; contents of `out` are unspecified
//! - reads are sequential; there is no seek or rewind

use crate::audio::types::SourceFormat;
use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Sequential source of interleaved f32 samples.
pub trait SampleReader: Send {
    /// Decode up to `out.len()` consecutive samples into `out`.
    ///
    /// Returns the number of samples written.
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize>;

    /// Corrupt packets dropped so far
    fn skipped_packets(&self) -> u64 {
        0
    }
}

/// Map a failed `Decoder::decode` call to a fatal error.
///
/// Returns `None` for a corrupt packet, which is dropped while decoding
/// continues with the next one.
fn decode_failure(err: SymphoniaError) -> Option<Error> {
    match err {
        SymphoniaError::DecodeError(msg) => {
            debug!("Skipping corrupt packet: {}", msg);
            None
        }
        e => Some(Error::Decode(format!("Decode failed: {}", e))),
    }
}

/// Streaming decoder over an audio file using symphonia.
///
/// Decodes one packet at a time and hands out its samples across as many
/// reads as needed. The interleaving buffer is reused between packets and
/// only grows when a packet is larger than any seen before.
pub struct SymphoniaReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    pending: Option<SampleBuffer<f32>>,
    cursor: usize,
    finished: bool,
    skipped_packets: u64,
}

impl SymphoniaReader {
    /// Open an audio file and read its format header.
    ///
    /// # Errors
    /// - File cannot be opened
    /// - Unsupported container or codec
    /// - Sample rate or channel count missing from the header
    pub fn open(path: &Path) -> Result<(Self, SourceFormat)> {
        debug!("Opening source: {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("Failed to open file {}: {}", path.display(), e)))?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params
            .sample_rate
            .filter(|rate| *rate > 0)
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .filter(|count| *count > 0)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        let source_format = SourceFormat {
            channels,
            sample_rate,
            total_frames: codec_params.n_frames,
        };

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        debug!(
            "Source format: sample_rate={}, channels={}, frames={:?}",
            sample_rate, channels, source_format.total_frames
        );

        Ok((
            Self {
                format,
                decoder,
                track_id,
                pending: None,
                cursor: 0,
                finished: false,
                skipped_packets: 0,
            },
            source_format,
        ))
    }

    fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, |buf| buf.len())
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns `Ok(false)` at end of stream.
    fn decode_next_packet(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(false);
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Failed to read packet: {}", e)));
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let needed = decoded.capacity() * spec.channels.count();
                    if self.pending.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                        self.pending = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                    }
                    if let Some(buf) = self.pending.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                    }
                    self.cursor = 0;
                    if self.pending_len() > 0 {
                        return Ok(true);
                    }
                }
                Err(e) => match decode_failure(e) {
                    None => self.skipped_packets += 1,
                    Some(fatal) => return Err(fatal),
                },
            }
        }
    }
}

impl SampleReader for SymphoniaReader {
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        let mut written = 0;

        while written < out.len() {
            if self.cursor >= self.pending_len() {
                if self.finished || !self.decode_next_packet()? {
                    break;
                }
            }

            if let Some(buf) = self.pending.as_ref() {
                let available = &buf.samples()[self.cursor..];
                let count = available.len().min(out.len() - written);
                out[written..written + count].copy_from_slice(&available[..count]);
                self.cursor += count;
                written += count;
            }
        }

        Ok(written)
    }

    fn skipped_packets(&self) -> u64 {
        self.skipped_packets
    }
}

/// Reader over samples already held in memory.
///
/// Used for tests and benchmarks; behaves like a file that ends after the
/// last sample.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    samples: Vec<f32>,
    position: usize,
}

impl MemoryReader {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples, position: 0 }
    }

    /// Samples not yet read
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl SampleReader for MemoryReader {
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        let count = self.remaining().min(out.len());
        out[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }
}

/// Decoding handle plus format metadata for one file being played.
///
/// Owned exclusively by one playback session; moved into the output
/// stream's callback and released when that stream is dropped.
pub struct PlaybackSource<R = SymphoniaReader> {
    reader: R,
    format: SourceFormat,
}

impl PlaybackSource<SymphoniaReader> {
    /// Open an audio file for sequential playback.
    pub fn open(path: &Path) -> Result<Self> {
        let (reader, format) = SymphoniaReader::open(path)?;
        Ok(Self::new(reader, format))
    }
}

impl PlaybackSource<MemoryReader> {
    /// Source over interleaved in-memory samples.
    ///
    /// # Panics
    /// Panics if `channels` is zero.
    pub fn from_samples(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        assert!(channels > 0, "channel count must be positive");
        let format = SourceFormat {
            channels,
            sample_rate,
            total_frames: Some((samples.len() / channels as usize) as u64),
        };
        Self::new(MemoryReader::new(samples), format)
    }
}

impl<R: SampleReader> PlaybackSource<R> {
    pub fn new(reader: R, format: SourceFormat) -> Self {
        Self { reader, format }
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn into_reader(self) -> R {
        self.reader
    }

    /// Decode up to `out.len()` samples, advancing the read position.
    pub fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        self.reader.read_samples(out)
    }
}
