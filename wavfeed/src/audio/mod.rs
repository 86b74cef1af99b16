//! Audio subsystem: decoding source, prefetch thread, sample feeder, and device output

pub mod feeder;
pub mod output;
pub mod prefetch;
pub mod source;
pub mod types;

pub use feeder::SampleFeeder;
pub use output::AudioOutput;
pub use prefetch::{DecoderHandle, DecoderStats, PrefetchReader};
pub use source::{MemoryReader, PlaybackSource, SampleReader, SymphoniaReader};
pub use types::{FeedStats, FeedStatus, SourceFormat, StreamEvent};
