//! # wavfeed
//!
//! Streams a decoded audio file to the default output device through a
//! callback-driven playback loop.
//!
//! **Architecture:** symphonia decodes the file on a decoder thread into a
//! lock-free prefetch buffer. Inside the cpal output callback the
//! [`audio::feeder::SampleFeeder`] fills each buffer the device requests
//! from that prefetch buffer, pads the final one with silence, and reports completion
//! back to the [`playback::PlaybackSession`] that owns the stream.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
