//! Playback session: one file, from open to natural completion

pub mod session;

pub use session::{await_completion, Completion, PlaybackSession};
