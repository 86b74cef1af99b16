//! Error types for wavfeed
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the wavfeed library
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Opening or decoding the source file
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device or stream errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback session errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] wavfeed_common::Error),
}

/// Convenience Result type using wavfeed Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert() {
        fn spawn_failure() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::WouldBlock, "no threads left"))?;
            Ok(())
        }

        let err = spawn_failure().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "File I/O error: no threads left");
    }
}
