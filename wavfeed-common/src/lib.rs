//! # wavfeed Common Library
//!
//! Shared code for the wavfeed workspace:
//! - Error type
//! - Configuration file discovery and loading
//! - Logging configuration and tracing initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
