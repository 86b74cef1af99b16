//! Configuration file discovery and loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in defaults (fallback)
//!
//! Steps 1 and 2 are handled by the binary's argument parser; this module
//! covers locating and parsing the TOML file. Logging is usually not yet
//! initialized when the file is loaded, so the caller receives a
//! [`ConfigSource`] to report once tracing is up.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};

/// Per-user configuration directory name
pub const APP_DIR_NAME: &str = "wavfeed";

/// Configuration file name inside [`APP_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path passed explicitly (CLI flag or environment variable)
    Explicit(PathBuf),
    /// Platform default location
    Default(PathBuf),
    /// No file found, built-in defaults used
    BuiltIn,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(path) => write!(f, "{}", path.display()),
            ConfigSource::Default(path) => write!(f, "{} (default location)", path.display()),
            ConfigSource::BuiltIn => write!(f, "built-in defaults"),
        }
    }
}

/// Configuration value together with its origin
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub config: T,
    pub source: ConfigSource,
}

/// Get default configuration file path for the platform
///
/// Linux: `$XDG_CONFIG_HOME/wavfeed/config.toml` (usually `~/.config/...`).
/// macOS and Windows use the per-user config directory reported by `dirs`.
/// Returns `None` if the platform has no such directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Parse a TOML document, naming `origin` in the error message.
pub fn parse_toml<T: DeserializeOwned>(content: &str, origin: &Path) -> Result<T> {
    toml::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", origin.display(), e)))
}

/// Load a TOML configuration file.
///
/// An explicit path must exist and parse. Without one, the platform default
/// path is tried; a missing default file yields `T::default()`, but a default
/// file that exists and fails to parse is still an error.
pub fn load_toml_config<T>(explicit: Option<&Path>) -> Result<Loaded<T>>
where
    T: DeserializeOwned + Default,
{
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        return Ok(Loaded {
            config: parse_toml(&content, path)?,
            source: ConfigSource::Explicit(path.to_path_buf()),
        });
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            let content = std::fs::read_to_string(&path)?;
            Ok(Loaded {
                config: parse_toml(&content, &path)?,
                source: ConfigSource::Default(path),
            })
        }
        _ => Ok(Loaded {
            config: T::default(),
            source: ConfigSource::BuiltIn,
        }),
    }
}
