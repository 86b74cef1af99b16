//! wavfeed - Main entry point
//!
//! Plays one audio file through the default output device and exits when
//! playback completes. Exit status is nonzero on any failure to open the
//! file or device, or to start or stop the stream.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use wavfeed::config::{ConfigOverrides, PlayerConfig};
use wavfeed::playback::{Completion, PlaybackSession};

/// Command-line arguments for wavfeed
#[derive(Parser, Debug)]
#[command(name = "wavfeed")]
#[command(about = "Stream an audio file to the default output device")]
#[command(version)]
struct Args {
    /// Audio file to play
    file: PathBuf,

    /// TOML configuration file
    #[arg(short, long, env = "WAVFEED_CONFIG")]
    config: Option<PathBuf>,

    /// Output sample rate in Hz
    #[arg(long, env = "WAVFEED_SAMPLE_RATE")]
    sample_rate: Option<u32>,

    /// Frames per device callback
    #[arg(long, env = "WAVFEED_FRAMES_PER_BUFFER")]
    frames_per_buffer: Option<u32>,

    /// Output channel count (must match the file)
    #[arg(long, env = "WAVFEED_CHANNELS")]
    channels: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WAVFEED_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            sample_rate: self.sample_rate,
            frames_per_buffer: self.frames_per_buffer,
            channels: self.channels,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let loaded = PlayerConfig::load(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;
    let config = loaded.config;

    wavfeed_common::logging::init_tracing(&config.logging, &["wavfeed", "wavfeed_common"])
        .context("Failed to initialize logging")?;

    info!("Starting wavfeed v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", loaded.source);
    info!(
        "Output: sample_rate={} Hz, frames_per_buffer={}, channels={}",
        config.output.sample_rate,
        config.output.frames_per_buffer,
        config
            .output
            .channels
            .map_or_else(|| "source".to_string(), |c| c.to_string())
    );

    let session = PlaybackSession::open(&args.file, &config)
        .with_context(|| format!("Failed to open playback of {}", args.file.display()))?;

    match session.play(shutdown_signal()).await.context("Playback failed")? {
        Completion::Finished(_) => info!("Playback finished"),
        Completion::DeadlineElapsed => info!("Playback stopped at estimated duration"),
        Completion::Interrupted => info!("Playback stopped by signal"),
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
