//! planescope - Main entry point
//!
//! Replays a tracking session and renders every detected plane as a mesh
//! colored by its surface classification.

mod config;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use planescope_core::Recording;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "planescope")]
#[command(about = "Detected-plane visualizer")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "planescope.toml")]
    config: PathBuf,

    /// Recorded session to replay (overrides the config)
    #[arg(short, long)]
    recording: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Playback speed multiplier
    #[arg(long)]
    rate: Option<f32>,

    /// Restart the recording when it ends
    #[arg(long = "loop")]
    looping: bool,

    /// Write the built-in demo recording to a file and exit
    #[arg(long)]
    write_demo: Option<PathBuf>,

    /// Write a default configuration file and exit
    #[arg(long)]
    write_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("planescope v{}", env!("CARGO_PKG_VERSION"));

    if let Some(path) = args.write_demo {
        Recording::demo()
            .save(&path)
            .with_context(|| format!("writing demo recording to {}", path.display()))?;
        info!(path = %path.display(), "Wrote demo recording");
        return Ok(());
    }

    if let Some(path) = args.write_config {
        config::save_default_config(&path)?;
        info!(path = %path.display(), "Wrote default configuration");
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    if let Some(recording) = args.recording {
        config.session.recording = Some(recording);
    }
    if let Some(rate) = args.rate {
        config.session.playback_rate = rate;
    }
    if args.looping {
        config.session.looping = true;
    }

    let recording = match &config.session.recording {
        Some(path) => Recording::from_file(path)
            .with_context(|| format!("loading recording {}", path.display()))?,
        None => Recording::demo(),
    };

    info!(
        recording = %recording.name,
        steps = recording.steps.len(),
        duration_ms = recording.duration_ms(),
        rate = config.session.playback_rate,
        looping = config.session.looping,
        "Configuration loaded"
    );

    let exit = view::run(&config, recording);
    if let bevy::app::AppExit::Error(code) = exit {
        anyhow::bail!("viewer exited with code {code}");
    }

    Ok(())
}
