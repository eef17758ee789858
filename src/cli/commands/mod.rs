//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `play`: Playback through the player subsystem, device listing
//! - `tags`: Generic tag scanning
//! - `settings`: Config file inspection and initialization

mod play;
mod settings;
mod tags;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::OutputKind;

pub use play::{PlayOptions, cmd_devices, cmd_play};
pub use settings::cmd_config;
pub use tags::cmd_tags;

/// Cadence CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Play files or directories in order
    Play {
        /// Files or directories to play (directories are scanned recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Start the first song at this position (seconds)
        #[arg(long)]
        seek: Option<f64>,
        /// Software volume (0-1000)
        #[arg(long)]
        volume: Option<u32>,
        /// Crossfade length in seconds
        #[arg(long)]
        crossfade: Option<f32>,
        /// Output backend
        #[arg(long, value_enum)]
        output: Option<OutputKind>,
        /// Output device name (or set CADENCE_DEVICE env var)
        #[arg(long, env = "CADENCE_DEVICE")]
        device: Option<String>,
    },
    /// Show APE / ID3v2 tags of a file
    Tags {
        /// Path to the audio file
        path: PathBuf,
        /// Print the collected tag as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the config file location and effective settings
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,
    },
    /// List audio output devices
    Devices,
}

/// Run the parsed command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Play {
            paths,
            seek,
            volume,
            crossfade,
            output,
            device,
        } => cmd_play(
            paths,
            &PlayOptions {
                seek: *seek,
                volume: *volume,
                crossfade: *crossfade,
                output: *output,
                device: device.clone(),
            },
        ),
        Commands::Tags { path, json } => cmd_tags(path, *json),
        Commands::Config { init } => cmd_config(*init),
        Commands::Devices => cmd_devices(),
    }
}
