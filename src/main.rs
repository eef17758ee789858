//! Cadence - a background audio player driven by synchronous commands.
//!
//! The player subsystem runs decoding and device output on a worker thread;
//! the CLI acts as its command dispatcher.

pub mod cli;
pub mod config;
pub mod error;
pub mod metadata;
pub mod model;
pub mod player;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("cadence=info".parse()?))
        .init();

    cli::run_command(&args)
}
