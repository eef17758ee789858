//! Command-line interface for cadence.
//!
//! This module provides CLI commands for playing files through the player
//! subsystem, inspecting tags, and managing the config file.

mod commands;

pub use commands::{Cli, Commands, run_command};
