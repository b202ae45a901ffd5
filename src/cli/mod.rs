//! CLI module for the dpsync tool.
//!
//! This module provides the command-line interface and the per-device
//! orchestration it drives.

mod commands;
mod output;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
pub use runner::{DeviceReport, RunOptions, RunScope, run_device};
