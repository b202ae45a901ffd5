//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dpsync - Declarative device configuration through the management controller.
#[derive(Parser, Debug)]
#[command(name = "dpsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the desired-state file.
    #[arg(short, long, global = true, env = "DPSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (debug logging).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the desired-state file without contacting the controller.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Preview every change in the file; nothing is sent that mutates.
    Plan {
        /// Only plan for this device.
        #[arg(long)]
        device: Option<String>,
    },

    /// Create, edit and delete resources as described in the file.
    Apply {
        /// Only apply to this device.
        #[arg(long)]
        device: Option<String>,

        /// Leave pending changes uncommitted.
        #[arg(long)]
        no_commit: bool,

        /// The device lock is already held by an enclosing workflow.
        #[arg(long)]
        external_lock: bool,

        /// Lock acquisition attempts.
        #[arg(long, default_value = "1")]
        lock_attempts: u32,
    },

    /// Run the file's dependency-aware deletions.
    Delete {
        /// Only delete on this device.
        #[arg(long)]
        device: Option<String>,

        /// Leave pending changes uncommitted.
        #[arg(long)]
        no_commit: bool,

        /// The device lock is already held by an enclosing workflow.
        #[arg(long)]
        external_lock: bool,
    },

    /// Show resources of one type as the controller reports them.
    Get {
        /// Resource type (e.g. `bdos_profile`, `cl_protection`).
        resource_type: String,

        /// Device to read from (defaults to every device in the file).
        #[arg(long)]
        device: Option<String>,

        /// Only show these names.
        #[arg(long = "key")]
        keys: Vec<String>,
    },

    /// Commit pending configuration on a device.
    Commit {
        /// Device address.
        #[arg(long)]
        device: String,

        /// The device lock is already held by an enclosing workflow.
        #[arg(long)]
        external_lock: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::try_parse_from([
            "dpsync",
            "-c",
            "site.yaml",
            "apply",
            "--no-commit",
            "--external-lock",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("site.yaml")));
        match cli.command {
            Commands::Apply {
                no_commit,
                external_lock,
                lock_attempts,
                device,
            } => {
                assert!(no_commit);
                assert!(external_lock);
                assert_eq!(lock_attempts, 1);
                assert!(device.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_get_keys() {
        let cli = Cli::try_parse_from([
            "dpsync", "--output", "json", "get", "cl_protection", "--key", "p1", "--key", "p2",
        ])
        .unwrap();
        assert!(matches!(cli.output, OutputFormat::Json));
        match cli.command {
            Commands::Get {
                resource_type, keys, ..
            } => {
                assert_eq!(resource_type, "cl_protection");
                assert_eq!(keys, vec!["p1".to_string(), "p2".to_string()]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
