//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the tier sweep against the configured target
    Run {
        /// Comma separated client counts, one tier each (example: --tiers 10,20,40)
        #[arg(long, value_name = "LIST")]
        tiers: Option<String>,

        /// URL the load is sent to
        #[arg(long, value_name = "URL")]
        target: Option<String>,

        /// Seconds of load per tier
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,

        /// Run against in-memory collaborators instead of the network
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a configuration file
    ValidateConfig,

    /// Print or write a sample configuration
    GenerateConfig {
        /// Output file path; prints to stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
