//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use scrivener::LogFormat;
use std::path::PathBuf;

/// Scrivener - rate limited synthetic text generation
#[derive(Parser, Debug)]
#[command(name = "scrivener")]
#[command(about = "Rate limited synthetic text generation with adaptive backpressure", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra configuration file layered over the defaults
    #[arg(long, global = true, env = "SCRIVENER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format (human or json)
    #[arg(long, global = true, default_value = "human")]
    pub log_format: LogFormat,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fire concurrent generations through the rate limiter and report usage
    Simulate {
        /// Number of generations to run
        #[arg(long, default_value = "20")]
        calls: usize,

        /// Prompt sent with every call
        #[arg(long, default_value = "Write a short customer complaint about a wireless speaker.")]
        prompt: String,

        /// Completion budget per call (defaults to the configured value)
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Run calls without any rate limiting
        #[arg(long)]
        no_rate_limit: bool,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Parse a rate limit reset value such as "1m30s" or "120ms"
    ParseReset {
        /// Value of an x-ratelimit-reset-* header
        value: String,
    },
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
