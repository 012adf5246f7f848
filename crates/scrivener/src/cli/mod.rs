//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the scrivener binary.

mod commands;
mod simulate;

pub use commands::{Cli, Commands, OutputFormat};
pub use simulate::{SimulateOptions, SimulationReport, render_human, run_simulation};
