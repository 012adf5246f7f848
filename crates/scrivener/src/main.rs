//! Scrivener CLI binary.
//!
//! This binary provides command-line access to Scrivener's functionality:
//! - Simulate a batch of generations through the rate limiter
//! - Print the effective configuration
//! - Parse rate limit reset values

use clap::Parser;
use scrivener::{ScrivenerConfig, init_telemetry, parse_reset_duration};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, OutputFormat, SimulateOptions, render_human, run_simulation};

    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let directive = if cli.verbose { "debug" } else { "info" };
    init_telemetry(cli.log_format, directive)?;

    match cli.command {
        Commands::Simulate {
            calls,
            prompt,
            max_tokens,
            no_rate_limit,
            format,
        } => {
            let config = ScrivenerConfig::load_with(cli.config.as_deref())?;
            let report = run_simulation(
                &config,
                SimulateOptions {
                    calls,
                    prompt,
                    max_tokens,
                    no_rate_limit,
                },
            )
            .await?;

            match format {
                OutputFormat::Human => print!("{}", render_human(&report)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }

        Commands::Config => {
            let config = ScrivenerConfig::load_with(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
        }

        Commands::ParseReset { value } => {
            let secs = parse_reset_duration(&value);
            println!("{:.3}s", secs);
        }
    }

    Ok(())
}
