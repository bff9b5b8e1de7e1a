//! Hdvault CLI - Command-line interface for hdvault wallet documents.
//!
//! Derives keys, repairs wallet documents, previews receive addresses and manages the
//! remote metadata root record.

pub mod chain;
pub mod commands;
pub mod config;
pub mod output;
pub mod telemetry;
pub mod transport;
#[cfg(test)]
mod tests;

use clap::Parser;
use config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = commands::Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => CliConfig::config_path()?,
    };
    let config = CliConfig::load_from(&config_path)?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    telemetry::init_telemetry(log_level, cli.json_logs || config.json_logs)?;

    if let Err(e) = commands::execute(cli.command, &config, &config_path).await {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
