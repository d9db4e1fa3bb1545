//! mrmctl - command-line interface for the model resource manager

use anyhow::Result;
use clap::{Parser, Subcommand};
use mrm_core::Config;
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod output;
mod scenario;

use output::{OutputFormat, OutputFormatter};

/// Inspect and exercise the model resource manager
#[derive(Debug, Parser)]
#[command(name = "mrmctl")]
#[command(about = "Inspect and exercise the model resource manager")]
#[command(version)]
pub struct Cli {
    /// Configuration file path (defaults to MRM_CONFIG, ./mrm.yaml, /etc/mrm/config.yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Enable JSON output (overrides --output)
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a scenario of loader events against simulated unloaders
    Simulate {
        /// Scenario file (YAML)
        scenario: PathBuf,
    },

    /// List the configured model catalog
    Catalog,

    /// Query the configured hardware backend
    Probe,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Check a configuration file
    Validate {
        file: PathBuf,
    },

    /// Write the default configuration
    Init {
        #[arg(default_value = "mrm.yaml")]
        file: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    mrm_coordinator::init_logging(&config.logging)?;

    debug!("Starting mrmctl with {:?}", cli);

    let output_format = if cli.json {
        OutputFormat::Json
    } else {
        cli.output
    };
    let formatter = OutputFormatter::new(output_format);

    match cli.command {
        Commands::Simulate { scenario } => {
            commands::simulate::run_simulation(config, &scenario, &formatter).await?;
        }
        Commands::Catalog => {
            commands::catalog::list_catalog(&config, &formatter)?;
        }
        Commands::Probe => {
            commands::probe::probe_hardware(&config.hardware, &formatter)?;
        }
        Commands::Config { action } => {
            commands::config::handle_config_command(&config, action, &formatter)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["mrmctl", "simulate", "demos/swap.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Simulate { .. }));

        let cli = Cli::try_parse_from(["mrmctl", "config", "init", "--force"]).unwrap();
        match cli.command {
            Commands::Config {
                action: ConfigCommands::Init { file, force },
            } => {
                assert_eq!(file, PathBuf::from("mrm.yaml"));
                assert!(force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_output_format() {
        let cli = Cli::try_parse_from(["mrmctl", "--json", "catalog"]).unwrap();
        assert!(cli.json);

        let cli = Cli::try_parse_from(["mrmctl", "--output", "yaml", "probe"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Yaml);
    }
}
