//! Configuration management commands

use crate::output::OutputFormatter;
use crate::ConfigCommands;
use anyhow::{bail, Context, Result};
use mrm_core::Config;

pub fn handle_config_command(
    config: &Config,
    action: ConfigCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    match action {
        ConfigCommands::Show => formatter.print_document(config)?,
        ConfigCommands::Validate { file } => {
            let loaded = Config::load_from_file(&file)
                .with_context(|| format!("{} is not a valid configuration", file.display()))?;
            formatter.print_success(&format!(
                "{} is valid ({} catalog entries, backend {})",
                file.display(),
                loaded.catalog.len(),
                loaded.hardware.backend
            ))?;
        }
        ConfigCommands::Init { file, force } => {
            if file.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", file.display());
            }
            Config::default().to_file(&file)?;
            formatter.print_success(&format!("Wrote default configuration to {}", file.display()))?;
        }
    }
    Ok(())
}
