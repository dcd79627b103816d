use crate::error::{CliError, Result};
use crate::output::{OutputFormat, OutputManager};
use clap::Args;
use contact_vault::config::{KeySourceConfig, VaultConfig};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration action
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Show configuration file path only
        #[arg(long)]
        path: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path (defaults to the active one)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Write a configuration file with default values
    Init {
        /// Destination (defaults to the active configuration path)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(
    args: ConfigArgs,
    config: &VaultConfig,
    config_path: Option<&Path>,
    output: &OutputManager,
) -> Result<()> {
    match args.action {
        ConfigAction::Show { path } => show_config(config, config_path, path, output),
        ConfigAction::Validate { file } => {
            validate_config(file.as_deref().or(config_path), output)
        }
        ConfigAction::Init { file, force } => {
            init_config(file.as_deref().or(config_path), force, output)
        }
    }
}

fn show_config(
    config: &VaultConfig,
    config_path: Option<&Path>,
    path_only: bool,
    output: &OutputManager,
) -> Result<()> {
    let path = resolve_path(config_path)?;
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }

    let redacted = redacted(config);
    match output.format() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&redacted)?),
        OutputFormat::Table => {
            output.print_info(&format!("Configuration file: {}", path.display()))?;
            println!("{}", toml::to_string_pretty(&redacted)?);
        }
    }
    Ok(())
}

fn validate_config(file: Option<&Path>, output: &OutputManager) -> Result<()> {
    let path = resolve_path(file)?;
    let config = VaultConfig::from_file(&path)?;

    output.print_success(&format!("Configuration is valid: {}", path.display()))?;
    output.print_key_value("storage", &config.storage.storage_dir().display().to_string())?;
    output.print_key_value("key source", key_source_label(&config.key_source))?;
    Ok(())
}

fn init_config(file: Option<&Path>, force: bool, output: &OutputManager) -> Result<()> {
    let path = resolve_path(file)?;
    if path.exists() && !force {
        return Err(CliError::AlreadyExists {
            path: path.display().to_string(),
        });
    }

    VaultConfig::default().save_to_file(&path)?;
    output.print_success(&format!("Wrote default configuration to {}", path.display()))?;
    Ok(())
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(VaultConfig::default_config_path()?),
    }
}

fn key_source_label(source: &KeySourceConfig) -> &'static str {
    match source {
        KeySourceConfig::Env { .. } => "environment variable",
        KeySourceConfig::Datastore { .. } => "datastore",
        KeySourceConfig::Inline { .. } => "inline",
    }
}

/// Copy of `config` that never prints an inline key
fn redacted(config: &VaultConfig) -> VaultConfig {
    let mut copy = config.clone();
    if let KeySourceConfig::Inline { key } = &mut copy.key_source {
        *key = "<redacted>".to_string();
    }
    copy
}
