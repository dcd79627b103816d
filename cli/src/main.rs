use clap::{Parser, Subcommand};
use contact_vault::config::{LogFormat, VaultConfig};
use contact_vault::ContactVault;
use contactctl_cli::commands::{
    self, ConfigArgs, ExportArgs, PurgeArgs, SaveArgs, StationArgs, StatusArgs,
};
use contactctl_cli::error::{self, CliError, Result};
use contactctl_cli::output::{OutputFormat, OutputManager};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "contactctl")]
#[command(about = "contactctl - Record and export point-of-sale visit data")]
#[command(version)]
#[command(long_about = "
contactctl records customer visits into per-day encrypted archives, purges
archives older than the retention window and exports all retained records for
a supervisor holding the encryption key.

Examples:
  contactctl save                                  # Prompt for a visit and store it
  contactctl save --name \"Jane Doe\" --phone 5551234567
  contactctl export                                # Export every record to CSV
  contactctl purge --dry-run                       # Show what retention would delete
  contactctl status --format json                  # Machine-readable status
  contactctl station                               # Long-running till mode
")]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "CONTACT_VAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the data directory (overrides config file)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormatArg,

    /// Log level (overrides config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Write console logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum OutputFormatArg {
    Table,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Table => OutputFormat::Table,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Record a customer visit
    Save(SaveArgs),

    /// Export all retained records to a CSV file
    Export(ExportArgs),

    /// Delete files past the retention window
    Purge(PurgeArgs),

    /// Show key, storage and retention status
    Status(StatusArgs),

    /// Manage contact vault configuration
    Config(ConfigArgs),

    /// Run an interactive till session
    Station(StationArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_command(cli).await {
        if !e.is_reported() {
            eprintln!("{}", error::format_error(&e));
        }
        process::exit(e.exit_code());
    }
}

async fn run_command(cli: Cli) -> Result<()> {
    let resolved = resolve_config_path(&cli);
    let mut config = load_config(resolved.as_ref())?;
    let config_path = resolved.map(|(path, _)| path);

    if let Some(base_dir) = &cli.base_dir {
        config.storage.base_dir = base_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }

    // Held until exit so buffered file logs are flushed
    let _log_guard = match contact_vault::logging::init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };

    let colored = !cli.no_color && console::Term::stdout().features().colors_supported();
    let output = OutputManager::new(OutputFormat::from(cli.format), colored);

    let result = match cli.command {
        Commands::Config(args) => {
            commands::config::run(args, &config, config_path.as_deref(), &output)
        }
        Commands::Save(args) => commands::save::run(args, &open_vault(config)?, &output),
        Commands::Export(args) => commands::export::run(args, &open_vault(config)?, &output),
        Commands::Purge(args) => commands::purge::run(args, &open_vault(config)?, &output),
        Commands::Status(args) => commands::status::run(args, &open_vault(config)?, &output),
        Commands::Station(args) => {
            commands::station::run(args, open_vault(config)?, output).await
        }
    };

    if let Some(e) = result.as_ref().err().and_then(CliError::vault_error) {
        tracing::error!(
            category = e.category(),
            key_problem = e.is_key_problem(),
            error = %e,
            "Command failed"
        );
    }

    result
}

/// The active configuration path and whether the user named it
fn resolve_config_path(cli: &Cli) -> Option<(PathBuf, bool)> {
    if let Some(path) = &cli.config {
        return Some((path.clone(), true));
    }

    match VaultConfig::default_config_path() {
        Ok(path) => Some((path, false)),
        Err(e) => {
            tracing::debug!(error = %e, "No default configuration location");
            None
        }
    }
}

/// An explicitly named file must exist; the default location is optional
fn load_config(path: Option<&(PathBuf, bool)>) -> Result<VaultConfig> {
    if let Some((path, true)) = path {
        if !path.exists() {
            return Err(CliError::Config(contact_vault::ConfigError::FileNotFound {
                path: path.display().to_string(),
            }));
        }
    }

    Ok(VaultConfig::load_layered(path.map(|(p, _)| p))?)
}

fn open_vault(config: VaultConfig) -> Result<ContactVault> {
    Ok(ContactVault::open(config)?)
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
        let cli = Cli::try_parse_from(["contactctl", "purge", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Commands::Purge(PurgeArgs { dry_run: true })));

        let cli = Cli::try_parse_from([
            "contactctl",
            "--format",
            "json",
            "save",
            "--name",
            "Jane Doe",
            "--phone",
            "5551234567",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormatArg::Json));
        let Commands::Save(args) = cli.command else {
            panic!("expected save");
        };
        assert_eq!(args.name.as_deref(), Some("Jane Doe"));

        assert!(Cli::try_parse_from(["contactctl", "save", "--phone", "555"]).is_err());
    }
}
