use crate::error::Result;
use crate::output::{OutputFormat, OutputManager};
use chrono::Utc;
use clap::Args;
use contact_vault::{ContactVault, RETENTION_WINDOW_DAYS};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Exit with a non-zero code when no encryption key is configured
    #[arg(long)]
    pub require_key: bool,
}

#[derive(Serialize)]
struct StatusView {
    key_configured: bool,
    key_source: String,
    storage_dir: String,
    storage_exists: bool,
    archives: usize,
    oldest_day: Option<String>,
    newest_day: Option<String>,
    due_for_purge: usize,
    retention_days: i64,
}

pub fn run(args: StatusArgs, vault: &ContactVault, output: &OutputManager) -> Result<()> {
    let status = vault.status(Utc::now()).map_err(contact_vault::VaultError::from)?;

    let view = StatusView {
        key_configured: status.key_configured,
        key_source: status.key_source,
        storage_dir: status.storage_dir.display().to_string(),
        storage_exists: status.storage_exists,
        archives: status.archive_count,
        oldest_day: status.oldest_day.map(|d| d.to_string()),
        newest_day: status.newest_day.map(|d| d.to_string()),
        due_for_purge: status.due_for_purge,
        retention_days: RETENTION_WINDOW_DAYS,
    };

    output.print_view("Contact vault status", &view)?;

    if output.format() == OutputFormat::Table {
        if !view.key_configured {
            output.print_warning("Encryption key is not configured; visits cannot be recorded")?;
        }
        if view.due_for_purge > 0 {
            output.print_warning(&format!(
                "{} file(s) are past the retention window; run 'contactctl purge'",
                view.due_for_purge
            ))?;
        }
    }

    if args.require_key && !view.key_configured {
        return Err(contact_vault::VaultError::from(contact_vault::WriteError::NoKey).into());
    }

    Ok(())
}
