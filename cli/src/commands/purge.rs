use crate::error::Result;
use crate::output::{OutputFormat, OutputManager};
use chrono::Utc;
use clap::Args;
use contact_vault::{ContactVault, RETENTION_WINDOW_DAYS};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Show what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct PurgeView {
    dry_run: bool,
    examined: usize,
    files: Vec<String>,
    failures: usize,
}

pub fn run(args: PurgeArgs, vault: &ContactVault, output: &OutputManager) -> Result<()> {
    let now = Utc::now();

    let view = if args.dry_run {
        let preview = vault.purge_preview(now);
        PurgeView {
            dry_run: true,
            examined: preview.examined,
            files: preview
                .expired
                .iter()
                .map(|f| f.path.display().to_string())
                .collect(),
            failures: preview.failures,
        }
    } else {
        let report = vault.purge(now);
        PurgeView {
            dry_run: false,
            examined: report.examined,
            files: report.deleted.iter().map(|p| p.display().to_string()).collect(),
            failures: report.failures,
        }
    };

    if output.format() == OutputFormat::Json {
        return output.print_view("Purge", &view);
    }

    let verb = if view.dry_run { "Would delete" } else { "Deleted" };
    for file in &view.files {
        output.print_info(&format!("{} {}", verb, file))?;
    }

    if view.failures > 0 {
        output.print_warning(&format!(
            "{} file(s) could not be checked or deleted; see the log for details",
            view.failures
        ))?;
    }

    let summary = format!(
        "{} {} expired file(s) ({} examined, {}-day retention window)",
        verb,
        view.files.len(),
        view.examined,
        RETENTION_WINDOW_DAYS
    );
    if view.dry_run {
        output.print_info(&format!("Dry run: {}", summary))?;
    } else {
        output.print_success(&summary)?;
    }

    Ok(())
}
