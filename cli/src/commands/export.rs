use crate::error::{CliError, Result};
use crate::output::{OutputManager, TerminalPrompter};
use clap::Args;
use contact_vault::{ContactVault, ExportOutcome};

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Skip the confirmation question
    #[arg(short, long)]
    pub yes: bool,
}

pub fn run(args: ExportArgs, vault: &ContactVault, output: &OutputManager) -> Result<()> {
    let mut prompter = TerminalPrompter::new(output).assume_yes(args.yes);

    match vault.export_records_to_csv(&mut prompter) {
        Ok(ExportOutcome::Completed(summary)) => {
            tracing::debug!(
                archives = summary.archives_read,
                path = %summary.output_path.display(),
                "Export written"
            );
            Ok(())
        }
        Ok(ExportOutcome::Declined) => Err(CliError::Cancelled),
        Err(e) => Err(CliError::reported(e)),
    }
}
