use crate::error::{CliError, Result};
use crate::output::{OutputManager, TerminalPrompter};
use clap::Args;
use contact_vault::{ContactVault, WriteOutcome};

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Customer full name (prompted when omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Customer phone number (prompted when omitted)
    #[arg(long, requires = "name")]
    pub phone: Option<String>,
}

pub fn run(args: SaveArgs, vault: &ContactVault, output: &OutputManager) -> Result<()> {
    let answers: Vec<String> = args.name.into_iter().chain(args.phone).collect();
    let mut prompter = TerminalPrompter::new(output).with_answers(answers);

    match vault.save_customer_data(&mut prompter) {
        Ok(WriteOutcome::Written(receipt)) => {
            tracing::debug!(
                archive = %receipt.archive.display(),
                entry = %receipt.entry,
                "Visit saved"
            );
            Ok(())
        }
        Ok(WriteOutcome::Skipped) => {
            output.print_warning("Nothing recorded: both a name and a phone number are required")?;
            Ok(())
        }
        Err(e) => Err(CliError::reported(e)),
    }
}
