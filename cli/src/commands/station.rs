use crate::error::{CliError, Result};
use crate::output::{OutputManager, TerminalPrompter};
use clap::Args;
use contact_vault::{spawn_key_refresh, ContactVault, WriteOutcome, KEY_REFRESH_INTERVAL};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct StationArgs {}

/// Run the interactive till loop with the key kept fresh in the background
pub async fn run(_args: StationArgs, vault: ContactVault, output: OutputManager) -> Result<()> {
    let shutdown = CancellationToken::new();
    let refresher = spawn_key_refresh(
        Arc::clone(vault.keys()),
        KEY_REFRESH_INTERVAL,
        shutdown.clone(),
    );

    let result = tokio::task::spawn_blocking(move || station_loop(&vault, &output))
        .await
        .map_err(|e| CliError::Task(e.to_string()));

    shutdown.cancel();
    if let Err(e) = refresher.await {
        tracing::warn!(error = %e, "Key refresh task ended abnormally");
    }

    result?
}

fn station_loop(vault: &ContactVault, output: &OutputManager) -> Result<()> {
    output.print_info("Station ready. Commands: [s]ave visit, [e]xport records, [q]uit")?;

    loop {
        let Some(choice) = output.prompt_input("station")? else {
            break;
        };

        match choice.to_lowercase().as_str() {
            "s" | "save" => {
                let mut prompter = TerminalPrompter::new(output);
                match vault.save_customer_data(&mut prompter) {
                    Ok(WriteOutcome::Skipped) => {
                        output.print_warning("Nothing recorded")?;
                    }
                    Ok(WriteOutcome::Written(_)) => {}
                    // Already shown by the prompter
                    Err(e) => tracing::debug!(error = %e, "Save failed"),
                }
            }
            "e" | "export" => {
                let mut prompter = TerminalPrompter::new(output);
                if let Err(e) = vault.export_records_to_csv(&mut prompter) {
                    tracing::debug!(error = %e, "Export failed");
                }
            }
            "q" | "quit" | "exit" => break,
            "" => continue,
            other => {
                output.print_warning(&format!("Unknown command '{}'", other))?;
            }
        }
    }

    output.print_info("Station closed")?;
    Ok(())
}
