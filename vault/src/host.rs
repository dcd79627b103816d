//! Host-facing operations
//!
//! `ContactVault` wires the key provider, store, purger, writer and export
//! aggregator together and drives them through a [`Prompter`], the way a
//! point-of-sale button handler would.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::config::VaultConfig;
use crate::error::{ExportError, Result, StoreResult, WriteError};
use crate::export::{ExportAggregator, ExportOutcome, FileExportSink};
use crate::key_provider::{key_source_from_config, KeyProvider, KeySource};
use crate::retention::{Purger, SweepPreview, SweepReport};
use crate::store::ArchiveStore;
use crate::validation::FieldValidator;
use crate::writer::{RecordWriter, WriteOutcome};

pub const MSG_KEY_NOT_CONFIGURED: &str = "The customer data encryption key is not configured.";
pub const MSG_SAVED: &str = "Successfully saved customer records";
pub const MSG_INCORRECT_KEY: &str = "Incorrect Encryption Key";
pub const EXPORT_QUESTION: &str =
    "This will export all customer records to a CSV file on the disk. Are you sure?";

pub const PROMPT_FULL_NAME: &str = "Enter Customers Full Name";
pub const PROMPT_PHONE_NUMBER: &str = "Enter Customers Full Phone Number";
pub const PROMPT_ENCRYPTION_KEY: &str = "Enter Encryption Key";

/// The interactive surface a host offers
pub trait Prompter {
    /// Ask for a line of text; `None` when the operator cancels
    fn request_text(&mut self, prompt: &str) -> Option<String>;

    /// Ask for a secret; hosts that can hide input should
    fn request_secret(&mut self, prompt: &str) -> Option<String> {
        self.request_text(prompt)
    }

    fn ask_yes_no(&mut self, question: &str) -> bool;

    fn show_message(&mut self, message: &str);

    fn show_error(&mut self, message: &str);
}

/// Snapshot of the vault for status displays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStatus {
    pub key_configured: bool,
    pub key_source: String,
    pub storage_dir: PathBuf,
    pub storage_exists: bool,
    pub archive_count: usize,
    pub oldest_day: Option<NaiveDate>,
    pub newest_day: Option<NaiveDate>,
    pub due_for_purge: usize,
}

pub struct ContactVault {
    config: VaultConfig,
    key_source: Arc<dyn KeySource>,
    keys: Arc<KeyProvider>,
    store: Arc<ArchiveStore>,
    purger: Purger,
    writer: RecordWriter,
    exporter: ExportAggregator,
}

impl ContactVault {
    /// Open the vault described by `config`, reading the key once
    pub fn open(config: VaultConfig) -> Result<Self> {
        let source = key_source_from_config(&config.key_source);
        Self::with_key_source(config, source)
    }

    /// Open with an explicit key source
    pub fn with_key_source(config: VaultConfig, key_source: Arc<dyn KeySource>) -> Result<Self> {
        config.validate()?;

        let keys = Arc::new(KeyProvider::new(Arc::clone(&key_source)));
        let store = Arc::new(ArchiveStore::from_config(&config));
        let purger = Purger::default();
        let writer = RecordWriter::new(
            Arc::clone(&store),
            Arc::clone(&keys),
            purger.clone(),
            FieldValidator::new(config.validation.clone()),
        );
        let exporter = ExportAggregator::new(Arc::clone(&store), Arc::clone(&keys));

        tracing::debug!(
            storage = %store.storage_dir().display(),
            key_source = %key_source.describe(),
            "Contact vault opened"
        );

        Ok(Self {
            config,
            key_source,
            keys,
            store,
            purger,
            writer,
            exporter,
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn keys(&self) -> &Arc<KeyProvider> {
        &self.keys
    }

    pub fn store(&self) -> &Arc<ArchiveStore> {
        &self.store
    }

    pub fn writer(&self) -> &RecordWriter {
        &self.writer
    }

    pub fn exporter(&self) -> &ExportAggregator {
        &self.exporter
    }

    /// Prompt for a visit and store it
    pub fn save_customer_data(&self, prompter: &mut dyn Prompter) -> Result<WriteOutcome> {
        self.save_customer_data_at(prompter, Local::now())
    }

    pub fn save_customer_data_at(
        &self,
        prompter: &mut dyn Prompter,
        now: DateTime<Local>,
    ) -> Result<WriteOutcome> {
        if !self.keys.is_configured() {
            tracing::error!("{}", MSG_KEY_NOT_CONFIGURED);
            prompter.show_error(MSG_KEY_NOT_CONFIGURED);
            return Err(WriteError::NoKey.into());
        }

        // No phone prompt once the name is left blank
        let full_name = prompter.request_text(PROMPT_FULL_NAME).unwrap_or_default();
        let phone_number = if full_name.trim().is_empty() {
            String::new()
        } else {
            prompter.request_text(PROMPT_PHONE_NUMBER).unwrap_or_default()
        };

        match self.writer.record_visit_at(&full_name, &phone_number, now) {
            Ok(WriteOutcome::Written(receipt)) => {
                prompter.show_message(MSG_SAVED);
                Ok(WriteOutcome::Written(receipt))
            }
            Ok(WriteOutcome::Skipped) => Ok(WriteOutcome::Skipped),
            Err(WriteError::NoKey) => {
                prompter.show_error(MSG_KEY_NOT_CONFIGURED);
                Err(WriteError::NoKey.into())
            }
            Err(e) => {
                prompter.show_error(&format!(
                    "Failed to save the customer data.\nReason: {e}"
                ));
                Err(e.into())
            }
        }
    }

    /// Prompt for the key and a confirmation, then export every record
    pub fn export_records_to_csv(&self, prompter: &mut dyn Prompter) -> Result<ExportOutcome> {
        self.export_records_to_csv_at(prompter, Local::now())
    }

    pub fn export_records_to_csv_at(
        &self,
        prompter: &mut dyn Prompter,
        now: DateTime<Local>,
    ) -> Result<ExportOutcome> {
        let candidate = prompter
            .request_secret(PROMPT_ENCRYPTION_KEY)
            .unwrap_or_default();
        let sink = FileExportSink::new(self.config.storage.exports_dir());

        let result = {
            let confirm = || prompter.ask_yes_no(EXPORT_QUESTION);
            self.exporter.export(&candidate, confirm, &sink, now)
        };

        match result {
            Ok(ExportOutcome::Completed(summary)) => {
                if summary.storage_missing {
                    prompter.show_error(&format!(
                        "Storage path '{}' cannot be found.",
                        self.store.storage_dir().display()
                    ));
                }
                prompter.show_message(&format!(
                    "Exported {} customer records to: '{}'\nFailed to export {} customer records",
                    summary.success_count,
                    summary.output_path.display(),
                    summary.failure_count
                ));
                Ok(ExportOutcome::Completed(summary))
            }
            Ok(ExportOutcome::Declined) => Ok(ExportOutcome::Declined),
            Err(e) => {
                let message = match &e {
                    ExportError::NoKey => MSG_KEY_NOT_CONFIGURED.to_string(),
                    ExportError::Unauthorized => MSG_INCORRECT_KEY.to_string(),
                    ExportError::Archive { .. } => format!("Failed to read customer records. {e}"),
                    ExportError::Write { .. } => format!("Failed to export to disk. Reason: {e}"),
                };
                prompter.show_error(&message);
                Err(e.into())
            }
        }
    }

    /// Archive counts, date range and purge backlog
    pub fn status(&self, now: DateTime<Utc>) -> StoreResult<VaultStatus> {
        let archives = self.store.list_archives()?;
        let days: Vec<NaiveDate> = archives.iter().filter_map(|a| a.day).collect();

        Ok(VaultStatus {
            key_configured: self.keys.is_configured(),
            key_source: self.key_source.describe(),
            storage_dir: self.store.storage_dir().to_path_buf(),
            storage_exists: self.store.storage_dir().is_dir(),
            archive_count: archives.len(),
            oldest_day: days.iter().min().copied(),
            newest_day: days.iter().max().copied(),
            due_for_purge: self.purger.preview(&self.store, now).expired.len(),
        })
    }

    /// Files a sweep at `now` would delete
    pub fn purge_preview(&self, now: DateTime<Utc>) -> SweepPreview {
        self.purger.preview(&self.store, now)
    }

    /// Run a retention sweep outside the write path
    pub fn purge(&self, now: DateTime<Utc>) -> SweepReport {
        self.purger.sweep(&self.store, now)
    }
}

impl std::fmt::Debug for ContactVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactVault")
            .field("store", &self.store)
            .field("keys", &self.keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fast_test_config;
    use crate::key_provider::StaticKeySource;
    use crate::record::local_time;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    #[derive(Default)]
    struct ScriptedPrompter {
        answers: VecDeque<String>,
        confirm: bool,
        asked: Vec<String>,
        messages: Vec<String>,
        errors: Vec<String>,
    }

    impl ScriptedPrompter {
        fn new(answers: &[&str], confirm: bool) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                confirm,
                ..Self::default()
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn request_text(&mut self, prompt: &str) -> Option<String> {
            self.asked.push(prompt.to_string());
            self.answers.pop_front()
        }

        fn ask_yes_no(&mut self, question: &str) -> bool {
            self.asked.push(question.to_string());
            self.confirm
        }

        fn show_message(&mut self, message: &str) {
            self.messages.push(message.to_string());
        }

        fn show_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    fn vault(dir: &TempDir, key: Option<&str>) -> ContactVault {
        let mut config = VaultConfig::default();
        config.storage.base_dir = dir.path().to_path_buf();
        config.encryption = fast_test_config();
        ContactVault::with_key_source(config, Arc::new(StaticKeySource::new(key))).unwrap()
    }

    fn at(hour: u32) -> DateTime<Local> {
        local_time(
            NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_save_without_key_prompts_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir, None);
        let mut prompter = ScriptedPrompter::new(&["Jane Doe", "5551234567"], true);

        assert!(vault.save_customer_data_at(&mut prompter, at(9)).is_err());
        assert!(prompter.asked.is_empty());
        assert_eq!(prompter.errors, vec![MSG_KEY_NOT_CONFIGURED.to_string()]);
    }

    #[test]
    fn test_blank_name_skips_phone_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir, Some("k"));
        let mut prompter = ScriptedPrompter::new(&[""], true);

        let outcome = vault.save_customer_data_at(&mut prompter, at(9)).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped);
        assert_eq!(prompter.asked, vec![PROMPT_FULL_NAME.to_string()]);
        assert!(prompter.messages.is_empty());
    }

    #[test]
    fn test_save_then_export() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir, Some("k"));

        let mut prompter = ScriptedPrompter::new(&["Jane Doe", "5551234567"], true);
        vault.save_customer_data_at(&mut prompter, at(9)).unwrap();
        assert_eq!(prompter.messages, vec![MSG_SAVED.to_string()]);

        let mut prompter = ScriptedPrompter::new(&["k"], true);
        let outcome = vault.export_records_to_csv_at(&mut prompter, at(18)).unwrap();
        let ExportOutcome::Completed(summary) = outcome else {
            panic!("export was declined");
        };
        assert_eq!(summary.success_count, 1);
        assert!(prompter.messages[0].starts_with("Exported 1 customer records"));
        assert!(prompter.messages[0].contains("Failed to export 0 customer records"));
    }

    #[test]
    fn test_export_wrong_key_shows_error_only() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir, Some("k"));
        let mut prompter = ScriptedPrompter::new(&["nope"], true);

        assert!(vault.export_records_to_csv_at(&mut prompter, at(18)).is_err());
        assert_eq!(prompter.asked, vec![PROMPT_ENCRYPTION_KEY.to_string()]);
        assert_eq!(prompter.errors, vec![MSG_INCORRECT_KEY.to_string()]);
    }

    #[test]
    fn test_export_reports_missing_storage() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir, Some("k"));
        let mut prompter = ScriptedPrompter::new(&["k"], true);

        vault.export_records_to_csv_at(&mut prompter, at(18)).unwrap();
        assert!(prompter.errors[0].contains("cannot be found"));
        assert!(prompter.messages[0].starts_with("Exported 0 customer records"));
    }

    #[test]
    fn test_status() {
        let temp_dir = TempDir::new().unwrap();
        let vault = vault(&temp_dir, Some("k"));
        let mut prompter = ScriptedPrompter::new(&["Jane Doe", "5551234567"], true);
        vault.save_customer_data_at(&mut prompter, at(9)).unwrap();

        let status = vault.status(Utc::now()).unwrap();
        assert!(status.key_configured);
        assert!(status.storage_exists);
        assert_eq!(status.archive_count, 1);
        assert_eq!(status.oldest_day, NaiveDate::from_ymd_opt(2026, 3, 14));
        assert_eq!(status.due_for_purge, 0);
    }
}
