//! Per-visit record writing

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::error::WriteError;
use crate::key_provider::{KeyProvider, Passphrase};
use crate::record::Record;
use crate::retention::Purger;
use crate::store::{AppendReceipt, ArchiveStore};
use crate::validation::{FieldCheck, FieldValidator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(AppendReceipt),
    /// Name or phone number was blank; nothing stored
    Skipped,
}

/// Appends one record per customer interaction, then sweeps expired files
pub struct RecordWriter {
    store: Arc<ArchiveStore>,
    keys: Arc<KeyProvider>,
    purger: Purger,
    validator: FieldValidator,
}

impl RecordWriter {
    pub fn new(
        store: Arc<ArchiveStore>,
        keys: Arc<KeyProvider>,
        purger: Purger,
        validator: FieldValidator,
    ) -> Self {
        Self {
            store,
            keys,
            purger,
            validator,
        }
    }

    pub fn record_visit(
        &self,
        full_name: &str,
        phone_number: &str,
    ) -> Result<WriteOutcome, WriteError> {
        self.record_visit_at(full_name, phone_number, Local::now())
    }

    /// Record a visit stamped `now`
    ///
    /// Without a configured key nothing happens at all. Every other path,
    /// including failures, ends with a retention sweep.
    pub fn record_visit_at(
        &self,
        full_name: &str,
        phone_number: &str,
        now: DateTime<Local>,
    ) -> Result<WriteOutcome, WriteError> {
        let password = self.keys.current();
        if password.is_empty() {
            return Err(WriteError::NoKey);
        }

        let result = self.write(full_name, phone_number, now, &password);

        let report = self.purger.sweep(&self.store, now.with_timezone(&Utc));
        if !report.deleted.is_empty() || report.failures > 0 {
            tracing::debug!(
                deleted = report.deleted.len(),
                failures = report.failures,
                "Retention sweep finished"
            );
        }

        if let Err(e) = &result {
            tracing::error!(error = %e, "Failed to record visit");
        }
        result
    }

    fn write(
        &self,
        full_name: &str,
        phone_number: &str,
        now: DateTime<Local>,
        password: &Passphrase,
    ) -> Result<WriteOutcome, WriteError> {
        let name = self.validator.check("full name", full_name)?;
        let phone = self.validator.check("phone number", phone_number)?;

        let (FieldCheck::Valid(name), FieldCheck::Valid(phone)) = (name, phone) else {
            tracing::debug!("Blank name or phone number, nothing recorded");
            return Ok(WriteOutcome::Skipped);
        };

        let record = Record::new(name, phone, now);
        let receipt = self.store.append(record.day(), &record, password)?;
        Ok(WriteOutcome::Written(receipt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fast_test_config;
    use crate::key_provider::StaticKeySource;
    use crate::record::local_time;
    use crate::StoreError;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn at(day: u32, hour: u32) -> DateTime<Local> {
        local_time(
            NaiveDate::from_ymd_opt(2026, 3, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        )
        .unwrap()
    }

    fn writer(dir: &TempDir, key: Option<&str>) -> (Arc<ArchiveStore>, Arc<StaticKeySource>, RecordWriter) {
        let store = Arc::new(ArchiveStore::new(dir.path(), "DailyCustomerData", fast_test_config()));
        let source = Arc::new(StaticKeySource::new(key));
        let keys = Arc::new(KeyProvider::new(source.clone()));
        let writer = RecordWriter::new(store.clone(), keys, Purger::default(), FieldValidator::default());
        (store, source, writer)
    }

    #[test]
    fn test_no_key_writes_nothing_and_skips_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let (_, _, writer) = writer(&temp_dir, None);
        // Would be purged by a sweep running a month from now
        let stray = temp_dir.path().join("stray.log");
        fs::write(&stray, b"x").unwrap();

        let now = Local::now() + chrono::Duration::days(30);
        let result = writer.record_visit_at("Jane Doe", "5551234567", now);
        assert!(matches!(result, Err(WriteError::NoKey)));
        assert!(stray.exists());
    }

    #[test]
    fn test_blank_fields_skip_but_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _, writer) = writer(&temp_dir, Some("k"));
        let stray = temp_dir.path().join("stray.log");
        fs::write(&stray, b"x").unwrap();

        let now = Local::now() + chrono::Duration::days(30);
        let outcome = writer.record_visit_at("  ", "5551234567", now).unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped);
        assert!(!stray.exists());
        assert!(store.list_archives().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_field_is_rejected_and_sweeps() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _, writer) = writer(&temp_dir, Some("k"));
        let stray = temp_dir.path().join("stray.log");
        fs::write(&stray, b"x").unwrap();

        let now = Local::now() + chrono::Duration::days(30);
        let result = writer.record_visit_at("Doe, Jane", "5551234567", now);
        assert!(matches!(result, Err(WriteError::InvalidField { field: "full name", .. })));
        assert!(!stray.exists());
        assert!(store.list_archives().unwrap().is_empty());
    }

    #[test]
    fn test_failed_sweep_does_not_block_write() {
        fn refuse(_: &ArchiveStore, path: &std::path::Path) -> crate::error::StoreResult<()> {
            Err(StoreError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
            ))
        }

        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(ArchiveStore::new(temp_dir.path(), "DailyCustomerData", fast_test_config()));
        let keys = Arc::new(KeyProvider::new(Arc::new(StaticKeySource::new(Some("k")))));
        let purger = Purger::default().with_remover(refuse);
        let writer = RecordWriter::new(store.clone(), keys, purger, FieldValidator::default());
        let stray = temp_dir.path().join("stray.log");
        fs::write(&stray, b"x").unwrap();

        let now = Local::now() + chrono::Duration::days(30);
        let outcome = writer.record_visit_at("Jane Doe", "5551234567", now).unwrap();
        let WriteOutcome::Written(receipt) = outcome else {
            panic!("record was skipped");
        };
        assert!(receipt.archive.exists());
        assert!(stray.exists());

        let handles = store.list_archives().unwrap();
        let contents = store.read_all(&handles[0], &Passphrase::new("k")).unwrap();
        assert_eq!(contents.records.len(), 1);
    }

    #[test]
    fn test_written_record_is_trimmed() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _, writer) = writer(&temp_dir, Some("k"));

        let outcome = writer.record_visit_at(" Jane Doe ", "5551234567\n", at(14, 9)).unwrap();
        let WriteOutcome::Written(receipt) = outcome else {
            panic!("record was skipped");
        };
        assert!(receipt.archive.ends_with("DailyCustomerData20260314.zip"));

        let handles = store.list_archives().unwrap();
        let contents = store.read_all(&handles[0], &Passphrase::new("k")).unwrap();
        assert_eq!(contents.records[0].to_line(), "Jane Doe,5551234567,20260314090000");
    }

    #[test]
    fn test_rotated_key_surfaces_wrong_key() {
        let temp_dir = TempDir::new().unwrap();
        let (_, source, writer) = writer(&temp_dir, Some("old"));
        writer.record_visit_at("Jane Doe", "5551234567", at(14, 9)).unwrap();

        source.set(Some("new"));
        writer.keys.refresh();

        let result = writer.record_visit_at("Amar Singh", "5559876543", at(14, 10));
        assert!(matches!(result, Err(WriteError::Store(StoreError::WrongKey { .. }))));

        let outcome = writer.record_visit_at("Amar Singh", "5559876543", at(15, 10)).unwrap();
        assert!(matches!(outcome, WriteOutcome::Written(_)));
    }
}
