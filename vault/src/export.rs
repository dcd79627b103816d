//! Supervised bulk export
//!
//! Decrypts every retained archive with the supervisor's key and writes the
//! aggregated record lines to a single plaintext file.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::error::{ExportError, ExportResult};
use crate::key_provider::{KeyProvider, Passphrase};
use crate::record::RECORD_TIMESTAMP_FORMAT;
use crate::store::{write_atomically, ArchiveStore};

/// Destination of an export blob
pub trait ExportSink {
    /// Persist `contents` once and return where they went
    fn write_export(&self, contents: &[u8], now: DateTime<Local>) -> io::Result<PathBuf>;
}

/// Writes `<exports_dir>/<yyyyMMddHHmmss>.csv`
#[derive(Debug, Clone)]
pub struct FileExportSink {
    exports_dir: PathBuf,
}

impl FileExportSink {
    pub fn new(exports_dir: impl Into<PathBuf>) -> Self {
        Self {
            exports_dir: exports_dir.into(),
        }
    }

    pub fn exports_dir(&self) -> &PathBuf {
        &self.exports_dir
    }
}

impl ExportSink for FileExportSink {
    fn write_export(&self, contents: &[u8], now: DateTime<Local>) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.exports_dir)?;
        let path = self
            .exports_dir
            .join(format!("{}.csv", now.format(RECORD_TIMESTAMP_FORMAT)));
        write_atomically(&path, contents)?;
        Ok(path)
    }
}

/// Counts from a completed export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub success_count: usize,
    pub failure_count: usize,
    pub archives_read: usize,
    pub output_path: PathBuf,
    /// The storage directory did not exist; the export is empty
    pub storage_missing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Completed(ExportSummary),
    /// The supervisor answered "no" at the confirmation prompt
    Declined,
}

pub struct ExportAggregator {
    store: Arc<ArchiveStore>,
    keys: Arc<KeyProvider>,
}

impl ExportAggregator {
    pub fn new(store: Arc<ArchiveStore>, keys: Arc<KeyProvider>) -> Self {
        Self { store, keys }
    }

    /// Authorize `candidate`, ask `confirm`, then decrypt and aggregate
    /// every archive into `sink`
    pub fn export<F>(
        &self,
        candidate: &str,
        confirm: F,
        sink: &dyn ExportSink,
        now: DateTime<Local>,
    ) -> ExportResult<ExportOutcome>
    where
        F: FnOnce() -> bool,
    {
        if !self.keys.is_configured() {
            return Err(ExportError::NoKey);
        }

        if !self.keys.matches(candidate) {
            tracing::warn!("Export rejected: incorrect encryption key");
            return Err(ExportError::Unauthorized);
        }

        if !confirm() {
            tracing::info!("Export declined");
            return Ok(ExportOutcome::Declined);
        }

        let password = Passphrase::new(candidate);
        let storage_missing = !self.store.storage_dir().is_dir();

        let archives = self.store.list_archives().map_err(|source| ExportError::Archive {
            source,
            succeeded: 0,
            failed: 0,
        })?;

        let mut buffer = String::new();
        let mut succeeded = 0;
        let mut failed = 0;

        for handle in &archives {
            let contents =
                self.store
                    .read_all(handle, &password)
                    .map_err(|source| ExportError::Archive {
                        source,
                        succeeded,
                        failed,
                    })?;

            for record in &contents.records {
                buffer.push_str(&record.to_line());
                buffer.push('\n');
            }
            succeeded += contents.records.len();
            failed += contents.failures;
        }

        let output_path =
            sink.write_export(buffer.as_bytes(), now)
                .map_err(|source| ExportError::Write {
                    source,
                    succeeded,
                    failed,
                })?;

        tracing::info!(
            archives = archives.len(),
            exported = succeeded,
            failed,
            path = %output_path.display(),
            "Export completed"
        );

        Ok(ExportOutcome::Completed(ExportSummary {
            success_count: succeeded,
            failure_count: failed,
            archives_read: archives.len(),
            output_path,
            storage_missing,
        }))
    }
}
