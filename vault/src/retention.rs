//! Rolling retention for the storage directory
//!
//! Every regular file directly inside the storage directory is subject to
//! the window, archives or not. Subdirectories (the export directory) are
//! never entered.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use walkdir::WalkDir;

use crate::error::StoreResult;
use crate::store::ArchiveStore;

type RemoveFn = fn(&ArchiveStore, &Path) -> StoreResult<()>;

/// Days a file is kept after it was created
pub const RETENTION_WINDOW_DAYS: i64 = 21;

/// Expiry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl RetentionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Files created before this instant are expired
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    /// True iff `created` is strictly older than the window
    pub fn is_expired(&self, created: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        created < self.cutoff(now)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(Duration::days(RETENTION_WINDOW_DAYS))
    }
}

/// A file the policy considers expired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredFile {
    pub path: PathBuf,
    pub created: DateTime<Utc>,
}

/// What a sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files looked at
    pub examined: usize,

    /// Files removed
    pub deleted: Vec<PathBuf>,

    /// Enumeration, metadata or deletion failures
    pub failures: usize,
}

/// What a sweep would delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepPreview {
    pub examined: usize,
    pub expired: Vec<ExpiredFile>,
    pub failures: usize,
}

/// Best-effort deletion of expired files
#[derive(Clone)]
pub struct Purger {
    policy: RetentionPolicy,
    remove: RemoveFn,
}

impl std::fmt::Debug for Purger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Purger").field("policy", &self.policy).finish()
    }
}

impl Default for Purger {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl Purger {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            remove: ArchiveStore::remove_file,
        }
    }

    /// Replace the deletion step
    #[cfg(test)]
    pub(crate) fn with_remover(mut self, remove: RemoveFn) -> Self {
        self.remove = remove;
        self
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// List expired files without touching them
    pub fn preview(&self, store: &ArchiveStore, now: DateTime<Utc>) -> SweepPreview {
        let mut preview = SweepPreview::default();
        let dir = store.storage_dir();
        if !dir.is_dir() {
            return preview;
        }

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Failed to enumerate storage directory");
                    preview.failures += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            preview.examined += 1;

            let created = entry
                .metadata()
                .map_err(|e| e.to_string())
                .and_then(|metadata| {
                    metadata
                        .created()
                        .or_else(|_| metadata.modified())
                        .map_err(|e| e.to_string())
                });

            match created {
                Ok(created) => {
                    let created = DateTime::<Utc>::from(created);
                    if self.policy.is_expired(created, now) {
                        preview.expired.push(ExpiredFile {
                            path: entry.into_path(),
                            created,
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Failed to read file timestamps"
                    );
                    preview.failures += 1;
                }
            }
        }

        preview
    }

    /// Delete every expired file; failures are logged and counted
    pub fn sweep(&self, store: &ArchiveStore, now: DateTime<Utc>) -> SweepReport {
        self.remove_expired(store, self.preview(store, now))
    }

    /// Delete the files a preview found expired
    ///
    /// A file that can no longer be removed is counted as a failure.
    pub fn remove_expired(&self, store: &ArchiveStore, preview: SweepPreview) -> SweepReport {
        let mut report = SweepReport {
            examined: preview.examined,
            deleted: Vec::new(),
            failures: preview.failures,
        };

        for expired in preview.expired {
            match (self.remove)(store, &expired.path) {
                Ok(()) => {
                    tracing::info!(
                        path = %expired.path.display(),
                        created = %expired.created,
                        "Purged expired file"
                    );
                    report.deleted.push(expired.path);
                }
                Err(e) => {
                    tracing::warn!(path = %expired.path.display(), error = %e, "Failed to purge file");
                    report.failures += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fast_test_config;
    use crate::error::StoreError;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    fn store_with_files(dir: &TempDir) -> ArchiveStore {
        let store = ArchiveStore::new(dir.path(), "DailyCustomerData", fast_test_config());
        fs::write(dir.path().join("DailyCustomerData20260314.zip"), b"archive").unwrap();
        fs::write(dir.path().join("stray.log"), b"other").unwrap();
        fs::create_dir_all(dir.path().join("Exports")).unwrap();
        fs::write(dir.path().join("Exports").join("20260314120000.csv"), b"export").unwrap();
        store
    }

    #[test]
    fn test_boundary() {
        let policy = RetentionPolicy::default();
        let now = Utc::now();
        let cutoff = now - Duration::days(21);

        assert!(policy.is_expired(cutoff - Duration::seconds(1), now));
        assert!(!policy.is_expired(cutoff, now));
        assert!(!policy.is_expired(cutoff + Duration::seconds(1), now));
        assert!(policy.is_expired(now - Duration::days(22), now));
        assert!(!policy.is_expired(now - Duration::days(20), now));
    }

    #[test]
    fn test_sweep_keeps_recent_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_files(&temp_dir);

        let report = Purger::default().sweep(&store, Utc::now() + Duration::days(20));
        assert_eq!(report.examined, 2);
        assert!(report.deleted.is_empty());
        assert_eq!(report.failures, 0);
    }

    #[test]
    fn test_sweep_deletes_every_expired_top_level_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_files(&temp_dir);

        let report = Purger::default().sweep(&store, Utc::now() + Duration::days(22));
        assert_eq!(report.deleted.len(), 2);
        assert!(!temp_dir.path().join("DailyCustomerData20260314.zip").exists());
        assert!(!temp_dir.path().join("stray.log").exists());
        assert!(temp_dir
            .path()
            .join("Exports")
            .join("20260314120000.csv")
            .exists());
    }

    #[test]
    fn test_preview_does_not_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_files(&temp_dir);

        let preview = Purger::default().preview(&store, Utc::now() + Duration::days(22));
        assert_eq!(preview.expired.len(), 2);
        assert!(temp_dir.path().join("stray.log").exists());
    }

    #[test]
    fn test_failed_deletion_is_counted() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with_files(&temp_dir);
        let purger = Purger::default();

        let preview = purger.preview(&store, Utc::now() + Duration::days(22));
        assert_eq!(preview.expired.len(), 2);

        // A directory now sits where an expired file was listed
        let stray = temp_dir.path().join("stray.log");
        fs::remove_file(&stray).unwrap();
        fs::create_dir(&stray).unwrap();

        let report = purger.remove_expired(&store, preview);
        assert_eq!(report.failures, 1);
        assert_eq!(
            report.deleted,
            vec![temp_dir.path().join("DailyCustomerData20260314.zip")]
        );
        assert!(stray.is_dir());
    }

    #[test]
    fn test_sweep_counts_every_refused_deletion() {
        fn refuse(_: &ArchiveStore, path: &Path) -> StoreResult<()> {
            Err(StoreError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
            ))
        }

        let temp_dir = TempDir::new().unwrap();
        let store = store_with_files(&temp_dir);

        let report = Purger::default()
            .with_remover(refuse)
            .sweep(&store, Utc::now() + Duration::days(22));
        assert_eq!(report.examined, 2);
        assert_eq!(report.failures, 2);
        assert!(report.deleted.is_empty());
        assert!(temp_dir.path().join("stray.log").exists());
    }

    #[test]
    fn test_missing_directory_is_empty_sweep() {
        let temp_dir = TempDir::new().unwrap();
        let store = ArchiveStore::new(temp_dir.path().join("absent"), "P", fast_test_config());
        assert_eq!(Purger::default().sweep(&store, Utc::now()), SweepReport::default());
    }

    proptest! {
        #[test]
        fn prop_expiry_matches_age(age_secs in 0i64..(60 * 60 * 24 * 60)) {
            let now = Utc::now();
            let created = now - Duration::seconds(age_secs);
            let expired = RetentionPolicy::default().is_expired(created, now);
            prop_assert_eq!(expired, age_secs > RETENTION_WINDOW_DAYS * 24 * 60 * 60);
        }
    }
}
