//! Daily archive storage
//!
//! One ZIP container per calendar day holds a `.vault-manifest.json` entry
//! and one sealed entry per visit. Every append rewrites the container to a
//! temporary file, syncs it and renames it over the previous version, so a
//! crash leaves either the old archive or the new one.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::{EncryptionConfig, VaultConfig};
use crate::crypto::{ArchiveCipher, ArchiveManifest};
use crate::error::{CryptoError, StoreError, StoreResult};
use crate::key_provider::Passphrase;
use crate::record::Record;

/// Name of the manifest entry inside every archive
pub const MANIFEST_ENTRY: &str = ".vault-manifest.json";

const ARCHIVE_EXTENSION: &str = ".zip";
const DAY_FORMAT: &str = "%Y%m%d";

/// An archive file found in the storage directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    /// Full path of the archive
    pub path: PathBuf,

    /// Day encoded in the file name, if it parses
    pub day: Option<NaiveDate>,
}

/// Where an appended record ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub archive: PathBuf,
    pub entry: String,
    /// The append created the day's archive
    pub created_archive: bool,
}

/// Decoded contents of one archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveContents {
    /// Records that decrypted and parsed, in entry name order
    pub records: Vec<Record>,

    /// Entries that failed to decrypt or parse
    pub failures: usize,
}

/// Owns the directory of daily archives
pub struct ArchiveStore {
    storage_dir: PathBuf,
    archive_prefix: String,
    encryption: EncryptionConfig,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ArchiveStore {
    pub fn new(
        storage_dir: impl Into<PathBuf>,
        archive_prefix: impl Into<String>,
        encryption: EncryptionConfig,
    ) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            archive_prefix: archive_prefix.into(),
            encryption,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(
            config.storage.storage_dir(),
            config.storage.archive_prefix.clone(),
            config.encryption.clone(),
        )
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn archive_prefix(&self) -> &str {
        &self.archive_prefix
    }

    /// Path of the archive for `day`, whether or not it exists
    pub fn archive_path(&self, day: NaiveDate) -> PathBuf {
        self.storage_dir.join(format!(
            "{}{}{}",
            self.archive_prefix,
            day.format(DAY_FORMAT),
            ARCHIVE_EXTENSION
        ))
    }

    /// Add one sealed record to the archive for `day`
    pub fn append(
        &self,
        day: NaiveDate,
        record: &Record,
        password: &Passphrase,
    ) -> StoreResult<AppendReceipt> {
        fs::create_dir_all(&self.storage_dir)
            .map_err(|e| StoreError::io(&self.storage_dir, e))?;

        let path = self.archive_path(day);
        let lock = self.lock_for(&path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (bytes, entry, created_archive) = match fs::read(&path) {
            Ok(existing) => {
                let (bytes, entry) = self.append_to_existing(&path, existing, record, password)?;
                (bytes, entry, false)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (bytes, entry) = self.create_archive(&path, record, password)?;
                (bytes, entry, true)
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        write_atomically(&path, &bytes).map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!(
            archive = %path.display(),
            entry = %entry,
            created = created_archive,
            "Appended record"
        );

        Ok(AppendReceipt {
            archive: path,
            entry,
            created_archive,
        })
    }

    /// Archives currently in the storage directory, in no particular order
    pub fn list_archives(&self) -> StoreResult<Vec<ArchiveHandle>> {
        let entries = match fs::read_dir(&self.storage_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.storage_dir, e)),
        };

        let mut handles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.storage_dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if let Some(stem) = name
                .strip_prefix(self.archive_prefix.as_str())
                .and_then(|rest| rest.strip_suffix(ARCHIVE_EXTENSION))
            {
                handles.push(ArchiveHandle {
                    path: entry.path(),
                    day: NaiveDate::parse_from_str(stem, DAY_FORMAT).ok(),
                });
            }
        }

        Ok(handles)
    }

    /// Decrypt every record entry, counting the ones that fail
    pub fn read_all(
        &self,
        handle: &ArchiveHandle,
        password: &Passphrase,
    ) -> StoreResult<ArchiveContents> {
        let path = handle.path.as_path();
        let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| zip_error(path, e))?;

        let manifest = read_manifest(&mut archive, path)?;
        let cipher = manifest.cipher(password).map_err(|source| StoreError::Crypto {
            path: path.to_path_buf(),
            source,
        })?;

        let mut names: Vec<String> = archive
            .file_names()
            .filter(|name| *name != MANIFEST_ENTRY)
            .map(str::to_string)
            .collect();
        names.sort();

        let mut contents = ArchiveContents::default();
        for name in names {
            match read_entry(&mut archive, &cipher, &name) {
                Ok(record) => contents.records.push(record),
                Err(e) => {
                    tracing::warn!(
                        archive = %path.display(),
                        entry = %name,
                        error = %e,
                        "Skipping unreadable entry"
                    );
                    contents.failures += 1;
                }
            }
        }

        Ok(contents)
    }

    /// Remove an archive
    ///
    /// Archive-level entry point over [`ArchiveStore::remove_file`], which the
    /// purger uses directly because it also removes non-archive files.
    pub fn delete(&self, handle: &ArchiveHandle) -> StoreResult<()> {
        self.remove_file(&handle.path)
    }

    /// Remove any file in the storage directory under its per-file lock
    pub(crate) fn remove_file(&self, path: &Path) -> StoreResult<()> {
        let lock = self.lock_for(path);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        fs::remove_file(path).map_err(|e| StoreError::io(path, e))
    }

    /// Per-path lock; entries nobody holds are dropped on each call
    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn create_archive(
        &self,
        path: &Path,
        record: &Record,
        password: &Passphrase,
    ) -> StoreResult<(Vec<u8>, String)> {
        let (manifest, cipher) =
            ArchiveManifest::create(&self.encryption, password).map_err(|source| {
                StoreError::Crypto {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        let manifest_bytes = manifest.to_bytes().map_err(|source| StoreError::Crypto {
            path: path.to_path_buf(),
            source,
        })?;

        let entry = entry_name_for(record, &HashSet::new());
        let sealed = seal_record(&cipher, path, &entry, record)?;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        write_entry(&mut writer, path, MANIFEST_ENTRY, &manifest_bytes)?;
        write_entry(&mut writer, path, &entry, &sealed)?;
        let cursor = writer.finish().map_err(|e| zip_error(path, e))?;

        Ok((cursor.into_inner(), entry))
    }

    fn append_to_existing(
        &self,
        path: &Path,
        existing: Vec<u8>,
        record: &Record,
        password: &Passphrase,
    ) -> StoreResult<(Vec<u8>, String)> {
        let mut archive =
            ZipArchive::new(Cursor::new(existing)).map_err(|e| zip_error(path, e))?;

        let manifest = read_manifest(&mut archive, path)?;
        let cipher = manifest.unlock(password).map_err(|e| match e {
            CryptoError::AuthenticationFailed => StoreError::WrongKey {
                path: path.to_path_buf(),
            },
            source => StoreError::Crypto {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let taken: HashSet<String> = archive.file_names().map(str::to_string).collect();
        let entry = entry_name_for(record, &taken);
        let sealed = seal_record(&cipher, path, &entry, record)?;

        let mut writer =
            ZipWriter::new_append(archive.into_inner()).map_err(|e| zip_error(path, e))?;
        write_entry(&mut writer, path, &entry, &sealed)?;
        let cursor = writer.finish().map_err(|e| zip_error(path, e))?;

        Ok((cursor.into_inner(), entry))
    }
}

impl std::fmt::Debug for ArchiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveStore")
            .field("storage_dir", &self.storage_dir)
            .field("archive_prefix", &self.archive_prefix)
            .finish()
    }
}

/// Write `bytes` to `<path>.tmp`, sync, then rename over `path`
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = write_and_rename(&tmp_path, path, bytes);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_and_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp_path, path)?;

    #[cfg(unix)]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::File::open(parent)?.sync_all()?;
        }
    }

    Ok(())
}

fn zip_error(path: &Path, error: ZipError) -> StoreError {
    match error {
        ZipError::Io(e) => StoreError::io(path, e),
        other => StoreError::corrupt(path, other),
    }
}

fn read_manifest(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    path: &Path,
) -> StoreResult<ArchiveManifest> {
    let mut file = archive.by_name(MANIFEST_ENTRY).map_err(|e| match e {
        ZipError::FileNotFound => StoreError::corrupt(path, "missing manifest"),
        other => zip_error(path, other),
    })?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| StoreError::corrupt(path, e))?;

    ArchiveManifest::from_bytes(&bytes).map_err(|e| StoreError::corrupt(path, e))
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    cipher: &ArchiveCipher,
    name: &str,
) -> StoreResult<Record> {
    let decode = |reason: String| StoreError::Decode {
        entry: name.to_string(),
        reason,
    };

    let mut file = archive.by_name(name).map_err(|e| decode(e.to_string()))?;
    if file.is_dir() {
        return Err(decode("directory entry".to_string()));
    }

    let mut sealed = Vec::new();
    file.read_to_end(&mut sealed)
        .map_err(|e| decode(e.to_string()))?;

    let plain = cipher
        .open(name.as_bytes(), &sealed)
        .map_err(|e| decode(e.to_string()))?;
    let line = String::from_utf8(plain).map_err(|e| decode(e.to_string()))?;

    Record::parse_line(&line).map_err(decode)
}

fn seal_record(
    cipher: &ArchiveCipher,
    path: &Path,
    entry: &str,
    record: &Record,
) -> StoreResult<Vec<u8>> {
    cipher
        .seal(entry.as_bytes(), record.to_line().as_bytes())
        .map_err(|source| StoreError::Crypto {
            path: path.to_path_buf(),
            source,
        })
}

fn write_entry<W: Write + io::Seek>(
    writer: &mut ZipWriter<W>,
    path: &Path,
    name: &str,
    bytes: &[u8],
) -> StoreResult<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer
        .start_file(name, options)
        .map_err(|e| zip_error(path, e))?;
    writer.write_all(bytes).map_err(|e| StoreError::io(path, e))
}

/// `yyyyMMddHHmmss.txt`, or `yyyyMMddHHmmss-N.txt` when that is taken
fn entry_name_for(record: &Record, taken: &HashSet<String>) -> String {
    let base = record.entry_name();
    if !taken.contains(&base) {
        return base;
    }

    let stamp = base.strip_suffix(".txt").unwrap_or(&base);

    (1..)
        .map(|n| format!("{stamp}-{n}.txt"))
        .find(|name| !taken.contains(name))
        .unwrap_or(base)
}
