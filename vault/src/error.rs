//! Error handling for the contact vault
//!
//! Each concern has its own error enum; `VaultError` rolls them up for
//! callers that drive several components at once.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for the vault
#[derive(Error, Debug)]
pub enum VaultError {
    /// Archive storage errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Cipher and key derivation errors
    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    /// Key source errors
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Record writing errors
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Logging could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Archive storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive {path} cannot be opened with the supplied key")]
    WrongKey { path: PathBuf },

    #[error("Archive {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Entry {entry} could not be decoded: {reason}")]
    Decode { entry: String, reason: String },

    #[error("Archive {path}: {source}")]
    Crypto {
        path: PathBuf,
        #[source]
        source: CryptoError,
    },
}

/// Cipher and key derivation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Key derivation failed: {reason}")]
    KeyDerivationFailed { reason: String },

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Authentication tag verification failed")]
    AuthenticationFailed,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid sealed payload: {reason}")]
    InvalidFormat { reason: String },
}

/// Key source errors
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key store {path} could not be read: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Key store {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Environment variable {name} is not valid unicode")]
    NotUnicode { name: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration parsing error: {reason}")]
    ParseError { reason: String },

    #[error("Configuration could not be written to {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Unable to determine a configuration directory")]
    NoConfigDir,
}

/// Record writing errors
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("The encryption key is not configured")]
    NoKey,

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("The encryption key is not configured")]
    NoKey,

    #[error("Incorrect encryption key")]
    Unauthorized,

    #[error("Export aborted after {succeeded} records ({failed} failed): {source}")]
    Archive {
        #[source]
        source: StoreError,
        succeeded: usize,
        failed: usize,
    },

    #[error("Failed to write export after reading {succeeded} records ({failed} failed): {source}")]
    Write {
        #[source]
        source: io::Error,
        succeeded: usize,
        failed: usize,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, VaultError>;

/// A specialized result type for archive storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A specialized result type for cipher operations
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// A specialized result type for key source operations
pub type KeyResult<T> = std::result::Result<T, KeyError>;

/// A specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A specialized result type for export operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl VaultError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            VaultError::Store(_) => "storage",
            VaultError::Crypto(_) => "encryption",
            VaultError::Key(_) => "key",
            VaultError::Config(_) => "config",
            VaultError::Write(_) => "write",
            VaultError::Export(_) => "export",
            VaultError::Logging(_) => "logging",
            VaultError::Io(_) => "io",
        }
    }

    /// Errors caused by the key rather than by the disk
    pub fn is_key_problem(&self) -> bool {
        matches!(
            self,
            VaultError::Store(StoreError::WrongKey { .. })
                | VaultError::Write(WriteError::NoKey)
                | VaultError::Write(WriteError::Store(StoreError::WrongKey { .. }))
                | VaultError::Export(ExportError::NoKey)
                | VaultError::Export(ExportError::Unauthorized)
        )
    }
}
