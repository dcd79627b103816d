//! Configuration management for the contact vault
//!
//! Configuration is read from a TOML file and may be layered with
//! `CONTACT_VAULT__SECTION__FIELD` environment variables. The retention
//! window and key refresh cadence are fixed constants, not settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::{
    MAX_KDF_ITERATIONS, MAX_KDF_MEMORY_KIB, MAX_KDF_PARALLELISM, MAX_SALT_SIZE, MIN_SALT_SIZE,
};
use crate::error::{ConfigError, ConfigResult};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Storage layout
    pub storage: StorageConfig,

    /// Archive encryption parameters
    pub encryption: EncryptionConfig,

    /// Where the passphrase comes from
    pub key_source: KeySourceConfig,

    /// Input validation for visit records
    pub validation: ValidationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Storage related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that holds the data directory
    pub base_dir: PathBuf,

    /// Name of the data directory under `base_dir`
    pub data_dir_name: String,

    /// File name prefix of the daily archives
    pub archive_prefix: String,

    /// Name of the export directory inside the data directory
    pub exports_dir_name: String,
}

/// Encryption configuration for newly created archives
///
/// Existing archives carry their own parameters in their manifest, so
/// changing these only affects archives created afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Encryption algorithm
    pub algorithm: String,

    /// Key derivation function
    pub kdf: String,

    /// Argon2 memory cost in KiB
    pub kdf_memory_kib: u32,

    /// Argon2 passes
    pub kdf_iterations: u32,

    /// Argon2 lanes
    pub kdf_parallelism: u32,

    /// Salt size in bytes
    pub salt_size: usize,
}

/// Passphrase source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeySourceConfig {
    /// Read from an environment variable
    Env { variable: String },

    /// Read from a property-keyed extension data file
    Datastore { path: PathBuf, property_id: String },

    /// Fixed value, for development setups only
    Inline { key: String },
}

/// Validation applied to visit fields before they are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum length of a single field, in characters
    pub max_field_length: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Console format
    pub format: LogFormat,

    /// Directory for daily-rolling JSON log files
    pub file_path: Option<PathBuf>,

    /// Enable console logging
    pub console: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

pub const DEFAULT_KEY_VARIABLE: &str = "CONTACT_VAULT_ENCRYPTION_KEY";

impl Default for StorageConfig {
    fn default() -> Self {
        let base_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("contact-vault");

        Self {
            base_dir,
            data_dir_name: "CovidCustomerDataFiles".to_string(),
            archive_prefix: "DailyCustomerData".to_string(),
            exports_dir_name: "Exports".to_string(),
        }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            algorithm: "AES-256-GCM".to_string(),
            kdf: "Argon2id".to_string(),
            kdf_memory_kib: 19 * 1024,
            kdf_iterations: 2,
            kdf_parallelism: 1,
            salt_size: 16,
        }
    }
}

impl Default for KeySourceConfig {
    fn default() -> Self {
        KeySourceConfig::Env {
            variable: DEFAULT_KEY_VARIABLE.to_string(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_field_length: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file_path: None,
            console: true,
        }
    }
}

impl StorageConfig {
    /// The directory that holds the daily archives
    pub fn storage_dir(&self) -> PathBuf {
        self.base_dir.join(&self.data_dir_name)
    }

    /// The directory that receives plaintext exports
    pub fn exports_dir(&self) -> PathBuf {
        self.storage_dir().join(&self.exports_dir_name)
    }
}

impl VaultConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_string_lossy().to_string(),
        })?;

        let config: VaultConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        config.validate()?;
        Ok(config)
    }

    /// Load defaults, then the file (if present), then `CONTACT_VAULT__*` variables
    pub fn load_layered<P: AsRef<Path>>(config_path: Option<P>) -> ConfigResult<Self> {
        let defaults = config::Config::try_from(&VaultConfig::default())
            .map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(
                config::File::from(path.as_ref())
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let config: VaultConfig = builder
            .add_source(
                config::Environment::with_prefix("CONTACT_VAULT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.data_dir_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.data_dir_name".to_string(),
                value: self.storage.data_dir_name.clone(),
            });
        }

        if self.storage.archive_prefix.trim().is_empty()
            || self.storage.archive_prefix.contains(['/', '\\'])
        {
            return Err(ConfigError::InvalidValue {
                field: "storage.archive_prefix".to_string(),
                value: self.storage.archive_prefix.clone(),
            });
        }

        if self.storage.exports_dir_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.exports_dir_name".to_string(),
                value: self.storage.exports_dir_name.clone(),
            });
        }

        if self.encryption.algorithm != "AES-256-GCM" {
            return Err(ConfigError::InvalidValue {
                field: "encryption.algorithm".to_string(),
                value: self.encryption.algorithm.clone(),
            });
        }

        if self.encryption.kdf != "Argon2id" {
            return Err(ConfigError::InvalidValue {
                field: "encryption.kdf".to_string(),
                value: self.encryption.kdf.clone(),
            });
        }

        if !(1..=MAX_KDF_ITERATIONS).contains(&self.encryption.kdf_iterations)
            || !(1..=MAX_KDF_PARALLELISM).contains(&self.encryption.kdf_parallelism)
        {
            return Err(ConfigError::InvalidValue {
                field: "encryption.kdf_iterations".to_string(),
                value: format!(
                    "{} (parallelism {})",
                    self.encryption.kdf_iterations, self.encryption.kdf_parallelism
                ),
            });
        }

        // Argon2 requires at least 8 KiB per lane
        if self.encryption.kdf_memory_kib < 8 * self.encryption.kdf_parallelism
            || self.encryption.kdf_memory_kib > MAX_KDF_MEMORY_KIB
        {
            return Err(ConfigError::InvalidValue {
                field: "encryption.kdf_memory_kib".to_string(),
                value: self.encryption.kdf_memory_kib.to_string(),
            });
        }

        if !(MIN_SALT_SIZE..=MAX_SALT_SIZE).contains(&self.encryption.salt_size) {
            return Err(ConfigError::InvalidValue {
                field: "encryption.salt_size".to_string(),
                value: self.encryption.salt_size.to_string(),
            });
        }

        if self.validation.max_field_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "validation.max_field_length".to_string(),
                value: "0".to_string(),
            });
        }

        match &self.key_source {
            KeySourceConfig::Env { variable } if variable.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "key_source.variable".to_string(),
                    value: variable.clone(),
                });
            }
            KeySourceConfig::Datastore { property_id, .. } if property_id.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    field: "key_source.property_id".to_string(),
                    value: property_id.clone(),
                });
            }
            _ => {}
        }

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("contact-vault").join("vault.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed {
                path: parent.to_string_lossy().to_string(),
                reason: e.to_string(),
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError { reason: e.to_string() })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
