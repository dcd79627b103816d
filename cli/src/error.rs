use contact_vault::{ConfigError, ExportError, StoreError, VaultError, WriteError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("Configuration file already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Operation cancelled by user")]
    Cancelled,

    /// Already shown to the operator through the prompter
    #[error("{0}")]
    Reported(Box<CliError>),
}

impl CliError {
    /// Wrap an error whose message the operator has already seen
    pub fn reported(error: impl Into<CliError>) -> Self {
        CliError::Reported(Box::new(error.into()))
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, CliError::Reported(_))
    }

    /// The library error behind this one, if any
    pub fn vault_error(&self) -> Option<&VaultError> {
        match self {
            CliError::Vault(e) => Some(e),
            CliError::Reported(inner) => inner.vault_error(),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Reported(inner) => inner.exit_code(),
            CliError::Config(_) | CliError::Vault(VaultError::Config(_)) => 2,
            CliError::Vault(VaultError::Write(WriteError::NoKey))
            | CliError::Vault(VaultError::Export(ExportError::NoKey)) => 3,
            CliError::Vault(VaultError::Export(ExportError::Unauthorized))
            | CliError::Vault(VaultError::Write(WriteError::Store(StoreError::WrongKey { .. }))) => 4,
            CliError::Vault(VaultError::Write(WriteError::InvalidField { .. })) => 5,
            CliError::Io(_) | CliError::Vault(VaultError::Io(_)) => 6,
            CliError::AlreadyExists { .. } => 7,
            CliError::Cancelled => 130, // Standard Unix signal for SIGINT
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Format error for user-friendly display
pub fn format_error(error: &CliError) -> String {
    match error {
        CliError::Config(e) | CliError::Vault(VaultError::Config(e)) => {
            format!("Configuration Error: {}\n\nTry running 'contactctl config validate' to check your configuration.", e)
        }
        CliError::Vault(VaultError::Write(WriteError::NoKey))
        | CliError::Vault(VaultError::Export(ExportError::NoKey)) => {
            "Encryption key is not configured.\n\nSet CONTACT_VAULT_ENCRYPTION_KEY or configure [key_source] in the configuration file.".to_string()
        }
        CliError::Vault(VaultError::Export(ExportError::Unauthorized)) => {
            "Incorrect encryption key.".to_string()
        }
        CliError::Vault(VaultError::Write(WriteError::Store(StoreError::WrongKey { path }))) => {
            format!("Today's archive {} was sealed with a different key.\n\nRecords for today cannot be added until the previous key is restored.", path.display())
        }
        CliError::AlreadyExists { path } => {
            format!("Configuration file already exists: {}\n\nUse --force to overwrite it.", path)
        }
        CliError::Cancelled => "Operation cancelled by user.".to_string(),
        _ => error.to_string(),
    }
}
