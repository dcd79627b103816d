//! Contact vault library
//!
//! Stores point-of-sale visit records (name, phone number, timestamp) in
//! per-day encrypted archives, purges them after a rolling retention window
//! and supports a supervised plaintext export.

pub mod config;
pub mod crypto;
pub mod error;
pub mod export;
pub mod host;
pub mod key_provider;
pub mod logging;
pub mod record;
pub mod refresh;
pub mod retention;
pub mod store;
pub mod validation;
pub mod writer;

// Re-export commonly used types
pub use config::VaultConfig;
pub use error::{
    ConfigError, CryptoError, ExportError, KeyError, Result, StoreError, VaultError, WriteError,
};
pub use export::{ExportAggregator, ExportOutcome, ExportSink, ExportSummary, FileExportSink};
pub use host::{ContactVault, Prompter, VaultStatus};
pub use key_provider::{KeyProvider, KeySource, Passphrase, StaticKeySource};
pub use record::Record;
pub use refresh::{spawn_key_refresh, KEY_REFRESH_INTERVAL};
pub use retention::{Purger, RetentionPolicy, SweepReport, RETENTION_WINDOW_DAYS};
pub use store::{AppendReceipt, ArchiveContents, ArchiveHandle, ArchiveStore};
pub use writer::{RecordWriter, WriteOutcome};
