//! Passphrase resolution
//!
//! The passphrase lives in an external configuration store. `KeyProvider`
//! holds the most recently read value behind an `RwLock<Arc<_>>`: readers
//! clone the `Arc`, `refresh` swaps it. A failed read keeps the previous
//! value.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::KeySourceConfig;
use crate::error::{KeyError, KeyResult};

/// Secret passphrase that zeroes itself on drop
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase {
    secret: String,
}

impl Passphrase {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn expose(&self) -> &str {
        &self.secret
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.secret.as_bytes()).into()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// A configuration store that can be asked for the current passphrase
pub trait KeySource: Send + Sync {
    /// `Ok(None)` means the store answered and no key is set
    fn read_key(&self) -> KeyResult<Option<Passphrase>>;

    /// Short description for logs; must not include the key
    fn describe(&self) -> String;
}

/// Reads the passphrase from an environment variable
pub struct EnvKeySource {
    variable: String,
}

impl EnvKeySource {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl KeySource for EnvKeySource {
    fn read_key(&self) -> KeyResult<Option<Passphrase>> {
        match std::env::var(&self.variable) {
            Ok(value) => Ok(Some(Passphrase::new(value))),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(KeyError::NotUnicode {
                name: self.variable.clone(),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("environment variable {}", self.variable)
    }
}

/// Reads `EncryptionKey` for one property from an extension data file
///
/// ```toml
/// [property."1"]
/// EncryptionKey = "..."
/// ```
pub struct DatastoreKeySource {
    path: PathBuf,
    property_id: String,
}

#[derive(Deserialize)]
struct ExtensionData {
    #[serde(default)]
    property: std::collections::HashMap<String, PropertyValues>,
}

#[derive(Deserialize)]
struct PropertyValues {
    #[serde(rename = "EncryptionKey")]
    encryption_key: Option<String>,
}

impl DatastoreKeySource {
    pub fn new(path: impl Into<PathBuf>, property_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            property_id: property_id.into(),
        }
    }
}

impl KeySource for DatastoreKeySource {
    fn read_key(&self) -> KeyResult<Option<Passphrase>> {
        let content = fs::read_to_string(&self.path).map_err(|source| KeyError::Unreadable {
            path: self.path.clone(),
            source,
        })?;

        let data: ExtensionData = toml::from_str(&content).map_err(|e| KeyError::Malformed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        Ok(data
            .property
            .get(&self.property_id)
            .and_then(|values| values.encryption_key.clone())
            .map(Passphrase::new))
    }

    fn describe(&self) -> String {
        format!(
            "datastore {} (property {})",
            self.path.display(),
            self.property_id
        )
    }
}

/// A fixed or test-controlled passphrase
pub struct StaticKeySource {
    key: RwLock<Option<Passphrase>>,
}

impl StaticKeySource {
    pub fn new(key: Option<&str>) -> Self {
        Self {
            key: RwLock::new(key.map(Passphrase::new)),
        }
    }

    /// Replace the stored key; takes effect on the provider's next refresh
    pub fn set(&self, key: Option<&str>) {
        *self.key.write().unwrap_or_else(PoisonError::into_inner) = key.map(Passphrase::new);
    }
}

impl KeySource for StaticKeySource {
    fn read_key(&self) -> KeyResult<Option<Passphrase>> {
        Ok(self
            .key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn describe(&self) -> String {
        "static key".to_string()
    }
}

/// Build the key source named by the configuration
pub fn key_source_from_config(config: &KeySourceConfig) -> Arc<dyn KeySource> {
    match config {
        KeySourceConfig::Env { variable } => Arc::new(EnvKeySource::new(variable.clone())),
        KeySourceConfig::Datastore { path, property_id } => {
            Arc::new(DatastoreKeySource::new(path.clone(), property_id.clone()))
        }
        KeySourceConfig::Inline { key } => Arc::new(StaticKeySource::new(Some(key))),
    }
}

/// Holds the currently configured passphrase
pub struct KeyProvider {
    source: Arc<dyn KeySource>,
    current: RwLock<Arc<Passphrase>>,
}

impl KeyProvider {
    /// Create a provider and perform the initial read
    pub fn new(source: Arc<dyn KeySource>) -> Self {
        let provider = Self {
            source,
            current: RwLock::new(Arc::new(Passphrase::default())),
        };
        provider.refresh();
        provider
    }

    /// The passphrase as of the last successful refresh
    pub fn current(&self) -> Arc<Passphrase> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-read the key source; keeps the previous key if the read fails
    pub fn refresh(&self) {
        match self.source.read_key() {
            Ok(key) => {
                let key = key.unwrap_or_default();
                let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
                if current.digest() != key.digest() {
                    tracing::info!(
                        source = %self.source.describe(),
                        configured = !key.is_empty(),
                        "Encryption key changed"
                    );
                }
                *current = Arc::new(key);
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.source.describe(),
                    error = %e,
                    "Failed to refresh encryption key, keeping previous value"
                );
            }
        }
    }

    /// Whether a non-empty key is configured
    pub fn is_configured(&self) -> bool {
        !self.current().is_empty()
    }

    /// Compare a candidate against the configured key in constant time
    pub fn matches(&self, candidate: &str) -> bool {
        let current = self.current();
        if current.is_empty() {
            return false;
        }

        let expected = current.digest();
        let provided = Passphrase::new(candidate).digest();
        bool::from(provided[..].ct_eq(&expected[..]))
    }
}

impl fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyProvider")
            .field("source", &self.source.describe())
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FailingSource;

    impl KeySource for FailingSource {
        fn read_key(&self) -> KeyResult<Option<Passphrase>> {
            Err(KeyError::Malformed {
                path: PathBuf::from("broken.toml"),
                reason: "unreadable".to_string(),
            })
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    #[test]
    fn test_refresh_picks_up_new_key() {
        let source = Arc::new(StaticKeySource::new(Some("first")));
        let provider = KeyProvider::new(source.clone());
        assert_eq!(provider.current().expose(), "first");

        source.set(Some("second"));
        assert_eq!(provider.current().expose(), "first");

        provider.refresh();
        assert_eq!(provider.current().expose(), "second");
    }

    #[test]
    fn test_removed_key_becomes_unconfigured() {
        let source = Arc::new(StaticKeySource::new(Some("first")));
        let provider = KeyProvider::new(source.clone());
        assert!(provider.is_configured());

        source.set(None);
        provider.refresh();
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_failed_read_keeps_previous_key() {
        let provider = KeyProvider::new(Arc::new(FailingSource));
        assert!(!provider.is_configured());

        *provider.current.write().unwrap() = Arc::new(Passphrase::new("held"));
        provider.refresh();
        assert_eq!(provider.current().expose(), "held");
    }

    #[test]
    fn test_matches() {
        let provider = KeyProvider::new(Arc::new(StaticKeySource::new(Some("s3cret"))));
        assert!(provider.matches("s3cret"));
        assert!(!provider.matches("s3cret "));
        assert!(!provider.matches(""));

        let unconfigured = KeyProvider::new(Arc::new(StaticKeySource::new(None)));
        assert!(!unconfigured.matches(""));
    }

    #[test]
    fn test_datastore_source() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("extension-data.toml");
        fs::write(
            &path,
            r#"
[property."1"]
EncryptionKey = "store one"

[property."2"]
"#,
        )
        .unwrap();

        let one = DatastoreKeySource::new(&path, "1").read_key().unwrap();
        assert_eq!(one.unwrap().expose(), "store one");

        assert!(DatastoreKeySource::new(&path, "2").read_key().unwrap().is_none());
        assert!(DatastoreKeySource::new(&path, "3").read_key().unwrap().is_none());

        let missing = DatastoreKeySource::new(temp_dir.path().join("none.toml"), "1").read_key();
        assert!(matches!(missing, Err(KeyError::Unreadable { .. })));
    }

    #[test]
    fn test_debug_never_shows_secret() {
        let passphrase = Passphrase::new("do-not-print");
        assert!(!format!("{:?}", passphrase).contains("do-not-print"));

        let provider = KeyProvider::new(Arc::new(StaticKeySource::new(Some("do-not-print"))));
        assert!(!format!("{:?}", provider).contains("do-not-print"));
    }
}
