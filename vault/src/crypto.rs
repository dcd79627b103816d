//! Archive encryption
//!
//! AES-256-GCM with an Argon2id key derived from the configured passphrase.
//! Every archive carries its own salt and KDF parameters in its manifest so
//! it can be reopened after the defaults change. Entries are sealed
//! individually with a fresh nonce and their entry name as associated data,
//! so a damaged or swapped entry fails on its own.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::EncryptionConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key_provider::Passphrase;

/// Version byte prepended to every sealed entry
pub const SEAL_VERSION: u8 = 1;

/// Ceilings for KDF parameters read back from a manifest
pub const MAX_KDF_MEMORY_KIB: u32 = 1024 * 1024;
pub const MAX_KDF_ITERATIONS: u32 = 16;
pub const MAX_KDF_PARALLELISM: u32 = 16;
pub const MIN_SALT_SIZE: usize = 8;
pub const MAX_SALT_SIZE: usize = 64;

const NONCE_SIZE: usize = 12;
const KEY_CHECK_PLAINTEXT: &[u8] = b"contact-vault key check";
const KEY_CHECK_AAD: &[u8] = b".key-check";

/// Key derivation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Parallelism factor
    pub parallelism: u32,

    /// Salt used for derivation
    pub salt: Vec<u8>,
}

/// Manifest stored alongside the entries of every archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    /// Version of the archive format
    pub version: u8,

    /// Algorithm used for encryption
    pub algorithm: String,

    /// Key derivation function used
    pub kdf: String,

    /// Key derivation parameters
    pub kdf_params: KdfParams,

    /// Known plaintext sealed with the archive key
    pub key_check: Vec<u8>,

    /// When the archive was created
    pub created_at: DateTime<Utc>,
}

/// An archive key derived from a passphrase
pub struct ArchiveCipher {
    cipher: Aes256Gcm,
}

impl KdfParams {
    /// Fresh parameters with a random salt
    pub fn generate(config: &EncryptionConfig) -> Self {
        let mut salt = vec![0u8; config.salt_size];
        OsRng.fill_bytes(&mut salt);

        Self {
            memory_kib: config.kdf_memory_kib,
            iterations: config.kdf_iterations,
            parallelism: config.kdf_parallelism,
            salt,
        }
    }

    /// Reject parameters outside the supported range
    ///
    /// Applied to every manifest read from disk before any key derivation.
    pub fn check(&self) -> CryptoResult<()> {
        let out_of_range = |what: &str, value: String| {
            Err(CryptoError::InvalidFormat {
                reason: format!("kdf {what} out of range: {value}"),
            })
        };

        if self.parallelism == 0 || self.parallelism > MAX_KDF_PARALLELISM {
            return out_of_range("parallelism", self.parallelism.to_string());
        }
        if self.iterations == 0 || self.iterations > MAX_KDF_ITERATIONS {
            return out_of_range("iterations", self.iterations.to_string());
        }
        // Argon2 requires at least 8 KiB per lane
        if self.memory_kib < 8 * self.parallelism || self.memory_kib > MAX_KDF_MEMORY_KIB {
            return out_of_range("memory", format!("{} KiB", self.memory_kib));
        }
        if !(MIN_SALT_SIZE..=MAX_SALT_SIZE).contains(&self.salt.len()) {
            return out_of_range("salt length", self.salt.len().to_string());
        }
        Ok(())
    }
}

impl ArchiveManifest {
    /// Create the manifest for a new archive, returning it with its cipher
    pub fn create(
        config: &EncryptionConfig,
        passphrase: &Passphrase,
    ) -> CryptoResult<(Self, ArchiveCipher)> {
        if config.algorithm != "AES-256-GCM" {
            return Err(CryptoError::UnsupportedAlgorithm(config.algorithm.clone()));
        }

        let kdf_params = KdfParams::generate(config);
        kdf_params.check()?;
        let cipher = ArchiveCipher::derive(passphrase, &kdf_params)?;
        let key_check = cipher.seal(KEY_CHECK_AAD, KEY_CHECK_PLAINTEXT)?;

        let manifest = Self {
            version: SEAL_VERSION,
            algorithm: config.algorithm.clone(),
            kdf: config.kdf.clone(),
            kdf_params,
            key_check,
            created_at: Utc::now(),
        };

        Ok((manifest, cipher))
    }

    /// Derive the cipher for this archive without checking it
    pub fn cipher(&self, passphrase: &Passphrase) -> CryptoResult<ArchiveCipher> {
        if self.algorithm != "AES-256-GCM" {
            return Err(CryptoError::UnsupportedAlgorithm(self.algorithm.clone()));
        }
        ArchiveCipher::derive(passphrase, &self.kdf_params)
    }

    /// Derive the cipher and confirm it opens the key check token
    pub fn unlock(&self, passphrase: &Passphrase) -> CryptoResult<ArchiveCipher> {
        let cipher = self.cipher(passphrase)?;
        if !cipher.verifies(&self.key_check) {
            return Err(CryptoError::AuthenticationFailed);
        }
        Ok(cipher)
    }

    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| CryptoError::InvalidFormat {
            reason: e.to_string(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let manifest: Self =
            serde_json::from_slice(bytes).map_err(|e| CryptoError::InvalidFormat {
                reason: format!("manifest: {e}"),
            })?;

        if manifest.version != SEAL_VERSION {
            return Err(CryptoError::InvalidFormat {
                reason: format!("unsupported archive version {}", manifest.version),
            });
        }
        manifest.kdf_params.check()?;

        Ok(manifest)
    }
}

impl ArchiveCipher {
    /// Derive an archive key with Argon2id
    pub fn derive(passphrase: &Passphrase, params: &KdfParams) -> CryptoResult<Self> {
        let argon_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(32),
        )
        .map_err(|e| CryptoError::KeyDerivationFailed { reason: e.to_string() })?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

        let mut key_bytes = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(passphrase.expose().as_bytes(), &params.salt, &mut key_bytes[..])
            .map_err(|e| CryptoError::KeyDerivationFailed { reason: e.to_string() })?;

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes[..]);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Seal `plaintext`, binding `aad` (the entry name) to the ciphertext
    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        sealed.push(SEAL_VERSION);
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Open a payload produced by [`ArchiveCipher::seal`]
    pub fn open(&self, aad: &[u8], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < 1 + NONCE_SIZE {
            return Err(CryptoError::InvalidFormat {
                reason: format!("{} bytes is too short", sealed.len()),
            });
        }

        if sealed[0] != SEAL_VERSION {
            return Err(CryptoError::InvalidFormat {
                reason: format!("unknown seal version {}", sealed[0]),
            });
        }

        let nonce = Nonce::from_slice(&sealed[1..1 + NONCE_SIZE]);
        self.cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &sealed[1 + NONCE_SIZE..],
                    aad,
                },
            )
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    fn verifies(&self, key_check: &[u8]) -> bool {
        matches!(self.open(KEY_CHECK_AAD, key_check), Ok(plain) if plain == KEY_CHECK_PLAINTEXT)
    }
}

#[cfg(test)]
pub(crate) fn fast_test_config() -> EncryptionConfig {
    EncryptionConfig {
        kdf_memory_kib: 64,
        kdf_iterations: 1,
        kdf_parallelism: 1,
        ..EncryptionConfig::default()
    }
}
