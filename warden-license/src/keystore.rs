//! The local installation keypair.
//!
//! Documents written to the stores are re-signed with a keypair generated
//! on first install. The secret is sealed at rest; a keypair that exists
//! but cannot be opened is fatal.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info};
use warden_crypto::{open_secret, seal_secret, KdfParams, KeyPair, SealedSecret, SigningKey};

use crate::error::{LicenseError, LicenseResult};

/// Loads and saves the installation keypair.
pub trait KeyStore: Send + Sync {
    /// The stored key, `None` when none has been saved.
    fn load(&self) -> LicenseResult<Option<SigningKey>>;

    fn save(&self, key: &SigningKey) -> LicenseResult<()>;

    /// Removes the stored key. Deleting a missing key succeeds.
    fn delete(&self) -> LicenseResult<()>;

    /// The stored key, generating and saving a new one when none exists.
    fn load_or_create(&self) -> LicenseResult<SigningKey> {
        if let Some(key) = self.load()? {
            return Ok(key);
        }
        let pair = KeyPair::generate();
        self.save(&pair.signing_key)?;
        info!(public_key = %pair.verifying_key.to_base64(), "generated installation keypair");
        Ok(pair.signing_key)
    }
}

/// A keypair sealed with ChaCha20-Poly1305 in a file.
pub struct ProtectedKeyFile {
    path: PathBuf,
    entropy: Vec<u8>,
    params: KdfParams,
}

impl ProtectedKeyFile {
    pub fn new(path: impl Into<PathBuf>, entropy: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            entropy: entropy.into(),
            params: KdfParams::default(),
        }
    }

    /// Overrides the key-derivation cost.
    #[must_use]
    pub fn with_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyStore for ProtectedKeyFile {
    fn load(&self) -> LicenseResult<Option<SigningKey>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LicenseError::CorruptKeypair(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let sealed = SealedSecret::from_bytes(&bytes)
            .map_err(|e| LicenseError::CorruptKeypair(e.to_string()))?;
        let secret = open_secret(&self.entropy, &sealed, &self.params)
            .map_err(|e| LicenseError::CorruptKeypair(e.to_string()))?;
        let key = SigningKey::from_slice(&secret)
            .map_err(|e| LicenseError::CorruptKeypair(e.to_string()))?;
        debug!(path = %self.path.display(), "installation keypair loaded");
        Ok(Some(key))
    }

    fn save(&self, key: &SigningKey) -> LicenseResult<()> {
        let sealed = seal_secret(&self.entropy, &key.to_bytes(), &self.params)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LicenseError::Storage(e.to_string()))?;
        }
        fs::write(&self.path, sealed.to_bytes()).map_err(|e| {
            LicenseError::Storage(format!("cannot write {}: {e}", self.path.display()))
        })
    }

    fn delete(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseError::Storage(format!(
                "cannot delete {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Unprotected in-memory key storage for tests and embedded hosts.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    slot: Mutex<Option<Vec<u8>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: &SigningKey) -> Self {
        Self::with_raw(key.to_bytes().to_vec())
    }

    /// Stores arbitrary bytes as the secret.
    pub fn with_raw(bytes: Vec<u8>) -> Self {
        Self {
            slot: Mutex::new(Some(bytes)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self) -> LicenseResult<Option<SigningKey>> {
        self.slot()
            .as_deref()
            .map(|bytes| {
                SigningKey::from_slice(bytes).map_err(|e| LicenseError::CorruptKeypair(e.to_string()))
            })
            .transpose()
    }

    fn save(&self, key: &SigningKey) -> LicenseResult<()> {
        *self.slot() = Some(key.to_bytes().to_vec());
        Ok(())
    }

    fn delete(&self) -> LicenseResult<()> {
        *self.slot() = None;
        Ok(())
    }
}
