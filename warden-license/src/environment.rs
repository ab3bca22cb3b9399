//! The collaborators a license operation runs against.
//!
//! Everything validation, installation and upgrade need from the outside
//! world is held here and passed in explicitly.

use std::sync::Arc;

use tracing::warn;
use warden_crypto::VerifyingKey;
use warden_types::{Clock, SystemClock};

use crate::config::WardenConfig;
use crate::container::DEFAULT_UNLOCK_CODE;
use crate::device::{HardwareIdentity, HostHardware};
use crate::error::LicenseResult;
use crate::keystore::{KeyStore, ProtectedKeyFile};
use crate::manifest::{ManifestFile, ProductManifest};
use crate::store::{FileStore, LicenseStore, UserStore};

pub struct LicenseEnvironment {
    /// Verifies documents distributed by the issuer.
    pub issuer_key: VerifyingKey,
    /// Holds the installation keypair that signs stored copies.
    pub key_store: Box<dyn KeyStore>,
    pub manifest: Box<dyn ProductManifest>,
    pub hardware: Box<dyn HardwareIdentity>,
    pub clock: Arc<dyn Clock>,
    /// Stores in resolution order; the first is the primary copy.
    pub stores: Vec<Box<dyn LicenseStore>>,
    pub default_unlock_code: String,
}

impl LicenseEnvironment {
    /// An environment with the host's hardware identity, the system clock
    /// and no stores.
    pub fn new(
        issuer_key: VerifyingKey,
        key_store: impl KeyStore + 'static,
        manifest: impl ProductManifest + 'static,
    ) -> Self {
        Self {
            issuer_key,
            key_store: Box::new(key_store),
            manifest: Box::new(manifest),
            hardware: Box::new(HostHardware),
            clock: Arc::new(SystemClock),
            stores: Vec::new(),
            default_unlock_code: DEFAULT_UNLOCK_CODE.to_string(),
        }
    }

    #[must_use]
    pub fn with_hardware(mut self, hardware: impl HardwareIdentity + 'static) -> Self {
        self.hardware = Box::new(hardware);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: impl LicenseStore + 'static) -> Self {
        self.stores.push(Box::new(store));
        self
    }

    #[must_use]
    pub fn with_default_unlock_code(mut self, code: impl Into<String>) -> Self {
        self.default_unlock_code = code.into();
        self
    }

    /// Builds the file-backed environment described by `config`.
    pub fn from_config(config: &WardenConfig) -> LicenseResult<Self> {
        let key_store = ProtectedKeyFile::new(config.key_path()?, config.key_entropy.as_bytes());
        let manifest = ManifestFile::new(config.manifest_path()?);
        let license_file = config.license_file_name();

        let mut env = Self::new(config.issuer_key()?, key_store, manifest)
            .with_default_unlock_code(config.default_unlock_code.clone())
            .with_store(FileStore::shared(&config.data_dir()?, &license_file));

        if config.user_store {
            match config.user_store_dir() {
                Some(dir) => env = env.with_store(UserStore::new(&dir, &license_file)),
                None => warn!("no per-user data directory, user store disabled"),
            }
        }
        Ok(env)
    }
}
