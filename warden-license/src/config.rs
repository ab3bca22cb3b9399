//! Configuration loaded from `warden.toml`.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! ```toml
//! product = "Acme"
//! data_dir = "/var/lib/acme"
//! user_store = true
//! issuer_public_key = "base64..."
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use warden_crypto::VerifyingKey;

use crate::container::DEFAULT_UNLOCK_CODE;
use crate::error::{LicenseError, LicenseResult};

/// Paths and defaults for one licensed product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Short product name.
    pub product: String,
    /// Shared application-data directory. Defaults to the platform data
    /// directory joined with the product name.
    pub data_dir: Option<PathBuf>,
    /// License file prefix; the product name when empty.
    pub license_prefix: String,
    /// Keep a second copy in the per-user store.
    pub user_store: bool,
    /// Per-user store directory. Defaults to the platform local data
    /// directory.
    pub user_store_dir: Option<PathBuf>,
    pub key_file: String,
    pub manifest_file: String,
    pub default_unlock_code: String,
    /// Entropy mixed into the key that seals the installation keypair.
    pub key_entropy: String,
    /// Base64 Ed25519 public key of the license issuer.
    pub issuer_public_key: Option<String>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            product: "product".to_string(),
            data_dir: None,
            license_prefix: String::new(),
            user_store: true,
            user_store_dir: None,
            key_file: "installation.key".to_string(),
            manifest_file: "product.toml".to_string(),
            default_unlock_code: DEFAULT_UNLOCK_CODE.to_string(),
            key_entropy: "warden-installation-key".to_string(),
            issuer_public_key: None,
        }
    }
}

impl WardenConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> LicenseResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| LicenseError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(s: &str) -> LicenseResult<Self> {
        toml::from_str(s).map_err(|e| LicenseError::Config(e.to_string()))
    }

    pub fn data_dir(&self) -> LicenseResult<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(&self.product))
            .ok_or_else(|| LicenseError::Config("no platform data directory".to_string()))
    }

    /// Per-user store directory, if one can be determined.
    #[must_use]
    pub fn user_store_dir(&self) -> Option<PathBuf> {
        self.user_store_dir.clone().or_else(|| {
            dirs::data_local_dir().map(|d| d.join("warden").join(&self.product))
        })
    }

    /// `{prefix}.License.lic`
    #[must_use]
    pub fn license_file_name(&self) -> String {
        let prefix = if self.license_prefix.trim().is_empty() {
            &self.product
        } else {
            &self.license_prefix
        };
        format!("{prefix}.License.lic")
    }

    pub fn license_path(&self) -> LicenseResult<PathBuf> {
        Ok(self.data_dir()?.join(self.license_file_name()))
    }

    pub fn key_path(&self) -> LicenseResult<PathBuf> {
        Ok(self.data_dir()?.join(&self.key_file))
    }

    pub fn manifest_path(&self) -> LicenseResult<PathBuf> {
        Ok(self.data_dir()?.join(&self.manifest_file))
    }

    /// The configured issuer public key.
    pub fn issuer_key(&self) -> LicenseResult<VerifyingKey> {
        let encoded = self
            .issuer_public_key
            .as_deref()
            .ok_or_else(|| LicenseError::Config("issuer_public_key is not set".to_string()))?;
        VerifyingKey::from_base64(encoded)
            .map_err(|e| LicenseError::Config(format!("issuer_public_key: {e}")))
    }
}
