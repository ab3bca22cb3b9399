//! Deployment manifest (`product.toml`).
//!
//! Supplies the product's public identity at install time and is removed
//! again on uninstall.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use warden_types::Version;

use crate::error::{LicenseError, LicenseResult};
use crate::identity::ProductIdentity;

/// Public identity of an installed product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    /// Short product name, used to match license resources.
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub description: String,
    /// Where the product keeps its license and key files.
    pub data_folder: PathBuf,
}

impl DeploymentManifest {
    /// Checks required fields.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.name.trim().is_empty() {
            return Err(LicenseError::Manifest("product name is empty".to_string()));
        }
        if self.name.contains('.') {
            return Err(LicenseError::Manifest(format!(
                "product name `{}` must not contain '.'",
                self.name
            )));
        }
        Ok(())
    }

    /// Product identity block for a newly installed document.
    #[must_use]
    pub fn to_product(&self) -> ProductIdentity {
        ProductIdentity {
            short_name: self.name.clone(),
            full_name: self.full_name.clone(),
            version: self.version.clone(),
            developer: self.publisher.clone(),
            description: self.description.clone(),
            is_licensed: false,
            file_path: self.data_folder.display().to_string(),
        }
    }

    pub fn from_toml_str(s: &str) -> LicenseResult<Self> {
        let manifest: Self = toml::from_str(s).map_err(|e| LicenseError::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_toml_string(&self) -> LicenseResult<String> {
        toml::to_string_pretty(self).map_err(|e| LicenseError::Manifest(e.to_string()))
    }
}

/// Reads, writes and removes the deployment manifest.
pub trait ProductManifest: Send + Sync {
    fn read(&self) -> LicenseResult<DeploymentManifest>;

    fn write(&self, manifest: &DeploymentManifest) -> LicenseResult<()>;

    /// Removes the manifest. Removing a missing manifest succeeds.
    fn delete(&self) -> LicenseResult<()>;
}

/// A manifest stored as a TOML file.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProductManifest for ManifestFile {
    fn read(&self) -> LicenseResult<DeploymentManifest> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            LicenseError::Manifest(format!("cannot read {}: {e}", self.path.display()))
        })?;
        DeploymentManifest::from_toml_str(&text)
    }

    fn write(&self, manifest: &DeploymentManifest) -> LicenseResult<()> {
        manifest.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| LicenseError::Manifest(e.to_string()))?;
        }
        fs::write(&self.path, manifest.to_toml_string()?).map_err(|e| {
            LicenseError::Manifest(format!("cannot write {}: {e}", self.path.display()))
        })
    }

    fn delete(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseError::Manifest(format!(
                "cannot delete {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// A manifest held in memory. Writes replace it; deletes are ignored.
#[derive(Debug)]
pub struct StaticManifest {
    manifest: std::sync::Mutex<DeploymentManifest>,
}

impl StaticManifest {
    pub fn new(manifest: DeploymentManifest) -> Self {
        Self {
            manifest: std::sync::Mutex::new(manifest),
        }
    }
}

impl ProductManifest for StaticManifest {
    fn read(&self) -> LicenseResult<DeploymentManifest> {
        Ok(self
            .manifest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn write(&self, manifest: &DeploymentManifest) -> LicenseResult<()> {
        manifest.validate()?;
        *self.manifest.lock().unwrap_or_else(|e| e.into_inner()) = manifest.clone();
        Ok(())
    }

    fn delete(&self) -> LicenseResult<()> {
        Ok(())
    }
}
