//! Unlock-code resource containers.
//!
//! A vendor can ship several signed licenses in one container and let the
//! customer unlock one with a code. A resource is selected when its name
//! contains `.{product}.` and `__{code}__`.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{LicenseError, LicenseResult};

/// Unlock code used when the caller supplies none.
pub const DEFAULT_UNLOCK_CODE: &str = "EVALUATION";

/// Shortest accepted unlock code.
pub const MIN_UNLOCK_CODE_LEN: usize = 5;

/// A named collection of license blobs.
pub trait ResourceContainer {
    fn resource_names(&self) -> LicenseResult<Vec<String>>;

    fn open(&self, name: &str) -> LicenseResult<Vec<u8>>;
}

/// Every file in a directory is a resource.
#[derive(Debug, Clone)]
pub struct DirectoryContainer {
    dir: PathBuf,
}

impl DirectoryContainer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ResourceContainer for DirectoryContainer {
    fn resource_names(&self) -> LicenseResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            LicenseError::ResourceNotFound(format!("cannot list {}: {e}", self.dir.display()))
        })?;
        let mut names = Vec::new();
        for entry in entries.flatten() {
            if entry.file_type().is_ok_and(|t| t.is_file())
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn open(&self, name: &str) -> LicenseResult<Vec<u8>> {
        fs::read(self.dir.join(name)).map_err(|e| {
            LicenseError::ResourceNotFound(format!("cannot read resource {name}: {e}"))
        })
    }
}

/// Resources held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    resources: Vec<(String, Vec<u8>)>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resource(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.resources.push((name.into(), bytes));
        self
    }
}

impl ResourceContainer for MemoryContainer {
    fn resource_names(&self) -> LicenseResult<Vec<String>> {
        Ok(self.resources.iter().map(|(name, _)| name.clone()).collect())
    }

    fn open(&self, name: &str) -> LicenseResult<Vec<u8>> {
        self.resources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| LicenseError::ResourceNotFound(name.to_string()))
    }
}

/// Picks the resource unlocked by `code` for `product`.
///
/// A missing or blank code falls back to `default_code`.
pub fn find_unlocked(
    container: &dyn ResourceContainer,
    product: &str,
    code: Option<&str>,
    default_code: &str,
) -> LicenseResult<(String, Vec<u8>)> {
    let code = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(default_code)
        .trim();
    if code.chars().count() < MIN_UNLOCK_CODE_LEN {
        return Err(LicenseError::InvalidUnlockCode(format!(
            "unlock codes have at least {MIN_UNLOCK_CODE_LEN} characters"
        )));
    }

    let names = container.resource_names()?;
    if names.is_empty() {
        return Err(LicenseError::ResourceNotFound(
            "the license container is empty".to_string(),
        ));
    }

    let product_marker = format!(".{product}.");
    let code_marker = format!("__{code}__");
    let name = names
        .into_iter()
        .find(|n| n.contains(&product_marker) && n.contains(&code_marker))
        .ok_or_else(|| {
            LicenseError::ResourceNotFound(format!(
                "no license for product {product} matches the unlock code"
            ))
        })?;

    debug!(resource = %name, product, "unlock code matched");
    let bytes = container.open(&name)?;
    Ok((name, bytes))
}
