//! Storage back-ends for persisted license documents.
//!
//! Each store holds at most one document blob. Stores never interpret the
//! bytes; verification happens when the resolver opens them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use warden_crypto::sha256_hex;

use crate::error::{LicenseError, LicenseResult};

/// A named place a license document can be kept.
pub trait LicenseStore: Send + Sync {
    /// Name used in logs and resolution notes.
    fn name(&self) -> &str;

    /// Reads the stored blob, `None` when nothing is stored.
    fn read(&self) -> LicenseResult<Option<Vec<u8>>>;

    /// Replaces the stored blob.
    fn write(&self, bytes: &[u8]) -> LicenseResult<()>;

    /// Removes the stored blob. Deleting an empty store succeeds.
    fn delete(&self) -> LicenseResult<()>;
}

/// A document kept in a single file.
#[derive(Debug, Clone)]
pub struct FileStore {
    name: String,
    path: PathBuf,
}

impl FileStore {
    /// A store called `name` kept at `path`. Parent directories are created
    /// on the first write.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// The shared application-data copy: `{dir}/{file_name}`.
    pub fn shared(dir: &Path, file_name: &str) -> Self {
        Self::new("shared", dir.join(file_name))
    }

    /// File the document is kept in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LicenseStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> LicenseResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LicenseError::Storage(format!(
                "{}: cannot read {}: {e}",
                self.name,
                self.path.display()
            ))),
        }
    }

    fn write(&self, bytes: &[u8]) -> LicenseResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LicenseError::Storage(format!(
                    "{}: cannot create {}: {e}",
                    self.name,
                    parent.display()
                ))
            })?;
        }
        fs::write(&self.path, bytes).map_err(|e| {
            LicenseError::Storage(format!(
                "{}: cannot write {}: {e}",
                self.name,
                self.path.display()
            ))
        })?;
        debug!(store = %self.name, path = %self.path.display(), "license written");
        Ok(())
    }

    fn delete(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(store = %self.name, path = %self.path.display(), "license deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseError::Storage(format!(
                "{}: cannot delete {}: {e}",
                self.name,
                self.path.display()
            ))),
        }
    }
}

/// The per-user copy. The file name is a digest of the license file name so
/// the copy is not obvious to browse for.
#[derive(Debug, Clone)]
pub struct UserStore {
    inner: FileStore,
}

impl UserStore {
    /// The per-user copy of `license_file_name` inside `dir`.
    pub fn new(dir: &Path, license_file_name: &str) -> Self {
        let file = sha256_hex(license_file_name.as_bytes());
        Self {
            inner: FileStore::new("user", dir.join(file)),
        }
    }

    /// Hashed file the document is kept in.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

impl LicenseStore for UserStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read(&self) -> LicenseResult<Option<Vec<u8>>> {
        self.inner.read()
    }

    fn write(&self, bytes: &[u8]) -> LicenseResult<()> {
        self.inner.write(bytes)
    }

    fn delete(&self) -> LicenseResult<()> {
        self.inner.delete()
    }
}

/// An in-process store, used as a host-scoped cache and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    slot: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(None),
        }
    }

    /// A store already holding `bytes`.
    pub fn with_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(Some(bytes)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LicenseStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> LicenseResult<Option<Vec<u8>>> {
        Ok(self.slot().clone())
    }

    fn write(&self, bytes: &[u8]) -> LicenseResult<()> {
        *self.slot() = Some(bytes.to_vec());
        Ok(())
    }

    fn delete(&self) -> LicenseResult<()> {
        *self.slot() = None;
        Ok(())
    }
}

/// Deletes the document from every store.
///
/// Every store is attempted; the first error is returned afterwards.
pub fn delete_everywhere(stores: &[Box<dyn LicenseStore>]) -> LicenseResult<()> {
    let mut first_error = None;
    for store in stores {
        if let Err(e) = store.delete() {
            warn!(store = store.name(), error = %e, "failed to delete license");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Writes `bytes` to every store. Succeeds when at least one write does.
pub fn write_everywhere(stores: &[Box<dyn LicenseStore>], bytes: &[u8]) -> LicenseResult<usize> {
    let mut written = 0;
    let mut failures = Vec::new();
    for store in stores {
        match store.write(bytes) {
            Ok(()) => written += 1,
            Err(e) => {
                warn!(store = store.name(), error = %e, "failed to write license");
                failures.push(e.to_string());
            }
        }
    }
    if written == 0 {
        return Err(LicenseError::Storage(if failures.is_empty() {
            "no license stores are configured".to_string()
        } else {
            failures.join("; ")
        }));
    }
    Ok(written)
}

/// Replaces every stored copy with `bytes`: deletes all copies, then writes.
pub fn replace_everywhere(stores: &[Box<dyn LicenseStore>], bytes: &[u8]) -> LicenseResult<usize> {
    delete_everywhere(stores)?;
    write_everywhere(stores, bytes)
}
