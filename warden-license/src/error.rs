//! Error types for the licensing core.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why an upgrade document was refused. Checked before any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UpgradeRejection {
    /// The incoming document has no UID.
    #[error("incoming license has an empty UID")]
    EmptyUid,

    /// The incoming hardware key was issued for another machine.
    #[error("hardware key does not match this machine")]
    HardwareMismatch,

    /// The incoming license key does not match the installed license.
    #[error("license key does not match the installed license")]
    KeyMismatch,

    /// The incoming UID is already installed or was already upgraded from.
    #[error("license has already been applied")]
    RedundantUid,

    /// The incoming product version is older than the installed one.
    #[error("product version would regress")]
    VersionRegression,

    /// The incoming document is for a different product.
    #[error("license is for a different product")]
    ProductMismatch,
}

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Zero, multiple or unverifiable signature blocks.
    #[error("license signature invalid: {0}")]
    SignatureInvalid(String),

    /// Every source was empty or unreadable. Carries the per-source notes.
    #[error("no license found: {0}")]
    NoCandidateFound(String),

    /// No top-level constraint granted access.
    #[error("license validation failed: {0}")]
    ConstraintValidationFailed(String),

    /// The upgrade document was refused.
    #[error("upgrade rejected: {0}")]
    UpgradeRejected(#[from] UpgradeRejection),

    /// The local installation keypair cannot be read.
    #[error("installation keypair is corrupt: {0}")]
    CorruptKeypair(String),

    /// No local keypair exists, so nothing has been installed.
    #[error("no license is installed")]
    NotInstalled,

    /// The license was issued for another machine.
    #[error("license is bound to another machine")]
    HardwareMismatch,

    /// The system clock is earlier than the last recorded access.
    #[error("system clock was set back: last access {last_accessed} is after {now}")]
    ClockRollback {
        last_accessed: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    /// The document is structurally invalid.
    #[error("invalid license document: {0}")]
    InvalidDocument(String),

    /// The unlock code is unusable.
    #[error("invalid unlock code: {0}")]
    InvalidUnlockCode(String),

    /// No matching resource in a license container.
    #[error("license resource not found: {0}")]
    ResourceNotFound(String),

    /// Deployment manifest could not be read or written.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying crypto failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] warden_crypto::CryptoError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
