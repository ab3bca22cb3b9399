//! Core type definitions for Warden.
//!
//! This crate defines the small value types shared by the licensing crates:
//! - License, installation and scope identifiers
//! - Dotted numeric product versions
//! - An injectable wall clock
//!
//! Nothing in here knows about constraints, signatures or storage.

mod clock;
mod ids;
mod version;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ids::{InstanceId, LicenseUid, ScopeId};
pub use version::Version;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid version: {0}")]
    InvalidVersion(String),
}
