//! Machine-bound software licensing.
//!
//! A license is a signed JSON document carrying identity blocks, usage
//! statistics and a tree of constraints. This crate:
//!
//! - seals and opens signed documents ([`LicenseDocument::seal`], [`LicenseDocument::open`])
//! - evaluates constraint trees against a target and a clock
//! - resolves one canonical copy among several stores
//! - installs, upgrades and uninstalls licenses on a machine
//! - answers validation requests through [`LicenseProvider`]
//!
//! All collaborators (key store, manifest, hardware identity, clock and
//! stores) are passed in through a [`LicenseEnvironment`].

mod config;
pub mod constraint;
mod container;
mod device;
mod document;
mod envelope;
mod environment;
mod error;
mod identity;
mod installer;
mod keystore;
mod manifest;
mod provider;
mod resolver;
mod statistics;
mod store;
mod upgrade;

pub use config::WardenConfig;
pub use constraint::{
    Beta, ConstraintCaps, ConstraintGroup, ConstraintKind, ConstraintNode, DateRange, DomainList, ExecutionMode,
    FunctionGate, TargetIdentity, TimeRange, TimeWindow, UsageLimit, UsageMode, ValidationContext,
    ValidationLog, ValidationRequest, VersionRange, UNCONSTRAINED,
};
pub use container::{
    find_unlocked, DirectoryContainer, MemoryContainer, ResourceContainer, DEFAULT_UNLOCK_CODE,
    MIN_UNLOCK_CODE_LEN,
};
pub use device::{hardware_token, HardwareIdentity, HostHardware, StaticHardware};
pub use document::{LicenseDocument, FORMAT_VERSION};
pub use envelope::{SignatureBlock, SIGNATURE_FIELD};
pub use environment::LicenseEnvironment;
pub use error::{LicenseError, LicenseResult, UpgradeRejection};
pub use identity::{IssuerIdentity, ProductIdentity, UserIdentity};
pub use installer::{InstallSource, Installer};
pub use keystore::{KeyStore, MemoryKeyStore, ProtectedKeyFile};
pub use manifest::{DeploymentManifest, ManifestFile, ProductManifest, StaticManifest};
pub use provider::{Grant, LicenseCache, LicenseProvider, Validation, NO_REASON};
pub use resolver::{select, Candidate, Gathered, LicenseResolver, SourceNote, CACHE_SOURCE};
pub use statistics::Statistics;
pub use store::{
    delete_everywhere, replace_everywhere, write_everywhere, FileStore, LicenseStore, MemoryStore,
    UserStore,
};
pub use upgrade::LicenseUpgrader;
