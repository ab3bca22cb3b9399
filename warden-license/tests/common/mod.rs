//! Shared test helpers for license tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use warden_crypto::SigningKey;
use warden_license::{
    hardware_token, ConstraintNode, DeploymentManifest, IssuerIdentity, LicenseDocument,
    LicenseEnvironment, MemoryKeyStore, MemoryStore, ProductIdentity, StaticHardware,
    StaticManifest, TargetIdentity, UsageMode, ValidationRequest,
};
use warden_types::{FixedClock, LicenseUid, ScopeId, Version};

pub const MACHINE: &str = "linux|x86_64|build-host|0123456789abcdef|ci";

/// Deterministic issuer key from the seed `1..=32`.
pub fn issuer_key() -> SigningKey {
    let mut seed = [0u8; 32];
    for (i, b) in seed.iter_mut().enumerate() {
        *b = i as u8 + 1;
    }
    SigningKey::from_bytes(&seed)
}

/// A second deterministic key, standing in for the installation keypair.
pub fn local_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// 2026-03-01 10:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(t0()))
}

pub fn product(name: &str, version: &str) -> ProductIdentity {
    ProductIdentity {
        short_name: name.to_string(),
        full_name: format!("{name} Studio"),
        version: Version::parse(version).unwrap(),
        developer: "Acme".to_string(),
        ..ProductIdentity::default()
    }
}

pub fn issuer() -> IssuerIdentity {
    IssuerIdentity {
        name: "Acme Licensing".to_string(),
        email: "sales@acme.test".to_string(),
        url: "https://acme.test".to_string(),
    }
}

/// An unsigned document with the given UID and constraints.
pub fn document(uid: &str, constraints: Vec<ConstraintNode>) -> LicenseDocument {
    let mut doc = LicenseDocument::new(LicenseUid::new(uid), t0())
        .with_issuer(issuer())
        .with_product(product("Widget", "1.0.0"));
    doc.constraints = constraints;
    doc
}

pub fn target() -> TargetIdentity {
    TargetIdentity::new(
        ScopeId::from_uuid(uuid::Uuid::from_u128(0x0197_0000_0000_7000_8000_0000_0000_0001)),
        "Widget",
        Version::parse("1.5").unwrap(),
    )
}

pub fn request() -> ValidationRequest {
    ValidationRequest::new(target(), UsageMode::Runtime)
}

pub fn manifest() -> DeploymentManifest {
    DeploymentManifest {
        name: "Widget".to_string(),
        full_name: "Widget Studio".to_string(),
        version: Version::parse("1.0.0").unwrap(),
        publisher: "Acme".to_string(),
        description: "Widget designer".to_string(),
        data_folder: "/opt/widget".into(),
    }
}

/// An in-memory environment trusting [`issuer_key`], with two stores.
pub fn environment(clock: Arc<FixedClock>) -> LicenseEnvironment {
    LicenseEnvironment::new(
        issuer_key().verifying_key(),
        MemoryKeyStore::new(),
        StaticManifest::new(manifest()),
    )
    .with_hardware(StaticHardware::new(MACHINE))
    .with_clock(clock)
    .with_store(MemoryStore::new("shared"))
    .with_store(MemoryStore::new("user"))
}

/// Same as [`environment`] but with the installation key already present.
pub fn installed_environment(clock: Arc<FixedClock>) -> LicenseEnvironment {
    let mut env = environment(clock);
    env.key_store = Box::new(MemoryKeyStore::with_key(&local_key()));
    env
}

pub fn machine_token() -> String {
    hardware_token(MACHINE)
}
