use std::collections::HashSet;
use std::str::FromStr;
use warden_types::{InstanceId, LicenseUid, ScopeId};

// ── LicenseUid ────────────────────────────────────────────────────

#[test]
fn license_uid_generate_is_unique() {
    let a = LicenseUid::generate();
    let b = LicenseUid::generate();
    assert_ne!(a, b);
    assert!(!a.is_empty());
}

#[test]
fn license_uid_empty() {
    assert!(LicenseUid::empty().is_empty());
    assert!(LicenseUid::default().is_empty());
    assert!(LicenseUid::new("   ").is_empty());
    assert!(!LicenseUid::new("ABC").is_empty());
}

#[test]
fn license_uid_display_and_from() {
    let uid = LicenseUid::from("U1");
    assert_eq!(uid.to_string(), "U1");
    assert_eq!(uid.as_str(), "U1");
    assert_eq!(LicenseUid::from(String::from("U1")), uid);
}

#[test]
fn license_uid_serde_is_transparent() {
    let uid = LicenseUid::new("ABC");
    let json = serde_json::to_string(&uid).unwrap();
    assert_eq!(json, "\"ABC\"");
    let parsed: LicenseUid = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, uid);
}

// ── InstanceId ────────────────────────────────────────────────────

#[test]
fn instance_id_new_is_unique() {
    assert_ne!(InstanceId::new(), InstanceId::new());
}

#[test]
fn instance_id_display_and_parse() {
    let id = InstanceId::new();
    let parsed = InstanceId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
    assert_eq!(InstanceId::from_str(&id.to_string()).unwrap(), id);
}

#[test]
fn instance_id_parse_invalid() {
    assert!(InstanceId::parse("not-a-uuid").is_err());
}

// ── ScopeId ───────────────────────────────────────────────────────

#[test]
fn scope_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    assert_eq!(ScopeId::from_uuid(uuid).as_uuid(), uuid);
}

#[test]
fn scope_id_hash_and_eq() {
    let id = ScopeId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

#[test]
fn scope_id_from_str_invalid() {
    assert!(ScopeId::from_str("garbage").is_err());
}
