mod common;

use chrono::Duration;
use common::{
    clock, document, environment, installed_environment, issuer_key, local_key, machine_token, manifest,
    t0, MACHINE,
};
use pretty_assertions::assert_eq;
use warden_license::{
    hardware_token, ConstraintKind, ConstraintNode, FunctionGate, InstallSource, Installer,
    KeyStore, LicenseDocument, LicenseEnvironment, LicenseError, LicenseResolver, LicenseResult,
    LicenseStore, MemoryContainer, MemoryKeyStore, UpgradeRejection, UserIdentity,
};
use warden_types::{Clock, LicenseUid, Version};

fn issued(uid: &str) -> Vec<u8> {
    document(
        uid,
        vec![ConstraintNode::new(ConstraintKind::FunctionGate(FunctionGate::default()))],
    )
    .seal(&issuer_key())
    .unwrap()
}

/// A store whose disk has gone away.
struct BrokenStore;

impl LicenseStore for BrokenStore {
    fn name(&self) -> &str {
        "broken"
    }

    fn read(&self) -> LicenseResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn write(&self, _bytes: &[u8]) -> LicenseResult<()> {
        Err(LicenseError::Storage("broken: read-only volume".to_string()))
    }

    fn delete(&self) -> LicenseResult<()> {
        Err(LicenseError::Storage("broken: read-only volume".to_string()))
    }
}

fn user() -> UserIdentity {
    UserIdentity {
        name: "Ada".to_string(),
        email: "ada@example.test".to_string(),
        organization: String::new(),
    }
}

fn stored_copies(env: &LicenseEnvironment) -> Vec<LicenseDocument> {
    let key = env.key_store.load().unwrap().unwrap();
    let verifying = key.verifying_key();
    LicenseResolver::new(&verifying)
        .gather(&env.stores)
        .candidates
        .into_iter()
        .map(|c| c.document)
        .collect()
}

#[test]
fn install_initializes_and_stores_the_document() {
    let clock = clock();
    clock.advance(Duration::hours(2));
    let env = environment(clock.clone());
    let installer = Installer::new(&env);

    let doc = installer
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();

    assert_eq!(doc.uid, LicenseUid::new("U1"));
    let instance = doc.instance_id.unwrap();
    assert_eq!(doc.license_key, LicenseDocument::derive_license_key(&instance));
    assert_eq!(doc.machine_identity, MACHINE);
    assert_eq!(doc.hardware_key, machine_token());
    assert_eq!(doc.first_use_at, Some(clock.now()));
    assert_eq!(doc.modified_at, clock.now());
    assert_eq!(doc.user.name, "Ada");
    assert_eq!(doc.product.file_path, "/opt/widget");
    assert_eq!(doc.statistics.access_count, 0);

    let copies = stored_copies(&env);
    assert_eq!(copies.len(), 2);
    assert!(copies.iter().all(|c| *c == doc));
}

#[test]
fn stored_copies_are_signed_with_the_installation_key() {
    let env = environment(clock());
    Installer::new(&env)
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();

    let bytes = env.stores[0].read().unwrap().unwrap();
    let err = LicenseDocument::open(&bytes, &issuer_key().verifying_key()).unwrap_err();
    assert!(matches!(err, LicenseError::SignatureInvalid(_)));
}

#[test]
fn install_from_container_uses_the_default_code() {
    let env = environment(clock());
    let container = MemoryContainer::new()
        .with_resource("acme.Widget.__EVALUATION__.lic", issued("TRIAL"))
        .with_resource("acme.Widget.__FULL-ACCESS__.lic", issued("FULL"));

    let installer = Installer::new(&env);
    let trial = installer
        .install(
            InstallSource::Container { container: &container, unlock_code: None },
            &manifest(),
            user(),
        )
        .unwrap();
    assert_eq!(trial.uid, LicenseUid::new("TRIAL"));

    let full = installer
        .install(
            InstallSource::Container { container: &container, unlock_code: Some("FULL-ACCESS") },
            &manifest(),
            user(),
        )
        .unwrap();
    assert_eq!(full.uid, LicenseUid::new("FULL"));
}

#[test]
fn tampered_license_is_not_installed() {
    let env = environment(clock());
    let bytes = String::from_utf8(issued("U1")).unwrap().replace("Acme", "Evil");
    let err = Installer::new(&env)
        .install(InstallSource::Document(bytes.as_bytes()), &manifest(), user())
        .unwrap_err();
    assert!(matches!(err, LicenseError::SignatureInvalid(_)));
    assert!(env.stores[0].read().unwrap().is_none());
}

#[test]
fn license_for_another_machine_is_not_installed() {
    let env = environment(clock());
    let mut doc = document("U1", Vec::new());
    doc.hardware_key = hardware_token("another machine");
    let bytes = doc.seal(&issuer_key()).unwrap();

    let err = Installer::new(&env)
        .install(InstallSource::Document(&bytes), &manifest(), user())
        .unwrap_err();
    assert!(matches!(err, LicenseError::HardwareMismatch));
}

#[test]
fn corrupt_keypair_stops_installation() {
    let mut env = environment(clock());
    env.key_store = Box::new(MemoryKeyStore::with_raw(vec![0; 5]));
    let err = Installer::new(&env)
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap_err();
    assert!(matches!(err, LicenseError::CorruptKeypair(_)));
}

#[test]
fn invalid_manifest_stops_installation() {
    let env = environment(clock());
    let mut bad = manifest();
    bad.name = "Acme.Widget".to_string();
    let err = Installer::new(&env)
        .install(InstallSource::Document(&issued("U1")), &bad, user())
        .unwrap_err();
    assert!(matches!(err, LicenseError::Manifest(_)));
}

#[test]
fn replacement_keeps_product_and_user() {
    let clock = clock();
    let env = environment(clock.clone());
    let installer = Installer::new(&env);
    let first = installer
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();

    clock.advance(Duration::days(1));
    let replaced = installer.install_replacement(&issued("U7")).unwrap();
    assert_eq!(replaced.uid, LicenseUid::new("U7"));
    assert_eq!(replaced.user, first.user);
    assert_eq!(replaced.product, first.product);
    assert_ne!(replaced.instance_id, first.instance_id);
    assert_eq!(replaced.first_use_at, Some(clock.now()));
    assert_eq!(stored_copies(&env), vec![replaced.clone(), replaced]);
}

#[test]
fn replacement_requires_an_installation() {
    let env = environment(clock());
    let err = Installer::new(&env).install_replacement(&issued("U7")).unwrap_err();
    assert!(matches!(err, LicenseError::NotInstalled));
}

#[test]
fn upgrade_applies_on_top_of_the_installation() {
    let clock = clock();
    let env = environment(clock.clone());
    let installer = Installer::new(&env);
    let installed = installer
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();

    let mut next = document("U2", Vec::new());
    next.product.version = Version::parse("1.2").unwrap();
    next.license_key = installed.license_key.clone();
    let upgraded = installer.upgrade(&next.seal(&issuer_key()).unwrap()).unwrap();

    assert_eq!(upgraded.uid, LicenseUid::new("U2"));
    assert_eq!(upgraded.lineage_uid, LicenseUid::new("U1"));
    assert_eq!(upgraded.product.version, Version::parse("1.2").unwrap());
    assert_eq!(stored_copies(&env), vec![upgraded.clone(), upgraded]);
}

#[test]
fn applying_the_same_upgrade_twice_is_redundant() {
    let env = environment(clock());
    let installer = Installer::new(&env);
    installer
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();

    let upgrade = issued("U2");
    installer.upgrade(&upgrade).unwrap();
    let err = installer.upgrade(&upgrade).unwrap_err();
    assert!(matches!(err, LicenseError::UpgradeRejected(UpgradeRejection::RedundantUid)));
}

#[test]
fn upgrade_signed_by_someone_else_is_rejected() {
    let env = environment(clock());
    let installer = Installer::new(&env);
    installer
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();

    let bytes = document("U2", Vec::new()).seal(&local_key()).unwrap();
    let err = installer.upgrade(&bytes).unwrap_err();
    assert!(matches!(err, LicenseError::SignatureInvalid(_)));
}

#[test]
fn upgrade_without_stored_copies_finds_nothing() {
    let env = installed_environment(clock());
    let err = Installer::new(&env).upgrade(&issued("U2")).unwrap_err();
    assert!(matches!(err, LicenseError::NoCandidateFound(_)));
}

#[test]
fn uninstall_removes_everything_and_is_idempotent() {
    let env = environment(clock());
    let installer = Installer::new(&env);
    installer
        .install(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();

    installer.uninstall().unwrap();
    assert!(env.key_store.load().unwrap().is_none());
    for store in &env.stores {
        assert!(store.read().unwrap().is_none());
    }
    installer.uninstall().unwrap();
    installer.rollback().unwrap();
}

#[test]
fn install_keeps_the_issue_date_and_sets_first_use() {
    let env = environment(clock());
    let mut doc = document("U1", Vec::new());
    doc.created_at = t0() - Duration::days(30);
    let installed = Installer::new(&env)
        .install(InstallSource::Document(&doc.seal(&issuer_key()).unwrap()), &manifest(), user())
        .unwrap();
    assert_eq!(installed.created_at, t0() - Duration::days(30));
    assert_eq!(installed.first_use_at, Some(t0()));
}

#[test]
fn rejected_install_keeps_the_existing_license() {
    let env = environment(clock());
    let installer = Installer::new(&env);
    let first = installer
        .install_or_rollback(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap();
    let key = env.key_store.load().unwrap().unwrap();

    let mut foreign = document("U9", Vec::new());
    foreign.hardware_key = hardware_token("another machine");
    let err = installer
        .install_or_rollback(
            InstallSource::Document(&foreign.seal(&issuer_key()).unwrap()),
            &manifest(),
            user(),
        )
        .unwrap_err();
    assert!(matches!(err, LicenseError::HardwareMismatch));

    assert!(installer.is_installed().unwrap());
    assert_eq!(env.key_store.load().unwrap().unwrap().to_bytes(), key.to_bytes());
    assert_eq!(stored_copies(&env), vec![first.clone(), first]);
}

#[test]
fn failed_first_install_is_rolled_back() {
    let mut env = environment(clock());
    env.stores = vec![Box::new(BrokenStore)];
    let installer = Installer::new(&env);
    assert!(!installer.is_installed().unwrap());

    let err = installer
        .install_or_rollback(InstallSource::Document(&issued("U1")), &manifest(), user())
        .unwrap_err();
    assert!(matches!(err, LicenseError::Storage(_)));
    assert!(!installer.is_installed().unwrap());
}

#[test]
fn rejected_document_writes_nothing() {
    let env = environment(clock());
    let mut foreign = document("U1", Vec::new());
    foreign.hardware_key = hardware_token("another machine");
    Installer::new(&env)
        .install(
            InstallSource::Document(&foreign.seal(&issuer_key()).unwrap()),
            &manifest(),
            user(),
        )
        .unwrap_err();
    assert!(env.key_store.load().unwrap().is_none());
}

#[test]
fn uninstall_continues_past_a_failing_store() {
    let mut env = installed_environment(clock());
    env.stores[0].write(&issued("U1")).unwrap();
    env.stores.insert(0, Box::new(BrokenStore));

    let err = Installer::new(&env).uninstall().unwrap_err();
    assert!(matches!(err, LicenseError::Storage(_)));
    assert!(env.key_store.load().unwrap().is_none());
    for store in &env.stores {
        assert!(store.read().unwrap().is_none());
    }
}
