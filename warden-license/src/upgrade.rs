//! Applies an upgrade document onto the installed document.
//!
//! All preconditions are checked before anything is changed. An accepted
//! upgrade links the new UID to the old one, merges identity fields,
//! replaces the constraint list wholesale and then replaces every stored
//! copy with the merged document.

use tracing::{info, warn};
use warden_crypto::SigningKey;
use warden_types::{Clock, InstanceId};

use crate::device::{hardware_token, HardwareIdentity};
use crate::document::LicenseDocument;
use crate::error::{LicenseResult, UpgradeRejection};
use crate::store::{replace_everywhere, LicenseStore};

/// Validates and applies upgrade documents.
pub struct LicenseUpgrader<'a> {
    hardware: &'a dyn HardwareIdentity,
    clock: &'a dyn Clock,
}

impl<'a> LicenseUpgrader<'a> {
    pub fn new(hardware: &'a dyn HardwareIdentity, clock: &'a dyn Clock) -> Self {
        Self { hardware, clock }
    }

    /// Checks whether `incoming` may replace `current`.
    pub fn check(
        &self,
        current: &LicenseDocument,
        incoming: &LicenseDocument,
    ) -> Result<(), UpgradeRejection> {
        if incoming.uid.is_empty() {
            return Err(UpgradeRejection::EmptyUid);
        }
        if !incoming.hardware_key.is_empty()
            && incoming.hardware_key != hardware_token(&self.hardware.machine_identity())
        {
            return Err(UpgradeRejection::HardwareMismatch);
        }
        if !incoming.license_key.is_empty() && incoming.license_key != current.license_key {
            return Err(UpgradeRejection::KeyMismatch);
        }
        if incoming.uid == current.uid || incoming.uid == current.lineage_uid {
            return Err(UpgradeRejection::RedundantUid);
        }
        current.product.check_upgrade(&incoming.product)
    }

    /// Produces the merged document without touching any store.
    pub fn merge(
        &self,
        current: &LicenseDocument,
        incoming: &LicenseDocument,
    ) -> Result<LicenseDocument, UpgradeRejection> {
        if let Err(rejection) = self.check(current, incoming) {
            warn!(
                current = %current.uid,
                incoming = %incoming.uid,
                reason = %rejection,
                "upgrade rejected"
            );
            return Err(rejection);
        }

        let mut merged = current.clone();
        merged.lineage_uid = current.uid.clone();
        merged.uid = incoming.uid.clone();

        merged.product.merge_from(&incoming.product);
        merged.issuer.merge_from(&incoming.issuer);
        merged.user.merge_from(&incoming.user);
        if !incoming.hardware_key.is_empty() {
            merged.hardware_key = incoming.hardware_key.clone();
        }

        merged.constraints = incoming.constraints.clone();
        merged.modified_at = self.clock.now();
        merged.instance_id = Some(InstanceId::new());
        Ok(merged)
    }

    /// Merges `incoming` into `current`, signs the result with `key` and
    /// replaces every stored copy with it.
    pub fn upgrade(
        &self,
        current: &LicenseDocument,
        incoming: &LicenseDocument,
        stores: &[Box<dyn LicenseStore>],
        key: &SigningKey,
    ) -> LicenseResult<LicenseDocument> {
        let merged = self.merge(current, incoming)?;
        let bytes = merged.seal(key)?;
        let written = replace_everywhere(stores, &bytes)?;
        info!(
            uid = %merged.uid,
            lineage = %merged.lineage_uid,
            stores = written,
            "license upgraded"
        );
        Ok(merged)
    }
}
