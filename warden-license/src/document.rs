//! The license document data model.
//!
//! A document is created when a license is installed, mutated on every
//! successful validation (statistics and usage counters) and on upgrade,
//! and deleted from every store on uninstall. Fields serialize in a fixed
//! order: identity, timestamps, statistics, issuer, product, constraints,
//! custom data, user.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_crypto::short_token;
use warden_types::{Clock, InstanceId, LicenseUid};

use crate::constraint::{ConstraintCaps, ConstraintNode, ValidationContext, ValidationLog, ValidationRequest};
use crate::identity::{IssuerIdentity, ProductIdentity, UserIdentity};
use crate::statistics::Statistics;

/// Version of the serialized document layout.
pub const FORMAT_VERSION: &str = "2.0";

fn format_version() -> String {
    FORMAT_VERSION.to_string()
}

/// A machine-bound license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseDocument {
    #[serde(default = "format_version")]
    pub version: String,

    /// Primary UID. Replaced only by an upgrade.
    pub uid: LicenseUid,
    /// UID of the document this one was upgraded from; empty for an original.
    #[serde(default)]
    pub lineage_uid: LicenseUid,
    /// Regenerated on install and upgrade.
    #[serde(default)]
    pub instance_id: Option<InstanceId>,
    /// Token derived from the first installation instance.
    #[serde(default)]
    pub license_key: String,
    /// Issuer-assigned token binding the license to one machine.
    #[serde(default)]
    pub hardware_key: String,
    /// Machine identity recorded at installation.
    #[serde(default)]
    pub machine_identity: String,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub first_use_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,

    #[serde(default)]
    pub statistics: Statistics,
    #[serde(default)]
    pub issuer: IssuerIdentity,
    #[serde(default)]
    pub product: ProductIdentity,
    #[serde(default)]
    pub constraints: Vec<ConstraintNode>,
    #[serde(default)]
    pub custom_data: BTreeMap<String, String>,
    #[serde(default)]
    pub user: UserIdentity,

    #[serde(skip)]
    failure_reason: String,
    #[serde(skip)]
    warnings: Vec<String>,
    #[serde(skip)]
    granted: Option<ConstraintCaps>,
}

impl LicenseDocument {
    /// Creates an empty document with the given UID.
    #[must_use]
    pub fn new(uid: LicenseUid, now: DateTime<Utc>) -> Self {
        Self {
            version: format_version(),
            uid,
            lineage_uid: LicenseUid::empty(),
            instance_id: None,
            license_key: String::new(),
            hardware_key: String::new(),
            machine_identity: String::new(),
            created_at: now,
            first_use_at: None,
            modified_at: now,
            statistics: Statistics::default(),
            issuer: IssuerIdentity::default(),
            product: ProductIdentity::default(),
            constraints: Vec::new(),
            custom_data: BTreeMap::new(),
            user: UserIdentity::default(),
            failure_reason: String::new(),
            warnings: Vec::new(),
            granted: None,
        }
    }

    /// A fresh document for `product`, issued by `issuer` with a new UID.
    #[must_use]
    pub fn issue(product: ProductIdentity, issuer: IssuerIdentity, now: DateTime<Utc>) -> Self {
        Self::new(LicenseUid::generate(), now)
            .with_product(product)
            .with_issuer(issuer)
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: IssuerIdentity) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_product(mut self, product: ProductIdentity) -> Self {
        self.product = product;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn with_constraint(mut self, node: ConstraintNode) -> Self {
        self.constraints.push(node);
        self
    }

    #[must_use]
    pub fn with_custom_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_data.insert(key.into(), value.into());
        self
    }

    /// License-key token for an installation instance.
    #[must_use]
    pub fn derive_license_key(instance: &InstanceId) -> String {
        short_token(&instance.to_string())
    }

    /// Whether `other` is a replica of the same issuance (same UID and lineage).
    #[must_use]
    pub fn same_issuance(&self, other: &Self) -> bool {
        self.uid == other.uid && self.lineage_uid == other.lineage_uid
    }

    /// Decides whether this document grants `request`.
    ///
    /// A fully licensed product is granted without looking at constraints.
    /// Otherwise the top-level constraints are tried in order and the first
    /// one that passes grants access with the caps it accumulated. On
    /// failure, [`Self::failure_reason`] describes the last attempt.
    pub fn validate_license(&mut self, request: &ValidationRequest, clock: &dyn Clock) -> bool {
        self.granted = None;
        self.warnings.clear();

        if self.product.is_licensed {
            debug!(uid = %self.uid, "product is fully licensed");
            self.failure_reason.clear();
            self.granted = Some(ConstraintCaps::unconstrained());
            return true;
        }

        let ctx = ValidationContext::new(request, clock).with_first_use(self.first_use_at);
        let mut log = ValidationLog::default();
        let mut granted = None;
        for node in &mut self.constraints {
            log.failure_reason.clear();
            let mut caps = ConstraintCaps::unconstrained();
            if node.validate(&ctx, &mut log, &mut caps) {
                granted = Some(caps);
                break;
            }
        }
        self.warnings = log.warnings;

        match granted {
            Some(caps) => {
                self.failure_reason.clear();
                self.granted = Some(caps);
                true
            }
            None => {
                self.failure_reason = format!(
                    "No valid constraint found for target {}{}",
                    request.target, log.failure_reason
                );
                false
            }
        }
    }

    /// Why the last validation failed; empty after a success.
    #[must_use]
    pub fn failure_reason(&self) -> &str {
        &self.failure_reason
    }

    /// Warnings emitted by the last validation.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Caps of the constraint that granted the last validation.
    #[must_use]
    pub fn granted_caps(&self) -> Option<ConstraintCaps> {
        self.granted
    }
}

/// Equality over persisted fields only; validation state is ignored.
impl PartialEq for LicenseDocument {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.uid == other.uid
            && self.lineage_uid == other.lineage_uid
            && self.instance_id == other.instance_id
            && self.license_key == other.license_key
            && self.hardware_key == other.hardware_key
            && self.machine_identity == other.machine_identity
            && self.created_at == other.created_at
            && self.first_use_at == other.first_use_at
            && self.modified_at == other.modified_at
            && self.statistics == other.statistics
            && self.issuer == other.issuer
            && self.product == other.product
            && self.constraints == other.constraints
            && self.custom_data == other.custom_data
            && self.user == other.user
    }
}

impl Eq for LicenseDocument {}
