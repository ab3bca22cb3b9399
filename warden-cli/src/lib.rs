//! Issuance helpers and report types for the `warden` binary.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use warden_crypto::SigningKey;
use warden_license::{
    Beta, ConstraintKind, ConstraintNode, DateRange, DomainList, ExecutionMode, FunctionGate,
    IssuerIdentity, LicenseDocument, ProductIdentity, UsageLimit, UsageMode, UserIdentity,
};
use warden_types::{LicenseUid, Version};

/// What to put into a newly issued license.
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    pub uid: Option<String>,
    pub product: String,
    pub version: String,
    pub developer: String,
    pub issuer: IssuerIdentity,
    pub user: UserIdentity,
    /// Grant everything; no constraints are evaluated.
    pub full: bool,
    pub trial_days: Option<i32>,
    pub expires: Option<DateTime<Utc>>,
    pub beta_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    pub domains: Vec<String>,
    pub design_only: bool,
    pub hardware_key: Option<String>,
    pub purchase_url: String,
}

/// Builds the unsigned document described by `opts`.
///
/// Every requested restriction becomes one leaf of a single top-level
/// `And`. With no restriction the license holds one unrestricted function
/// gate.
pub fn build_document(opts: &IssueOptions, now: DateTime<Utc>) -> Result<LicenseDocument> {
    if opts.product.trim().is_empty() {
        bail!("a product name is required");
    }
    let version = Version::parse(&opts.version)
        .with_context(|| format!("invalid product version `{}`", opts.version))?;

    let product = ProductIdentity {
        short_name: opts.product.clone(),
        full_name: opts.product.clone(),
        version,
        developer: opts.developer.clone(),
        is_licensed: opts.full,
        ..ProductIdentity::default()
    };

    let mut doc = LicenseDocument::issue(product, opts.issuer.clone(), now).with_user(opts.user.clone());
    if let Some(uid) = &opts.uid {
        doc.uid = LicenseUid::new(uid.clone());
    }
    if let Some(hardware_key) = &opts.hardware_key {
        doc.hardware_key = hardware_key.clone();
    }

    let mut leaves = Vec::new();
    if opts.trial_days.is_some() || opts.expires.is_some() {
        let range = DateRange {
            end: opts.expires,
            duration_days: opts.trial_days.unwrap_or(-1),
            purchase_url: opts.purchase_url.clone(),
            ..DateRange::default()
        };
        leaves.push(ConstraintNode::new(ConstraintKind::DateRange(range)).named("Evaluation period"));
    }
    if let Some(end) = opts.beta_until {
        leaves.push(ConstraintNode::new(ConstraintKind::Beta(Beta::until(end))).named("Beta"));
    }
    if let Some(max) = opts.max_uses {
        leaves.push(
            ConstraintNode::new(ConstraintKind::Usage(UsageLimit::new(max, -1, -1)))
                .named("Usage limit")
                .with_warning("<current_usage> of <max_usage> uses consumed"),
        );
    }
    if !opts.domains.is_empty() {
        leaves.push(ConstraintNode::new(ConstraintKind::Domain(DomainList::new(&opts.domains))).named("Domains"));
    }
    if opts.design_only {
        leaves.push(
            ConstraintNode::new(ConstraintKind::ExecutionMode(ExecutionMode::requiring(UsageMode::Design)))
                .named("Design time"),
        );
    }

    doc.constraints = match leaves.len() {
        0 => vec![ConstraintNode::new(ConstraintKind::FunctionGate(FunctionGate::default())).named("Unrestricted")],
        1 => leaves,
        _ => vec![ConstraintNode::and(leaves).named("License terms")],
    };
    Ok(doc)
}

/// Parses `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("invalid date")?;
        return Ok(midnight.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("`{s}` is neither YYYY-MM-DD nor RFC 3339"))
}

/// Writes an issuer secret key as base64.
pub fn write_secret_key(path: &Path, key: &SigningKey) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create key directory")?;
    }
    fs::write(path, key.to_base64()).context("Failed to write secret key")
}

pub fn read_secret_key(path: &Path) -> Result<SigningKey> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read secret key {}", path.display()))?;
    SigningKey::from_base64(text.trim()).context("Failed to decode secret key")
}

/// A printable view of a license document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseSummary {
    pub uid: String,
    pub lineage_uid: String,
    pub product: String,
    pub version: String,
    pub fully_licensed: bool,
    pub issuer: String,
    pub user: String,
    pub hardware_key: String,
    pub created_at: DateTime<Utc>,
    pub first_use_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
    pub access_count: u64,
    pub days_count: u64,
    pub constraints: Vec<String>,
}

impl From<&LicenseDocument> for LicenseSummary {
    fn from(doc: &LicenseDocument) -> Self {
        Self {
            uid: doc.uid.to_string(),
            lineage_uid: doc.lineage_uid.to_string(),
            product: doc.product.short_name.clone(),
            version: doc.product.version.to_string(),
            fully_licensed: doc.product.is_licensed,
            issuer: doc.issuer.contact().unwrap_or_default(),
            user: doc.user.name.clone(),
            hardware_key: doc.hardware_key.clone(),
            created_at: doc.created_at,
            first_use_at: doc.first_use_at,
            modified_at: doc.modified_at,
            access_count: doc.statistics.access_count,
            days_count: doc.statistics.days_count,
            constraints: doc.constraints.iter().map(describe).collect(),
        }
    }
}

fn describe(node: &ConstraintNode) -> String {
    let label = if node.name.is_empty() {
        node.kind.tag().to_string()
    } else {
        format!("{} ({})", node.name, node.kind.tag())
    };
    match &node.kind {
        ConstraintKind::And(group) | ConstraintKind::Or(group) => {
            let children: Vec<String> = group.items.iter().map(describe).collect();
            format!("{label}[{}]", children.join(", "))
        }
        _ => label,
    }
}
