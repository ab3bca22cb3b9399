//! Issuer, user and product identity blocks.
//!
//! All three are upgradeable. An upgrade fills empty fields of the installed
//! document from the incoming one and otherwise keeps what is installed.
//! The product version is the exception: it may only move forward.

use serde::{Deserialize, Serialize};
use warden_types::Version;

use crate::error::UpgradeRejection;

fn fill(dest: &mut String, src: &str) {
    if dest.trim().is_empty() && !src.trim().is_empty() {
        *dest = src.to_string();
    }
}

/// Who issued the license.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub url: String,
}

impl IssuerIdentity {
    pub fn merge_from(&mut self, incoming: &Self) {
        fill(&mut self.name, &incoming.name);
        fill(&mut self.email, &incoming.email);
        fill(&mut self.url, &incoming.url);
    }

    /// Contact line appended to user-facing denial text.
    #[must_use]
    pub fn contact(&self) -> Option<String> {
        let parts: Vec<&str> = [self.name.as_str(), self.email.as_str(), self.url.as_str()]
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Who the license was issued to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub organization: String,
}

impl UserIdentity {
    pub fn merge_from(&mut self, incoming: &Self) {
        fill(&mut self.name, &incoming.name);
        fill(&mut self.email, &incoming.email);
        fill(&mut self.organization, &incoming.organization);
    }
}

/// The licensed product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIdentity {
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub description: String,
    /// A fully licensed product bypasses every constraint.
    #[serde(default)]
    pub is_licensed: bool,
    /// Install location recorded at installation time.
    #[serde(default)]
    pub file_path: String,
}

impl ProductIdentity {
    /// Checks that `incoming` may be merged into this product.
    pub fn check_upgrade(&self, incoming: &Self) -> Result<(), UpgradeRejection> {
        let ours = self.short_name.trim();
        let theirs = incoming.short_name.trim();
        if !ours.is_empty() && !theirs.is_empty() && !ours.eq_ignore_ascii_case(theirs) {
            return Err(UpgradeRejection::ProductMismatch);
        }
        if !incoming.version.is_zero() && incoming.version < self.version {
            return Err(UpgradeRejection::VersionRegression);
        }
        Ok(())
    }

    /// Merges `incoming` into this product. Call [`Self::check_upgrade`] first.
    pub fn merge_from(&mut self, incoming: &Self) {
        fill(&mut self.short_name, &incoming.short_name);
        fill(&mut self.full_name, &incoming.full_name);
        fill(&mut self.developer, &incoming.developer);
        fill(&mut self.description, &incoming.description);
        fill(&mut self.file_path, &incoming.file_path);
        if !incoming.version.is_zero() && incoming.version >= self.version {
            self.version = incoming.version.clone();
        }
        self.is_licensed |= incoming.is_licensed;
    }
}
