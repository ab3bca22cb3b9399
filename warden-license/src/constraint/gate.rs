//! Environment gates: execution domain, feature switches, target version
//! and design/runtime mode.

use serde::{Deserialize, Deserializer, Serialize};
use warden_types::Version;

use super::context::{UsageMode, ValidationContext};
use super::Verdict;

fn allowed() -> bool {
    true
}

/// Restricts use to a list of web domains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainList {
    /// Normalized with [`normalize_domain`] when built or deserialized.
    #[serde(default, deserialize_with = "normalized_domains")]
    pub domains: Vec<String>,
}

fn normalized_domains<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let domains = Vec::<String>::deserialize(deserializer)?;
    Ok(domains.iter().map(|d| normalize_domain(d)).collect())
}

impl DomainList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| normalize_domain(d.as_ref()))
                .collect(),
        }
    }

    pub(crate) fn check(&self, ctx: &ValidationContext<'_>) -> Verdict {
        let Some(current) = ctx.request.domain.as_deref() else {
            return Verdict::Fail(
                "No execution domain was supplied but this license is restricted to specific domains."
                    .to_string(),
            );
        };
        let current = normalize_domain(current);
        if self.domains.iter().any(|allowed| *allowed == current) {
            Verdict::Pass
        } else {
            Verdict::Fail("The current domain is not supported by this license.".to_string())
        }
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        vec![("domains", self.domains.join(", "))]
    }
}

/// Lowercases a domain and strips a leading scheme and trailing slashes.
#[must_use]
pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    let stripped = lowered
        .strip_prefix("http://")
        .or_else(|| lowered.strip_prefix("https://"))
        .unwrap_or(lowered.as_str());
    stripped.trim_end_matches('/').to_string()
}

/// Switches a named function on or off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionGate {
    #[serde(default = "allowed")]
    pub allow: bool,
    #[serde(default)]
    pub update_url: String,
}

impl Default for FunctionGate {
    fn default() -> Self {
        Self {
            allow: true,
            update_url: String::new(),
        }
    }
}

impl FunctionGate {
    #[must_use]
    pub fn denied(update_url: impl Into<String>) -> Self {
        Self {
            allow: false,
            update_url: update_url.into(),
        }
    }

    pub(crate) fn check(&self, function: &str) -> Verdict {
        if self.allow {
            return Verdict::Pass;
        }
        let mut msg = format!("The function {function} is not allowed by this license.");
        if !self.update_url.is_empty() {
            msg.push_str(&format!(" An upgrade is available at: {}", self.update_url));
        }
        Verdict::Fail(msg)
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("allow", self.allow.to_string()),
            ("update_url", self.update_url.clone()),
        ]
    }
}

/// Restricts the target version to an open interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    #[serde(default)]
    pub min: Version,
    #[serde(default)]
    pub max: Version,
}

impl VersionRange {
    #[must_use]
    pub fn new(min: Version, max: Version) -> Self {
        Self { min, max }
    }

    pub(crate) fn check(&self, ctx: &ValidationContext<'_>) -> Verdict {
        if self.min.is_zero() && self.max.is_zero() {
            return Verdict::Pass;
        }
        let target = &ctx.target().version;
        if self.min < *target && *target < self.max {
            Verdict::Pass
        } else {
            Verdict::Fail(format!(
                "The current version {target} is not within the constraints of this license ({} - {}).",
                self.min, self.max
            ))
        }
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        vec![("min", self.min.to_string()), ("max", self.max.to_string())]
    }
}

/// Requires the caller to run in a given mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMode {
    pub require: UsageMode,
}

impl ExecutionMode {
    #[must_use]
    pub const fn requiring(mode: UsageMode) -> Self {
        Self { require: mode }
    }

    pub(crate) fn check(&self, ctx: &ValidationContext<'_>) -> Verdict {
        if ctx.request.mode == self.require {
            return Verdict::Pass;
        }
        let msg = match self.require {
            UsageMode::Design => {
                "The license may only be used in a design-time environment. Runtime licensing is not supported."
            }
            UsageMode::Runtime => {
                "The license may only be used in a runtime environment. Design-time licensing is not supported."
            }
        };
        Verdict::Fail(msg.to_string())
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        vec![("require", self.require.to_string())]
    }
}
