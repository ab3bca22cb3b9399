//! What a validation is evaluated against.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use warden_types::{Clock, ScopeId, Version};

/// Whether the licensed code runs inside a design environment or in a
/// deployed application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageMode {
    Design,
    #[default]
    Runtime,
}

impl fmt::Display for UsageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Design => f.write_str("design"),
            Self::Runtime => f.write_str("runtime"),
        }
    }
}

/// The product, component or feature asking for a license.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetIdentity {
    pub scope: ScopeId,
    pub name: String,
    pub version: Version,
}

impl TargetIdentity {
    #[must_use]
    pub fn new(scope: ScopeId, name: impl Into<String>, version: Version) -> Self {
        Self {
            scope,
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for TargetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name={}, Guid={}", self.name, self.scope)
    }
}

/// A caller's request to use a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    pub target: TargetIdentity,
    pub mode: UsageMode,
    /// Execution domain (host name) for web-hosted targets.
    pub domain: Option<String>,
}

impl ValidationRequest {
    #[must_use]
    pub fn new(target: TargetIdentity, mode: UsageMode) -> Self {
        Self {
            target,
            mode,
            domain: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Everything a constraint node may read while it is evaluated.
///
/// The current time is captured once so every node in one pass sees the
/// same instant.
pub struct ValidationContext<'a> {
    pub(crate) request: &'a ValidationRequest,
    pub(crate) clock: &'a dyn Clock,
    pub(crate) now: DateTime<Utc>,
    pub(crate) local_now: NaiveDateTime,
    pub(crate) first_use: Option<DateTime<Utc>>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(request: &'a ValidationRequest, clock: &'a dyn Clock) -> Self {
        Self {
            request,
            clock,
            now: clock.now(),
            local_now: clock.local_now(),
            first_use: None,
        }
    }

    /// Sets the first-use date that duration-limited ranges count from.
    #[must_use]
    pub fn with_first_use(mut self, first_use: Option<DateTime<Utc>>) -> Self {
        self.first_use = first_use;
        self
    }

    #[must_use]
    pub fn target(&self) -> &TargetIdentity {
        &self.request.target
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
