//! Answers "may this target be used now?".
//!
//! The provider resolves the canonical stored document, evaluates its
//! constraints, and on success records the access and writes the updated
//! document back to every store.

use std::collections::HashMap;

use chrono::Duration;
use tracing::{info, warn};
use warden_types::{LicenseUid, ScopeId};

use crate::constraint::ValidationRequest;
use crate::document::LicenseDocument;
use crate::environment::LicenseEnvironment;
use crate::error::{LicenseError, LicenseResult};
use crate::resolver::LicenseResolver;
use crate::store::write_everywhere;

/// Reason reported when a denial carries no text of its own.
pub const NO_REASON: &str = "No reason was given for the license denial.";

/// Terms of a granted validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub uid: LicenseUid,
    /// Item cap, `None` when unconstrained.
    pub volume: Option<u32>,
    /// Runtime cap, `None` when unconstrained.
    pub runtime: Option<Duration>,
    pub warnings: Vec<String>,
}

/// Result of one validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Granted(Grant),
    Denied { reason: String },
}

impl Validation {
    /// Whether access was granted.
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Turns a denial into [`LicenseError::ConstraintValidationFailed`].
    pub fn into_result(self) -> LicenseResult<Grant> {
        match self {
            Self::Granted(grant) => Ok(grant),
            Self::Denied { reason } => Err(LicenseError::ConstraintValidationFailed(reason)),
        }
    }
}

/// Granted documents keyed by target scope, owned by the caller's session.
#[derive(Debug, Clone, Default)]
pub struct LicenseCache {
    entries: HashMap<ScopeId, LicenseDocument>,
}

impl LicenseCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The document that last granted `scope`, if still cached.
    #[must_use]
    pub fn get(&self, scope: &ScopeId) -> Option<&LicenseDocument> {
        self.entries.get(scope)
    }

    /// Remembers `document` as the last grant for `scope`.
    pub fn insert(&mut self, scope: ScopeId, document: LicenseDocument) {
        self.entries.insert(scope, document);
    }

    /// Forgets `scope`; its next validation resolves from the stores alone.
    pub fn invalidate(&mut self, scope: &ScopeId) {
        self.entries.remove(scope);
    }

    /// Forgets every scope.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached scopes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct LicenseProvider<'a> {
    env: &'a LicenseEnvironment,
}

impl<'a> LicenseProvider<'a> {
    /// A provider answering from `env`.
    pub fn new(env: &'a LicenseEnvironment) -> Self {
        Self { env }
    }

    /// Validates `request` against the installed license.
    ///
    /// A denial is a normal outcome and is returned as
    /// [`Validation::Denied`]. Errors mean the license could not be
    /// evaluated at all: nothing installed, no readable copy, a corrupt
    /// keypair or a clock set back behind the last access.
    pub fn validate(
        &self,
        request: &ValidationRequest,
        mut cache: Option<&mut LicenseCache>,
    ) -> LicenseResult<Validation> {
        let key = self
            .env
            .key_store
            .load()?
            .ok_or(LicenseError::NotInstalled)?;
        let verifying = key.verifying_key();
        let scope = request.target.scope;

        let cached = cache.as_deref().and_then(|c| c.get(&scope));
        let mut document = LicenseResolver::new(&verifying)
            .resolve(cached, &self.env.stores)?
            .document;

        let clock = self.env.clock.as_ref();
        if !document.validate_license(request, clock) {
            let mut reason = if document.failure_reason().trim().is_empty() {
                NO_REASON.to_string()
            } else {
                document.failure_reason().to_string()
            };
            if let Some(contact) = document.issuer.contact() {
                reason.push_str(&format!("\nContact: {contact}"));
            }
            warn!(licensed = %request.target, uid = %document.uid, "license denied");
            if let Some(cache) = cache.as_deref_mut() {
                cache.invalidate(&scope);
            }
            return Ok(Validation::Denied { reason });
        }

        let now = clock.now();
        if document.statistics.is_rolled_back(now) {
            let last_accessed = document.statistics.last_accessed.unwrap_or(now);
            warn!(uid = %document.uid, %last_accessed, %now, "clock rollback detected");
            return Err(LicenseError::ClockRollback { last_accessed, now });
        }

        document.statistics.record_access(clock);
        let bytes = document.seal(&key)?;
        write_everywhere(&self.env.stores, &bytes)?;

        let caps = document.granted_caps().unwrap_or_default();
        for warning in document.warnings() {
            info!(uid = %document.uid, warning = %warning, "license warning");
        }
        let grant = Grant {
            uid: document.uid.clone(),
            volume: u32::try_from(caps.volume).ok(),
            runtime: (caps.runtime >= 0).then(|| Duration::hours(i64::from(caps.runtime))),
            warnings: document.warnings().to_vec(),
        };
        info!(
            licensed = %request.target,
            uid = %grant.uid,
            volume = ?grant.volume,
            runtime_hours = caps.runtime,
            "license granted"
        );

        if let Some(cache) = cache {
            cache.insert(scope, document);
        }
        Ok(Validation::Granted(grant))
    }
}
