//! Picks one canonical document when several copies exist.
//!
//! Copies are read from every store and opened against the trusted key.
//! Sources that are empty, unreadable or fail verification only leave a
//! note. Among the surviving candidates:
//!
//! - while each candidate is a replica of the current pick (same UID and
//!   lineage), the more used copy (higher hit count) takes over;
//! - from the first candidate that disagrees with the current pick onward,
//!   the more recently modified copy takes over instead.
//!
//! The current pick carries over when the rule switches. Ties keep the
//! current pick.

use std::fmt;

use tracing::{debug, warn};
use warden_crypto::VerifyingKey;

use crate::document::LicenseDocument;
use crate::error::{LicenseError, LicenseResult};
use crate::store::LicenseStore;

/// Name of the source for a document supplied from a session cache.
pub const CACHE_SOURCE: &str = "session cache";

/// A verified document and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source: String,
    pub document: LicenseDocument,
}

/// Why a source produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNote {
    pub source: String,
    pub note: String,
}

impl fmt::Display for SourceNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.note)
    }
}

/// Candidates and notes collected from all sources.
#[derive(Debug, Clone, Default)]
pub struct Gathered {
    pub candidates: Vec<Candidate>,
    pub notes: Vec<SourceNote>,
}

impl Gathered {
    pub fn push_candidate(&mut self, source: impl Into<String>, document: LicenseDocument) {
        self.candidates.push(Candidate {
            source: source.into(),
            document,
        });
    }

    pub fn push_note(&mut self, source: impl Into<String>, note: impl Into<String>) {
        let note = SourceNote {
            source: source.into(),
            note: note.into(),
        };
        warn!(source = %note.source, note = %note.note, "license source skipped");
        self.notes.push(note);
    }
}

/// Gathers candidate documents and selects the canonical one.
pub struct LicenseResolver<'a> {
    trusted: &'a VerifyingKey,
}

impl<'a> LicenseResolver<'a> {
    /// `trusted` is the key the stored copies were signed with.
    pub fn new(trusted: &'a VerifyingKey) -> Self {
        Self { trusted }
    }

    /// Reads and verifies every store, in order.
    pub fn gather(&self, stores: &[Box<dyn LicenseStore>]) -> Gathered {
        let mut gathered = Gathered::default();
        for store in stores {
            match store.read() {
                Ok(Some(bytes)) => match LicenseDocument::open(&bytes, self.trusted) {
                    Ok(document) => gathered.push_candidate(store.name(), document),
                    Err(e) => gathered.push_note(store.name(), e.to_string()),
                },
                Ok(None) => gathered.push_note(store.name(), "no license stored"),
                Err(e) => gathered.push_note(store.name(), e.to_string()),
            }
        }
        gathered
    }

    /// Resolves the canonical document. A document from the caller's
    /// session cache, when given, is considered first.
    pub fn resolve(
        &self,
        cached: Option<&LicenseDocument>,
        stores: &[Box<dyn LicenseStore>],
    ) -> LicenseResult<Candidate> {
        let mut gathered = Gathered::default();
        if let Some(document) = cached {
            gathered.push_candidate(CACHE_SOURCE, document.clone());
        }
        let from_stores = self.gather(stores);
        gathered.candidates.extend(from_stores.candidates);
        gathered.notes.extend(from_stores.notes);
        select(gathered)
    }
}

/// Selects the canonical candidate.
pub fn select(gathered: Gathered) -> LicenseResult<Candidate> {
    let Gathered {
        mut candidates,
        notes,
    } = gathered;

    if candidates.is_empty() {
        let detail = if notes.is_empty() {
            "no license sources are configured".to_string()
        } else {
            notes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        };
        return Err(LicenseError::NoCandidateFound(detail));
    }

    let mut current = 0;
    let mut newest_wins = false;
    for i in 1..candidates.len() {
        let (best, next) = (&candidates[current].document, &candidates[i].document);
        if !newest_wins && !best.same_issuance(next) {
            newest_wins = true;
            debug!(
                source = %candidates[i].source,
                "divergent license copies, newest modification wins from here on"
            );
        }
        let better = if newest_wins {
            next.modified_at > best.modified_at
        } else {
            next.statistics.hit_count > best.statistics.hit_count
        };
        if better {
            current = i;
        }
    }

    let chosen = candidates.swap_remove(current);
    debug!(source = %chosen.source, uid = %chosen.document.uid, "canonical license selected");
    Ok(chosen)
}
