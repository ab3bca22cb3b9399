//! Document-level usage statistics.
//!
//! These counters are telemetry: they are updated once per persisted,
//! successful validation and reported to callers, but they never gate
//! access. Gating counters live on `Usage` constraint nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_types::Clock;

/// Usage counters embedded in a license document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub last_accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default)]
    pub hit_count: u64,
    #[serde(default)]
    pub days_count: u64,
    #[serde(default)]
    pub usage_count: u64,
}

impl Statistics {
    /// Records one successful validation.
    ///
    /// Days are counted at most once per calendar date; the other counters
    /// always increase by one.
    pub fn record_access(&mut self, clock: &dyn Clock) {
        let now = clock.now();
        let new_day = match self.last_accessed {
            Some(last) => clock.local_date_of(last) != clock.local_date_of(now),
            None => true,
        };
        if new_day {
            self.days_count += 1;
        }
        self.access_count += 1;
        self.usage_count += 1;
        self.hit_count += 1;
        self.last_accessed = Some(now);
    }

    /// Whether `now` is earlier than the last recorded access.
    #[must_use]
    pub fn is_rolled_back(&self, now: DateTime<Utc>) -> bool {
        self.last_accessed.is_some_and(|last| last > now)
    }

    /// Zeroes every counter and forgets the last access.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
