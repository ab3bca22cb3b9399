//! Counting constraint.
//!
//! The counters here gate access. They are independent of the document's
//! `Statistics`, which are reported but never enforced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::ValidationContext;
use super::Verdict;

fn unlimited() -> i64 {
    -1
}

fn first_day() -> i64 {
    1
}

/// Caps on uses, hits and distinct days. A max of zero or less is no cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLimit {
    #[serde(default = "unlimited")]
    pub max_usage: i64,
    #[serde(default = "unlimited")]
    pub max_hit: i64,
    #[serde(default = "unlimited")]
    pub max_days: i64,
    #[serde(default)]
    pub current_usage: i64,
    #[serde(default)]
    pub current_hit: i64,
    #[serde(default = "first_day")]
    pub current_days: i64,
    #[serde(default)]
    pub last_access: Option<DateTime<Utc>>,
}

impl Default for UsageLimit {
    fn default() -> Self {
        Self {
            max_usage: unlimited(),
            max_hit: unlimited(),
            max_days: unlimited(),
            current_usage: 0,
            current_hit: 0,
            current_days: first_day(),
            last_access: None,
        }
    }
}

impl UsageLimit {
    #[must_use]
    pub fn new(max_usage: i64, max_hit: i64, max_days: i64) -> Self {
        Self {
            max_usage,
            max_hit,
            max_days,
            ..Self::default()
        }
    }

    /// Counts this evaluation, then checks usage, hits and days in that order.
    pub(crate) fn check(&mut self, ctx: &ValidationContext<'_>) -> Verdict {
        self.count_day(ctx);
        self.current_hit += 1;
        self.current_usage += 1;

        if exceeded(self.max_usage, self.current_usage) {
            return Verdict::Fail("The maximum number of uses has been reached.".to_string());
        }
        if exceeded(self.max_hit, self.current_hit) {
            return Verdict::Fail("The maximum number of hits has been reached.".to_string());
        }
        if exceeded(self.max_days, self.current_days) {
            return Verdict::Fail("The maximum number of days has been reached.".to_string());
        }
        Verdict::Pass
    }

    fn count_day(&mut self, ctx: &ValidationContext<'_>) {
        match self.last_access {
            None => self.last_access = Some(ctx.now),
            Some(last) if ctx.clock.local_date_of(last) != ctx.clock.local_date_of(ctx.now) => {
                self.current_days += 1;
                self.last_access = Some(ctx.now);
            }
            Some(_) => {}
        }
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("max_usage", self.max_usage.to_string()),
            ("max_hit", self.max_hit.to_string()),
            ("max_days", self.max_days.to_string()),
            ("current_usage", self.current_usage.to_string()),
            ("current_hit", self.current_hit.to_string()),
            ("current_days", self.current_days.to_string()),
        ]
    }
}

fn exceeded(max: i64, current: i64) -> bool {
    max > 0 && current > max
}
