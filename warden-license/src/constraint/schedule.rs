//! Time based constraints: hours of the day, date ranges and beta periods.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::context::ValidationContext;
use super::Verdict;

fn no_duration() -> i32 {
    -1
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.to_rfc3339()).unwrap_or_default()
}

/// A range of the day in military time, `0..=2400`, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u16,
    pub end: u16,
}

impl TimeRange {
    #[must_use]
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, hhmm: u16) -> bool {
        self.start <= hhmm && hhmm <= self.end
    }
}

/// Grants access only during the listed hours.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default)]
    pub ranges: Vec<TimeRange>,
}

impl TimeWindow {
    #[must_use]
    pub fn new(ranges: impl Into<Vec<TimeRange>>) -> Self {
        Self {
            ranges: ranges.into(),
        }
    }

    pub(crate) fn check(&self, ctx: &ValidationContext<'_>) -> Verdict {
        let time = ctx.local_now.time();
        let hhmm = (time.hour() * 100 + time.minute()) as u16;
        if self.ranges.iter().any(|r| r.contains(hhmm)) {
            Verdict::Pass
        } else {
            Verdict::Fail(format!(
                "The current time of day ({hhmm:04}) is outside the licensed hours."
            ))
        }
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        let ranges = self
            .ranges
            .iter()
            .map(|r| format!("{:04}-{:04}", r.start, r.end))
            .collect::<Vec<_>>()
            .join(", ");
        vec![("ranges", ranges)]
    }
}

/// An evaluation period: optional start and end dates and an optional
/// number of days counted from first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Days from first use; `-1` for no limit.
    #[serde(default = "no_duration")]
    pub duration_days: i32,
    #[serde(default)]
    pub info_url: String,
    #[serde(default)]
    pub purchase_url: String,
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            duration_days: no_duration(),
            info_url: String::new(),
            purchase_url: String::new(),
        }
    }
}

impl DateRange {
    #[must_use]
    pub fn between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            start,
            end,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn days_from_first_use(days: i32) -> Self {
        Self {
            duration_days: days,
            ..Self::default()
        }
    }

    pub(crate) fn check(&self, ctx: &ValidationContext<'_>) -> Verdict {
        let now = ctx.now;

        if self.duration_days > 0 {
            let first_use = ctx.first_use.unwrap_or(now);
            let expires = first_use + Duration::days(i64::from(self.duration_days));
            if now > expires {
                return Verdict::Fail(self.expired());
            }
        }

        if let Some(start) = self.start
            && now < start
        {
            let mut msg = format!(
                "The license has not been activated yet. It will become active on {}.",
                start.format("%Y-%m-%d %H:%M UTC")
            );
            if !self.info_url.is_empty() {
                msg.push_str(&format!("\nMore information: {}", self.info_url));
            }
            return Verdict::Fail(msg);
        }

        if let Some(end) = self.end
            && now > end
        {
            return Verdict::Fail(self.expired());
        }

        Verdict::Pass
    }

    fn expired(&self) -> String {
        let mut msg = String::from("The license has expired.");
        if !self.purchase_url.is_empty() {
            msg.push_str(&format!("\nYou may purchase a license at: {}", self.purchase_url));
        }
        msg
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("start", format_date(self.start)),
            ("end", format_date(self.end)),
            ("duration_days", self.duration_days.to_string()),
            ("info_url", self.info_url.clone()),
            ("purchase_url", self.purchase_url.clone()),
        ]
    }
}

/// A pre-release period that ends on a fixed date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beta {
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_url: String,
}

impl Beta {
    #[must_use]
    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            end: Some(end),
            update_url: String::new(),
        }
    }

    pub(crate) fn check(&self, ctx: &ValidationContext<'_>) -> Verdict {
        match self.end {
            Some(end) if ctx.now <= end => Verdict::Pass,
            _ => {
                let mut msg = String::from("The beta period has expired.");
                if !self.update_url.is_empty() {
                    msg.push_str(&format!("\nYou may get an update at: {}", self.update_url));
                }
                Verdict::Fail(msg)
            }
        }
    }

    pub(crate) fn properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("end", format_date(self.end)),
            ("update_url", self.update_url.clone()),
        ]
    }
}
