//! Fixed reporting windows for dashboard statistics.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use hvacmon_types::Reading;

/// Reporting window ending at "now".
///
/// The windows are fixed calendar-free durations: 7, 30 and 365 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// Last 365 days.
    Year,
    /// No time filtering.
    All,
}

impl Period {
    /// The inclusive lower bound of the window relative to `now`, or
    /// `None` for [`Period::All`].
    pub fn cutoff(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let days = match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 365,
            Period::All => return None,
        };
        Some(now - Duration::days(days))
    }

    /// Parse the query-string form used by the API.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "week" => Some(Period::Week),
            "month" => Some(Period::Month),
            "year" => Some(Period::Year),
            "all" => Some(Period::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::All => "all",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retain the readings recorded within the window ending at `now`.
///
/// The cutoff is inclusive; [`Period::All`] returns the input unchanged.
pub fn filter_by_period(readings: &[Reading], period: Period, now: OffsetDateTime) -> Vec<Reading> {
    match period.cutoff(now) {
        None => readings.to_vec(),
        Some(cutoff) => readings
            .iter()
            .filter(|r| r.recorded_at >= cutoff)
            .cloned()
            .collect(),
    }
}
