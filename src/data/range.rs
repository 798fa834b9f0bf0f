//! Time windows for history queries.

use std::fmt;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;

/// How far back the charts look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [
        TimeRange::FiveMinutes,
        TimeRange::FifteenMinutes,
        TimeRange::SixtyMinutes,
    ];

    pub fn minutes(&self) -> i64 {
        match self {
            TimeRange::FiveMinutes => 5,
            TimeRange::FifteenMinutes => 15,
            TimeRange::SixtyMinutes => 60,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::FiveMinutes => "5m",
            TimeRange::FifteenMinutes => "15m",
            TimeRange::SixtyMinutes => "60m",
        }
    }

    /// Cycle to the next (wider) range.
    pub fn next(self) -> Self {
        match self {
            TimeRange::FiveMinutes => TimeRange::FifteenMinutes,
            TimeRange::FifteenMinutes => TimeRange::SixtyMinutes,
            TimeRange::SixtyMinutes => TimeRange::FiveMinutes,
        }
    }

    /// Cycle to the previous (narrower) range.
    pub fn prev(self) -> Self {
        match self {
            TimeRange::FiveMinutes => TimeRange::SixtyMinutes,
            TimeRange::FifteenMinutes => TimeRange::FiveMinutes,
            TimeRange::SixtyMinutes => TimeRange::FifteenMinutes,
        }
    }

    /// The window ending at `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> RangeBounds {
        RangeBounds {
            from: now - Duration::minutes(self.minutes()),
            to: now,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A concrete `[from, to]` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeBounds {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl RangeBounds {
    /// `from` as sent in query strings (millisecond precision, `Z` suffix).
    pub fn from_param(&self) -> String {
        self.from.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// `to` as sent in query strings.
    pub fn to_param(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let bounds = TimeRange::FifteenMinutes.bounds(now);

        assert_eq!(bounds.to, now);
        assert_eq!(bounds.from_param(), "2024-05-01T11:45:00.000Z");
        assert_eq!(bounds.to_param(), "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn test_cycle() {
        let mut range = TimeRange::default();
        assert_eq!(range, TimeRange::FiveMinutes);
        for _ in 0..TimeRange::ALL.len() {
            range = range.next();
        }
        assert_eq!(range, TimeRange::FiveMinutes);
        assert_eq!(TimeRange::FiveMinutes.prev(), TimeRange::SixtyMinutes);
    }

    #[test]
    fn test_deserialize_label() {
        #[derive(Deserialize)]
        struct Wrapper {
            range: TimeRange,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"range":"60m"}"#).unwrap();
        assert_eq!(parsed.range, TimeRange::SixtyMinutes);
    }
}
