//! Stream/poll reconciliation.
//!
//! Merges the polled history of one metric with the latest pushed point into
//! a single [`MergedSeries`]: unique by timestamp, ascending, with non-finite
//! values kept as "no data" slots.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use pulsedash_types::{ChartPoint, MergedSeries, MetricPoint};

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with any offset, and offset-less date-times which are
/// read as UTC.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let timestamp = timestamp.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Merge key. Parseable instants sort before raw text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SeriesKey {
    Instant(DateTime<Utc>),
    Raw(String),
}

impl SeriesKey {
    fn of(timestamp: &str) -> Self {
        match parse_timestamp(timestamp) {
            Some(instant) => SeriesKey::Instant(instant),
            None => SeriesKey::Raw(timestamp.to_string()),
        }
    }
}

/// Reconcile `polled` history with the `live` point for `metric_type`.
///
/// Later writers win on a key collision and the live point is applied last.
/// A live point of another type is ignored. Polled points are taken as the
/// history source returned them.
pub fn merge(metric_type: &str, polled: &[MetricPoint], live: Option<&MetricPoint>) -> MergedSeries {
    let mut slots: BTreeMap<SeriesKey, &MetricPoint> = BTreeMap::new();

    for point in polled {
        slots.insert(SeriesKey::of(&point.timestamp), point);
    }
    if let Some(point) = live.filter(|p| p.is_type(metric_type)) {
        slots.insert(SeriesKey::of(&point.timestamp), point);
    }

    MergedSeries {
        metric_type: metric_type.to_string(),
        points: slots.into_values().map(ChartPoint::from).collect(),
    }
}
