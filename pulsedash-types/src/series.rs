//! Series shapes: what the history endpoint returns and what gets rendered.

use alloc::string::String;
use alloc::vec::Vec;

use crate::MetricPoint;

/// Response body of the historical metrics endpoint.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricSeriesResponse {
    /// Points in the requested window, usually ordered by the server.
    #[cfg_attr(feature = "serde", serde(default))]
    pub series: Vec<MetricPoint>,
}

/// A renderable slot in a merged series.
///
/// `value` is `None` for "no data": the slot keeps its place on the time
/// axis but carries nothing to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub timestamp: String,
    pub value: Option<f64>,
}

impl ChartPoint {
    /// Returns true if this slot has no drawable value.
    pub fn is_gap(&self) -> bool {
        self.value.is_none()
    }
}

impl From<&MetricPoint> for ChartPoint {
    fn from(point: &MetricPoint) -> Self {
        Self {
            timestamp: point.timestamp.clone(),
            value: point.finite_value(),
        }
    }
}

/// The ordered, timestamp-unique sequence rendered for one metric.
///
/// Built fresh on every reconciliation and never edited in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedSeries {
    pub metric_type: String,
    pub points: Vec<ChartPoint>,
}

impl MergedSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// The newest slot, whether or not it carries a value.
    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.last()
    }

    /// Iterate over slots that carry a value.
    pub fn values(&self) -> impl Iterator<Item = (&str, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|v| (p.timestamp.as_str(), v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn chart_point_from_non_finite_is_gap() {
        let point = MetricPoint::new("t1", f64::NAN, "cpu");
        assert!(ChartPoint::from(&point).is_gap());
    }

    #[test]
    fn values_skip_gaps() {
        let series = MergedSeries {
            metric_type: "cpu".into(),
            points: vec![
                ChartPoint { timestamp: "t1".into(), value: Some(1.0) },
                ChartPoint { timestamp: "t2".into(), value: None },
                ChartPoint { timestamp: "t3".into(), value: Some(3.0) },
            ],
        };
        let values: Vec<_> = series.values().collect();
        assert_eq!(values, vec![("t1", 1.0), ("t3", 3.0)]);
        assert_eq!(series.latest().unwrap().timestamp, "t3");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn response_without_series_defaults_to_empty() {
        let response: MetricSeriesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.series.is_empty());
    }
}
