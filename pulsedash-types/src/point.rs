//! A single metric sample as produced by the metrics backend.

use alloc::string::String;

/// One sample of one metric type.
///
/// The wire format is `{"timestamp": "...", "value": 12.5, "type": "cpu"}`.
/// A `null` value is accepted and read as `NaN` so that it reaches the
/// reconciler, which turns it into a "no data" slot.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricPoint {
    /// ISO-8601 timestamp of the sample.
    pub timestamp: String,

    /// Sampled value. May be non-finite on the wire.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "nullable_f64"))]
    pub value: f64,

    /// Metric channel this sample belongs to (e.g. "cpu").
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub metric_type: String,
}

impl MetricPoint {
    /// Create a new point.
    pub fn new(timestamp: impl Into<String>, value: f64, metric_type: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            value,
            metric_type: metric_type.into(),
        }
    }

    /// Returns true if this point was produced for the given metric type.
    pub fn is_type(&self, metric_type: &str) -> bool {
        self.metric_type == metric_type
    }

    /// The value, or `None` when it is not a finite number.
    pub fn finite_value(&self) -> Option<f64> {
        self.value.is_finite().then_some(self.value)
    }
}

#[cfg(feature = "serde")]
fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_value_filters_nan_and_infinity() {
        assert_eq!(MetricPoint::new("t", 1.5, "cpu").finite_value(), Some(1.5));
        assert_eq!(MetricPoint::new("t", f64::NAN, "cpu").finite_value(), None);
        assert_eq!(MetricPoint::new("t", f64::INFINITY, "cpu").finite_value(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_wire_format() {
        let json = r#"{"timestamp":"2024-05-01T10:00:00Z","value":50,"type":"cpu"}"#;
        let point: MetricPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.timestamp, "2024-05-01T10:00:00Z");
        assert_eq!(point.value, 50.0);
        assert!(point.is_type("cpu"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn null_value_reads_as_nan() {
        let json = r#"{"timestamp":"2024-05-01T10:00:00Z","value":null,"type":"memory"}"#;
        let point: MetricPoint = serde_json::from_str(json).unwrap();
        assert!(point.value.is_nan());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_type_is_rejected() {
        let json = r#"{"timestamp":"2024-05-01T10:00:00Z","value":1}"#;
        assert!(serde_json::from_str::<MetricPoint>(json).is_err());
    }
}
