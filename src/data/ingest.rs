//! Turning raw stream payloads into metric points.

use pulsedash_types::MetricPoint;

use crate::error::PayloadError;

/// Parse one pushed payload for the stream of `metric`.
///
/// Returns `Ok(None)` for a well-formed point of another metric type; those
/// are dropped without a notice. Parse and schema failures are errors.
pub fn parse_point(metric: &str, raw: &str) -> Result<Option<MetricPoint>, PayloadError> {
    let point: MetricPoint = serde_json::from_str(raw)?;
    if point.is_type(metric) {
        Ok(Some(point))
    } else {
        Ok(None)
    }
}
