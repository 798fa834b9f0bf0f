//! Metric data models and processing.
//!
//! This module turns raw stream payloads and polled history into the
//! per-metric series the dashboard renders.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "1s", "500ms")
//! - [`ingest`]: Parsing pushed payloads into [`MetricPoint`](pulsedash_types::MetricPoint)s
//! - [`metric`]: Metric kinds and the non-empty [`Selection`]
//! - [`range`]: Chart time windows ([`TimeRange`])
//! - [`reconcile`]: Merging history with the latest live point
//!
//! ## Data Flow
//!
//! ```text
//! raw payload ──▶ ingest::parse_point() ──▶ latest point per metric ─┐
//!                                                                    ├─▶ reconcile::merge() ──▶ MergedSeries
//! GET /metrics ──▶ MetricSeriesResponse ──▶ polled series ───────────┘
//! ```

pub mod duration;
pub mod ingest;
pub mod metric;
pub mod range;
pub mod reconcile;

pub use metric::{MetricKind, Selection};
pub use range::{RangeBounds, TimeRange};
