//! Historical metric data.
//!
//! This module provides a trait-based abstraction for fetching a metric's
//! history over a time window, an HTTP implementation for the metrics API,
//! and a background poller that refreshes, caches and deduplicates fetches.

mod http;
mod poller;

pub use http::{HttpHistorySource, HttpHistorySourceBuilder};
pub use poller::{HistoryEvent, HistoryPoller, PollerHandle};

use std::fmt::{self, Debug};

use async_trait::async_trait;
use pulsedash_types::MetricPoint;

use crate::data::{MetricKind, RangeBounds};
use crate::error::FetchError;

/// One history request: a metric over a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryQuery {
    pub metric: MetricKind,
    pub bounds: RangeBounds,
}

impl HistoryQuery {
    pub fn new(metric: MetricKind, bounds: RangeBounds) -> Self {
        Self { metric, bounds }
    }
}

impl fmt::Display for HistoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} .. {}]",
            self.metric,
            self.bounds.from_param(),
            self.bounds.to_param()
        )
    }
}

/// Trait for fetching metric history from various backends.
///
/// # Example
///
/// ```no_run
/// use chrono::Utc;
/// use pulsedash::data::{MetricKind, TimeRange};
/// use pulsedash::source::{HistoryQuery, HistorySource, HttpHistorySource};
///
/// # tokio_test::block_on(async {
/// let source = HttpHistorySource::builder()
///     .endpoint("http://localhost:8000")
///     .build()
///     .unwrap();
/// let query = HistoryQuery::new(MetricKind::Cpu, TimeRange::default().bounds(Utc::now()));
/// let points = source.fetch(&query).await.unwrap();
/// println!("Got {} points", points.len());
/// # });
/// ```
#[async_trait]
pub trait HistorySource: Send + Sync + Debug {
    /// Fetch every point of `query.metric` inside `query.bounds`.
    ///
    /// Points are returned in the order the backend produced them.
    async fn fetch(&self, query: &HistoryQuery) -> Result<Vec<MetricPoint>, FetchError>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;
}
