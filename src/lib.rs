//! # pulsedash
//!
//! A terminal dashboard and library for live operational metrics.
//!
//! Each selected metric gets a self-healing WebSocket stream that pushes the
//! newest point, and a background poller that fetches the metric's history
//! over the chosen time window. The two are reconciled into one series per
//! metric and rendered as charts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Application                          │
//! │  ┌─────────┐    ┌───────────┐    ┌──────────┐    ┌─────────┐ │
//! │  │  app    │───▶│   data    │───▶│    ui    │───▶│Terminal │ │
//! │  │ (state) │    │(reconcile)│    │(rendering)    │         │ │
//! │  └──┬───┬──┘    └───────────┘    └──────────┘    └─────────┘ │
//! │     │   │                                                    │
//! │     ▼   ▼                                                    │
//! │  ┌──────┐ ┌────────┐                                         │
//! │  │stream│ │ source │◀── HttpHistorySource (HistorySource)    │
//! │  │(push)│ │ (poll) │                                         │
//! │  └──┬───┘ └────────┘                                         │
//! │     └──── StreamRegistry ─▶ StreamClient ─▶ WebSocketConnector│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`stream`]**: [`StreamClient`] keeps one authenticated connection
//!   alive with capped exponential backoff; [`StreamRegistry`] keeps exactly
//!   one client per selected metric
//! - **[`source`]**: the [`HistorySource`] trait, its HTTP implementation and
//!   the [`HistoryPoller`] that caches and deduplicates fetches
//! - **[`data`]**: metric kinds, time ranges, payload parsing and the
//!   stream/poll reconciler
//! - **[`app`]**: dashboard state; folds stream and history results into
//!   per-metric panels
//! - **[`ui`]**: ratatui rendering with light/dark theme support
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! pulsedash --ws-url ws://localhost:8000/ws/metrics --token "$TOKEN"
//! pulsedash --metrics cpu,network --range 15m
//! ```
//!
//! ### Streaming a single metric
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use pulsedash::stream::{
//!     HandshakeMode, ReconnectPolicy, SharedCredential, StreamClient, StreamConfig,
//!     StreamEndpoint, StreamObserver, WebSocketConnector,
//! };
//! use pulsedash::{ConnectionStatus, StreamError};
//!
//! struct Print;
//!
//! impl StreamObserver for Print {
//!     fn on_status(&self, status: ConnectionStatus) {
//!         println!("status: {status}");
//!     }
//!     fn on_error(&self, error: &StreamError) {
//!         println!("error: {error}");
//!     }
//!     fn on_message(&self, message: String) {
//!         println!("{message}");
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let config = StreamConfig {
//!     endpoint: StreamEndpoint::new(
//!         "ws://localhost:8000/ws/metrics".parse().unwrap(),
//!         HandshakeMode::Both,
//!     ),
//!     policy: ReconnectPolicy::default(),
//! };
//! let mut client = StreamClient::new(
//!     "cpu",
//!     config,
//!     Arc::new(WebSocketConnector::default()),
//!     Arc::new(SharedCredential::new(Some("token".into()))),
//!     Arc::new(Print),
//! );
//! client.connect();
//! # });
//! ```
//!
//! ### Reconciling history with a live point
//!
//! ```
//! use pulsedash::data::reconcile::merge;
//! use pulsedash::MetricPoint;
//!
//! let polled = vec![
//!     MetricPoint::new("2024-01-01T00:00:00Z", 1.0, "cpu"),
//!     MetricPoint::new("2024-01-01T00:00:05Z", 2.0, "cpu"),
//! ];
//! let live = MetricPoint::new("2024-01-01T00:00:05Z", 9.0, "cpu");
//!
//! let series = merge("cpu", &polled, Some(&live));
//! assert_eq!(series.len(), 2);
//! assert_eq!(series.latest().and_then(|p| p.value), Some(9.0));
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod logging;
pub mod source;
pub mod stream;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::Settings;
pub use data::{MetricKind, Selection, TimeRange};
pub use error::{FetchError, PayloadError, StreamError};
pub use pulsedash_types::{ChartPoint, ConnectionStatus, MergedSeries, MetricPoint};
pub use source::{HistoryPoller, HistorySource, HttpHistorySource};
pub use stream::{ReconnectPolicy, StreamClient, StreamObserver, StreamRegistry};
