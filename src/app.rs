//! Application state: selection, time range, per-metric panels and toasts.
//!
//! The app owns the [`StreamRegistry`] and the history [`PollerHandle`] and
//! folds their results into one [`MetricPanel`] per selected metric. Call
//! [`App::tick`] from the UI loop to apply whatever arrived since the last
//! frame.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pulsedash_types::{ConnectionStatus, MergedSeries, MetricPoint};
use tracing::{debug, info};

use crate::data::reconcile::merge;
use crate::data::{MetricKind, RangeBounds, Selection, TimeRange};
use crate::error::StreamError;
use crate::source::{HistoryEvent, HistoryQuery, PollerHandle};
use crate::stream::{RegistryUpdate, SharedCredential, StreamRegistry};
use crate::ui::Theme;

/// How long a toast stays on screen.
pub const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

/// A transient notice.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    created: Instant,
}

/// Toasts in arrival order, each expiring after a fixed time.
#[derive(Debug)]
pub struct Toasts {
    ttl: Duration,
    items: VecDeque<Toast>,
}

impl Default for Toasts {
    fn default() -> Self {
        Self::new(TOAST_TTL)
    }
}

impl Toasts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            items: VecDeque::new(),
        }
    }

    pub fn push_at(&mut self, message: impl Into<String>, level: ToastLevel, now: Instant) {
        self.items.push_back(Toast {
            message: message.into(),
            level,
            created: now,
        });
    }

    /// Drop toasts that have expired by `now`.
    pub fn prune_at(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.items
            .retain(|toast| now.saturating_duration_since(toast.created) < ttl);
    }

    /// Toasts still visible at `now`, oldest first.
    pub fn active_at(&self, now: Instant) -> impl Iterator<Item = &Toast> {
        let ttl = self.ttl;
        self.items
            .iter()
            .filter(move |toast| now.saturating_duration_since(toast.created) < ttl)
    }
}

/// Everything shown for one metric.
#[derive(Debug, Clone)]
pub struct MetricPanel {
    pub metric: MetricKind,
    /// Last history received for the current window.
    pub polled: Vec<MetricPoint>,
    /// History merged with the latest live point.
    pub series: MergedSeries,
    /// A history fetch for the current window is outstanding.
    pub loading: bool,
}

impl MetricPanel {
    fn new(metric: MetricKind) -> Self {
        Self {
            metric,
            polled: Vec::new(),
            series: MergedSeries {
                metric_type: metric.as_str().to_string(),
                points: Vec::new(),
            },
            loading: true,
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    pub selection: Selection,
    pub range: TimeRange,
    bounds: RangeBounds,

    registry: StreamRegistry,
    poller: PollerHandle,
    credential: SharedCredential,
    source_description: String,

    panels: BTreeMap<MetricKind, MetricPanel>,
    pub last_updated: Option<DateTime<Utc>>,

    // UI
    pub theme: Theme,
    toasts: Toasts,
}

impl App {
    /// Create the app and start streaming and polling for `selection`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        registry: StreamRegistry,
        poller: PollerHandle,
        credential: SharedCredential,
        selection: Selection,
        range: TimeRange,
        source_description: impl Into<String>,
    ) -> Self {
        let mut app = Self {
            running: true,
            show_help: false,
            bounds: range.bounds(Utc::now()),
            selection,
            range,
            registry,
            poller,
            credential,
            source_description: source_description.into(),
            panels: BTreeMap::new(),
            last_updated: None,
            theme: Theme::auto_detect(),
            toasts: Toasts::default(),
        };
        app.selection_changed();
        app
    }

    /// Returns a description of the history source.
    pub fn source_description(&self) -> &str {
        &self.source_description
    }

    /// Show a transient notice.
    pub fn toast(&mut self, message: impl Into<String>, level: ToastLevel) {
        let message = message.into();
        debug!(message = %message, "Toast");
        self.toasts.push_at(message, level, Instant::now());
    }

    /// Toasts that have not expired yet.
    pub fn active_toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.active_at(Instant::now())
    }

    /// Apply everything the streams and the poller produced since last call.
    pub fn tick(&mut self) {
        for update in self.registry.drain() {
            self.apply_stream_update(update);
        }
        for event in self.poller.drain() {
            self.apply_history(event);
        }
        self.toasts.prune_at(Instant::now());
    }

    fn apply_stream_update(&mut self, update: RegistryUpdate) {
        match update {
            RegistryUpdate::Status { metric, status } => {
                debug!(metric = %metric, status = %status, "Stream status changed");
            }
            RegistryUpdate::Error { metric, error } => {
                let level = match error {
                    StreamError::Transport(_) => ToastLevel::Warning,
                    _ => ToastLevel::Error,
                };
                self.toast(format!("{} live stream: {}", metric.label(), error), level);
            }
            RegistryUpdate::Point { metric } => {
                self.last_updated = Some(Utc::now());
                self.rebuild(metric);
            }
            RegistryUpdate::Rejected { metric, error } => {
                self.toast(
                    format!("Dropped {} update: {}", metric.label(), error),
                    ToastLevel::Warning,
                );
            }
        }
    }

    fn apply_history(&mut self, event: HistoryEvent) {
        let query = event.query();
        if query.bounds != self.bounds || !self.panels.contains_key(&query.metric) {
            debug!(query = %query, "Ignoring history for a window no longer shown");
            return;
        }

        match event {
            HistoryEvent::Loaded { query, points } => {
                if let Some(panel) = self.panels.get_mut(&query.metric) {
                    panel.polled = points;
                    panel.loading = false;
                }
                self.last_updated = Some(Utc::now());
                self.rebuild(query.metric);
            }
            HistoryEvent::Failed { query, error } => {
                if let Some(panel) = self.panels.get_mut(&query.metric) {
                    panel.loading = false;
                }
                self.toast(
                    format!("Failed to load {} history: {}", query.metric.label(), error),
                    ToastLevel::Error,
                );
            }
        }
    }

    fn rebuild(&mut self, metric: MetricKind) {
        let live = self.registry.latest(metric);
        if let Some(panel) = self.panels.get_mut(&metric) {
            panel.series = merge(metric.as_str(), &panel.polled, live);
        }
    }

    fn queries(&self) -> Vec<HistoryQuery> {
        self.selection
            .iter()
            .map(|metric| HistoryQuery::new(metric, self.bounds))
            .collect()
    }

    fn selection_changed(&mut self) {
        self.registry.sync(&self.selection);
        self.panels.retain(|metric, _| self.selection.contains(*metric));
        for metric in self.selection.iter() {
            self.panels
                .entry(metric)
                .or_insert_with(|| MetricPanel::new(metric));
        }
        self.poller.set_queries(self.queries());
    }

    /// Recompute the window from the current time and fetch it.
    fn window_changed(&mut self) {
        self.bounds = self.range.bounds(Utc::now());
        for panel in self.panels.values_mut() {
            panel.loading = true;
        }
        self.poller.set_queries(self.queries());
    }

    /// Add or remove a metric. The last selected metric cannot be removed.
    pub fn toggle_metric(&mut self, metric: MetricKind) {
        if !self.selection.toggle(metric) {
            self.toast("At least one metric must stay selected", ToastLevel::Info);
            return;
        }
        info!(metric = %metric, selected = self.selection.contains(metric), "Selection changed");
        self.selection_changed();
    }

    pub fn next_range(&mut self) {
        self.set_range(self.range.next());
    }

    pub fn prev_range(&mut self) {
        self.set_range(self.range.prev());
    }

    pub fn set_range(&mut self, range: TimeRange) {
        self.range = range;
        self.window_changed();
    }

    /// Move the window to now and refetch everything.
    pub fn refresh(&mut self) {
        self.window_changed();
        self.poller.refresh();
        self.toast("Refreshing history", ToastLevel::Info);
    }

    /// Restart every stream that gave up.
    pub fn reconnect_failed(&mut self) {
        match self.registry.reconnect_failed() {
            0 => self.toast("No failed streams", ToastLevel::Info),
            1 => self.toast("Reconnecting 1 stream", ToastLevel::Info),
            n => self.toast(format!("Reconnecting {} streams", n), ToastLevel::Info),
        }
    }

    /// Forget the credential. Running streams fail on their next attempt.
    pub fn clear_credential(&mut self) {
        self.credential.clear();
        self.toast("Credential cleared", ToastLevel::Warning);
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_present()
    }

    /// Panels in display order.
    pub fn panels(&self) -> impl Iterator<Item = &MetricPanel> {
        self.panels.values()
    }

    pub fn panel(&self, metric: MetricKind) -> Option<&MetricPanel> {
        self.panels.get(&metric)
    }

    pub fn status(&self, metric: MetricKind) -> ConnectionStatus {
        self.registry.status(metric).unwrap_or_default()
    }

    pub fn latest_point(&self, metric: MetricKind) -> Option<&MetricPoint> {
        self.registry.latest(metric)
    }

    pub fn bounds(&self) -> RangeBounds {
        self.bounds
    }

    pub fn any_reconnecting(&self) -> bool {
        self.registry.any_reconnecting()
    }

    pub fn any_loading(&self) -> bool {
        self.panels.values().any(|panel| panel.loading)
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Stop streams and polling, and leave the main loop.
    pub fn quit(&mut self) {
        self.running = false;
        self.registry.shutdown();
        self.poller.stop();
    }
}
