//! Background history polling.
//!
//! A [`HistoryPoller`] runs one task that watches the current set of
//! [`HistoryQuery`]s and fetches them through a [`HistorySource`]:
//!
//! - on every refresh tick, all current queries are refetched;
//! - when the query set changes, only new queries are fetched, and a result
//!   younger than the stale time is served from cache instead;
//! - a manual refresh refetches everything immediately;
//! - a query that is already in flight is never fetched twice.
//!
//! Results arrive as [`HistoryEvent`]s on the [`PollerHandle`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pulsedash_types::MetricPoint;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::{HistoryQuery, HistorySource};
use crate::error::FetchError;

/// Default time between refetches.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Default age after which a cached result is refetched on demand.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

/// Cached results older than this many stale times are evicted.
const EVICT_AFTER_STALE_TIMES: u32 = 10;

/// Outcome of one history fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEvent {
    Loaded {
        query: HistoryQuery,
        points: Vec<MetricPoint>,
    },
    Failed {
        query: HistoryQuery,
        error: FetchError,
    },
}

impl HistoryEvent {
    pub fn query(&self) -> &HistoryQuery {
        match self {
            HistoryEvent::Loaded { query, .. } | HistoryEvent::Failed { query, .. } => query,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    in_flight: bool,
    ready: Option<(Instant, Vec<MetricPoint>)>,
}

type Cache = Arc<Mutex<HashMap<HistoryQuery, Slot>>>;

/// Configures and starts history polling.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pulsedash::source::{HistoryPoller, HttpHistorySource};
///
/// #[tokio::main]
/// async fn main() {
///     let source = HttpHistorySource::builder().build().unwrap();
///     let mut handle = HistoryPoller::new(Arc::new(source))
///         .interval(Duration::from_secs(30))
///         .start();
///
///     while let Some(event) = handle.next().await {
///         println!("{:?}", event.query());
///     }
/// }
/// ```
#[derive(Debug)]
pub struct HistoryPoller {
    source: Arc<dyn HistorySource>,
    interval: Duration,
    stale_time: Duration,
}

impl HistoryPoller {
    pub fn new(source: Arc<dyn HistorySource>) -> Self {
        Self {
            source,
            interval: DEFAULT_INTERVAL,
            stale_time: DEFAULT_STALE_TIME,
        }
    }

    /// Set the refetch interval.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how long a result is served from cache.
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Start polling in a background task.
    ///
    /// Must be called inside a tokio runtime. Starts with no queries.
    pub fn start(self) -> PollerHandle {
        let (queries_tx, queries_rx) = watch::channel(Vec::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let refresh = Arc::new(Notify::new());

        let task = PollTask {
            source: self.source,
            stale_time: self.stale_time,
            cache: Arc::default(),
            events_tx,
        };
        tokio::spawn(task.run(self.interval, queries_rx, refresh.clone(), stop_rx));

        PollerHandle {
            queries_tx,
            refresh,
            stop_tx,
            events_rx,
        }
    }
}

/// Handle for steering a running poller and receiving its results.
///
/// Drop this handle to stop polling, or call `stop()` explicitly.
#[derive(Debug)]
pub struct PollerHandle {
    queries_tx: watch::Sender<Vec<HistoryQuery>>,
    refresh: Arc<Notify>,
    stop_tx: watch::Sender<bool>,
    events_rx: mpsc::UnboundedReceiver<HistoryEvent>,
}

impl PollerHandle {
    /// Replace the set of queries being polled.
    pub fn set_queries(&self, queries: Vec<HistoryQuery>) {
        self.queries_tx.send_replace(queries);
    }

    /// Refetch every current query now, bypassing the cache.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Next result, if one is ready.
    pub fn try_next(&mut self) -> Option<HistoryEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Every result that is ready, in completion order.
    pub fn drain(&mut self) -> Vec<HistoryEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Wait for the next result.
    pub async fn next(&mut self) -> Option<HistoryEvent> {
        self.events_rx.recv().await
    }

    /// Stop polling. In-flight fetches finish but their results are dropped.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PollTask {
    source: Arc<dyn HistorySource>,
    stale_time: Duration,
    cache: Cache,
    events_tx: mpsc::UnboundedSender<HistoryEvent>,
}

impl PollTask {
    async fn run(
        self,
        interval: Duration,
        mut queries_rx: watch::Receiver<Vec<HistoryQuery>>,
        refresh: Arc<Notify>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let mut current: Vec<HistoryQuery> = Vec::new();

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut stop_rx) => break,
                changed = queries_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = queries_rx.borrow_and_update().clone();
                    self.evict();
                    for query in next.iter().filter(|q| !current.contains(q)) {
                        self.poll(query, false);
                    }
                    current = next;
                }
                _ = refresh.notified() => {
                    debug!(queries = current.len(), "Manual history refresh");
                    for query in &current {
                        self.poll(query, true);
                    }
                }
                _ = ticker.tick() => {
                    for query in &current {
                        self.poll(query, true);
                    }
                }
            }
        }
        debug!("History poller stopped");
    }

    /// Fetch `query` unless it is in flight, or cached and fresh (when not forced).
    fn poll(&self, query: &HistoryQuery, force: bool) {
        let mut cache = self.cache.lock();
        let slot = cache.entry(query.clone()).or_default();
        if slot.in_flight {
            debug!(query = %query, "History fetch already in flight");
            return;
        }
        if !force {
            if let Some((fetched_at, points)) = &slot.ready {
                if fetched_at.elapsed() < self.stale_time {
                    let _ = self.events_tx.send(HistoryEvent::Loaded {
                        query: query.clone(),
                        points: points.clone(),
                    });
                    return;
                }
            }
        }
        slot.in_flight = true;
        drop(cache);

        let source = self.source.clone();
        let cache = self.cache.clone();
        let events_tx = self.events_tx.clone();
        let query = query.clone();
        tokio::spawn(async move {
            let result = source.fetch(&query).await;

            let event = {
                let mut cache = cache.lock();
                let slot = cache.entry(query.clone()).or_default();
                slot.in_flight = false;
                match result {
                    Ok(points) => {
                        slot.ready = Some((Instant::now(), points.clone()));
                        HistoryEvent::Loaded { query, points }
                    }
                    Err(error) => {
                        warn!(query = %query, error = %error, "History fetch failed");
                        HistoryEvent::Failed { query, error }
                    }
                }
            };
            let _ = events_tx.send(event);
        });
    }

    fn evict(&self) {
        let max_age = self.stale_time * EVICT_AFTER_STALE_TIMES;
        self.cache.lock().retain(|_, slot| {
            slot.in_flight
                || slot
                    .ready
                    .as_ref()
                    .is_some_and(|(fetched_at, _)| fetched_at.elapsed() < max_age)
        });
    }
}

/// Resolves once the stop flag is raised or the handle is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::data::{MetricKind, TimeRange};
    use crate::stream::testing::{advance, settle};

    /// Source answering from a script, after an optional delay.
    #[derive(Debug, Default)]
    struct FakeSource {
        delay: Duration,
        failures: Mutex<VecDeque<FetchError>>,
        calls: Mutex<Vec<HistoryQuery>>,
    }

    impl FakeSource {
        fn calls_for(&self, metric: MetricKind) -> usize {
            self.calls.lock().iter().filter(|q| q.metric == metric).count()
        }
    }

    #[async_trait]
    impl HistorySource for FakeSource {
        async fn fetch(&self, query: &HistoryQuery) -> Result<Vec<MetricPoint>, FetchError> {
            self.calls.lock().push(query.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(error) = self.failures.lock().pop_front() {
                return Err(error);
            }
            Ok(vec![MetricPoint::new(
                query.bounds.to_param(),
                1.0,
                query.metric.as_str(),
            )])
        }

        fn description(&self) -> &str {
            "fake"
        }
    }

    fn query(metric: MetricKind) -> HistoryQuery {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        HistoryQuery::new(metric, TimeRange::FiveMinutes.bounds(now))
    }

    fn start(source: &Arc<FakeSource>) -> PollerHandle {
        HistoryPoller::new(source.clone())
            .interval(Duration::from_secs(30))
            .stale_time(Duration::from_secs(30))
            .start()
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_query_is_fetched() {
        let source = Arc::new(FakeSource::default());
        let mut handle = start(&source);
        settle().await;

        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;

        let events = handle.drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            HistoryEvent::Loaded { query: q, points } => {
                assert_eq!(q, &query(MetricKind::Cpu));
                assert_eq!(points.len(), 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_refetches() {
        let source = Arc::new(FakeSource::default());
        let mut handle = start(&source);
        settle().await;
        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;

        advance(Duration::from_secs(29)).await;
        assert_eq!(source.calls_for(MetricKind::Cpu), 1);

        advance(Duration::from_secs(1)).await;
        assert_eq!(source.calls_for(MetricKind::Cpu), 2);
        assert_eq!(handle.drain().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_fetch_deduplicated() {
        let source = Arc::new(FakeSource {
            delay: Duration::from_secs(5),
            ..Default::default()
        });
        let mut handle = start(&source);
        settle().await;
        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;

        handle.refresh();
        settle().await;
        handle.refresh();
        settle().await;
        assert_eq!(source.calls_for(MetricKind::Cpu), 1);

        advance(Duration::from_secs(5)).await;
        assert_eq!(handle.drain().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_bypasses_cache() {
        let source = Arc::new(FakeSource::default());
        let mut handle = start(&source);
        settle().await;
        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;

        handle.refresh();
        settle().await;

        assert_eq!(source.calls_for(MetricKind::Cpu), 2);
        assert_eq!(handle.drain().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_result_served_from_cache() {
        let source = Arc::new(FakeSource::default());
        let mut handle = start(&source);
        settle().await;

        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;
        // Retained query is not refetched when another is added
        handle.set_queries(vec![query(MetricKind::Cpu), query(MetricKind::Memory)]);
        settle().await;
        assert_eq!(source.calls_for(MetricKind::Cpu), 1);
        assert_eq!(source.calls_for(MetricKind::Memory), 1);

        // Dropped and re-added within the stale time
        handle.set_queries(vec![query(MetricKind::Memory)]);
        settle().await;
        advance(Duration::from_secs(10)).await;
        handle.set_queries(vec![query(MetricKind::Memory), query(MetricKind::Cpu)]);
        settle().await;

        assert_eq!(source.calls_for(MetricKind::Cpu), 1);
        let events = handle.drain();
        assert_eq!(events.last().map(HistoryEvent::query), Some(&query(MetricKind::Cpu)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_result_refetched() {
        let source = Arc::new(FakeSource::default());
        let handle = HistoryPoller::new(source.clone())
            .interval(Duration::from_secs(600))
            .stale_time(Duration::from_secs(30))
            .start();
        settle().await;

        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;
        handle.set_queries(vec![query(MetricKind::Disk)]);
        settle().await;
        advance(Duration::from_secs(31)).await;
        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;

        assert_eq!(source.calls_for(MetricKind::Cpu), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reported() {
        let source = Arc::new(FakeSource::default());
        source.failures.lock().push_back(FetchError::Status(503));
        let mut handle = start(&source);
        settle().await;

        handle.set_queries(vec![query(MetricKind::Network)]);
        settle().await;

        assert_eq!(
            handle.drain(),
            vec![HistoryEvent::Failed {
                query: query(MetricKind::Network),
                error: FetchError::Status(503),
            }]
        );

        // Next tick tries again
        advance(Duration::from_secs(30)).await;
        assert!(matches!(handle.drain().as_slice(), [HistoryEvent::Loaded { .. }]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_polling() {
        let source = Arc::new(FakeSource::default());
        let handle = start(&source);
        settle().await;
        handle.set_queries(vec![query(MetricKind::Cpu)]);
        settle().await;

        handle.stop();
        settle().await;
        advance(Duration::from_secs(300)).await;

        assert_eq!(source.calls_for(MetricKind::Cpu), 1);
    }
}
