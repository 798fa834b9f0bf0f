//! One stream client per selected metric.
//!
//! The registry is driven by set difference: [`StreamRegistry::sync`] closes
//! clients for metrics that left the selection, opens clients for metrics
//! that joined it, and leaves everything else alone. Client callbacks are
//! forwarded into a channel tagged with the client's id; the owner drains it
//! with [`StreamRegistry::drain`] and events from clients that have since
//! been replaced are dropped there.

use std::collections::BTreeMap;
use std::sync::Arc;

use pulsedash_types::{ConnectionStatus, MetricPoint};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::client::{ClientId, RetryState, StreamClient, StreamConfig, StreamObserver};
use super::credential::CredentialProvider;
use super::transport::Connector;
use crate::data::ingest::parse_point;
use crate::data::{MetricKind, Selection};
use crate::error::{PayloadError, StreamError};

/// A client callback, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub metric: MetricKind,
    pub client: ClientId,
    pub kind: StreamEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventKind {
    Status(ConnectionStatus),
    Error(StreamError),
    Message(String),
}

/// What an applied event changed.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryUpdate {
    Status {
        metric: MetricKind,
        status: ConnectionStatus,
    },
    Error {
        metric: MetricKind,
        error: StreamError,
    },
    /// A new latest point was recorded.
    Point { metric: MetricKind },
    /// A payload was dropped because it could not be parsed.
    Rejected {
        metric: MetricKind,
        error: PayloadError,
    },
}

/// Observer that forwards callbacks into the registry's channel.
struct Forwarder {
    metric: MetricKind,
    client: ClientId,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl Forwarder {
    fn forward(&self, kind: StreamEventKind) {
        let _ = self.tx.send(StreamEvent {
            metric: self.metric,
            client: self.client,
            kind,
        });
    }
}

impl StreamObserver for Forwarder {
    fn on_status(&self, status: ConnectionStatus) {
        self.forward(StreamEventKind::Status(status));
    }

    fn on_error(&self, error: &StreamError) {
        self.forward(StreamEventKind::Error(error.clone()));
    }

    fn on_message(&self, payload: String) {
        self.forward(StreamEventKind::Message(payload));
    }
}

struct Entry {
    client: StreamClient,
    status: ConnectionStatus,
    latest: Option<MetricPoint>,
}

/// Live stream clients keyed by metric.
pub struct StreamRegistry {
    config: StreamConfig,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
    events_rx: mpsc::UnboundedReceiver<StreamEvent>,
    entries: BTreeMap<MetricKind, Entry>,
}

impl StreamRegistry {
    pub fn new(
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            credentials,
            events_tx,
            events_rx,
            entries: BTreeMap::new(),
        }
    }

    /// Bring the set of live clients in line with `selection`.
    pub fn sync(&mut self, selection: &Selection) {
        let removed: Vec<MetricKind> = self
            .entries
            .keys()
            .copied()
            .filter(|metric| !selection.contains(*metric))
            .collect();

        for metric in removed {
            if let Some(mut entry) = self.entries.remove(&metric) {
                info!(metric = %metric, client = %entry.client.id(), "Closing stream");
                entry.client.disconnect();
            }
        }

        for metric in selection.iter() {
            if self.entries.contains_key(&metric) {
                continue;
            }
            let entry = self.open(metric);
            self.entries.insert(metric, entry);
        }
    }

    fn open(&self, metric: MetricKind) -> Entry {
        let id = ClientId::next();
        let observer = Arc::new(Forwarder {
            metric,
            client: id,
            tx: self.events_tx.clone(),
        });
        let mut client = StreamClient::with_id(
            id,
            metric.as_str(),
            self.config.clone(),
            self.connector.clone(),
            self.credentials.clone(),
            observer,
        );
        info!(metric = %metric, client = %id, "Opening stream");
        client.connect();

        Entry {
            status: client.status(),
            client,
            latest: None,
        }
    }

    /// Apply one event. Returns `None` when it was stale or changed nothing.
    pub fn apply(&mut self, event: StreamEvent) -> Option<RegistryUpdate> {
        let metric = event.metric;
        let Some(entry) = self.entries.get_mut(&metric) else {
            debug!(metric = %metric, client = %event.client, "Dropping event for closed stream");
            return None;
        };
        if entry.client.id() != event.client {
            debug!(metric = %metric, client = %event.client, "Dropping event from replaced client");
            return None;
        }

        match event.kind {
            StreamEventKind::Status(status) => {
                entry.status = status;
                Some(RegistryUpdate::Status { metric, status })
            }
            StreamEventKind::Error(error) => Some(RegistryUpdate::Error { metric, error }),
            StreamEventKind::Message(payload) => match parse_point(metric.as_str(), &payload) {
                Ok(Some(point)) => {
                    entry.latest = Some(point);
                    Some(RegistryUpdate::Point { metric })
                }
                Ok(None) => None,
                Err(error) => Some(RegistryUpdate::Rejected { metric, error }),
            },
        }
    }

    /// Apply every queued event, in arrival order.
    pub fn drain(&mut self) -> Vec<RegistryUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            if let Some(update) = self.apply(event) {
                updates.push(update);
            }
        }
        updates
    }

    /// Manually restart one metric's stream.
    ///
    /// Returns `false` if the metric has no client.
    pub fn reconnect(&mut self, metric: MetricKind) -> bool {
        match self.entries.get_mut(&metric) {
            Some(entry) => {
                entry.client.connect();
                true
            }
            None => false,
        }
    }

    /// Restart every stream that has given up. Returns how many were restarted.
    pub fn reconnect_failed(&mut self) -> usize {
        let mut restarted = 0;
        for (metric, entry) in self.entries.iter_mut() {
            if entry.client.status() == ConnectionStatus::Failed {
                info!(metric = %metric, "Reconnecting failed stream");
                entry.client.connect();
                restarted += 1;
            }
        }
        restarted
    }

    /// Disconnect and drop every client.
    pub fn shutdown(&mut self) {
        for (metric, mut entry) in std::mem::take(&mut self.entries) {
            debug!(metric = %metric, "Shutting down stream");
            entry.client.disconnect();
        }
    }

    pub fn metrics(&self) -> impl Iterator<Item = MetricKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last status applied for `metric`.
    pub fn status(&self, metric: MetricKind) -> Option<ConnectionStatus> {
        self.entries.get(&metric).map(|entry| entry.status)
    }

    pub fn latest(&self, metric: MetricKind) -> Option<&MetricPoint> {
        self.entries.get(&metric).and_then(|entry| entry.latest.as_ref())
    }

    pub fn client(&self, metric: MetricKind) -> Option<&StreamClient> {
        self.entries.get(&metric).map(|entry| &entry.client)
    }

    pub fn retry_state(&self, metric: MetricKind) -> Option<RetryState> {
        self.client(metric).map(StreamClient::retry_state)
    }

    /// Whether any stream is waiting to retry.
    pub fn any_reconnecting(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.status == ConnectionStatus::Reconnecting)
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::stream::credential::SharedCredential;
    use crate::stream::policy::ReconnectPolicy;
    use crate::stream::testing::{advance, settle, ScriptedConnector};
    use crate::stream::transport::{HandshakeMode, StreamEndpoint};

    fn registry(token: Option<&str>) -> (StreamRegistry, ScriptedConnector, SharedCredential) {
        let connector = ScriptedConnector::new();
        let credential = SharedCredential::new(token.map(str::to_string));
        let config = StreamConfig {
            endpoint: StreamEndpoint::new(
                Url::parse("ws://localhost:8000/ws/metrics").unwrap(),
                HandshakeMode::Both,
            ),
            policy: ReconnectPolicy::default(),
        };
        let registry = StreamRegistry::new(
            config,
            Arc::new(connector.clone()),
            Arc::new(credential.clone()),
        );
        (registry, connector, credential)
    }

    fn selection(metrics: &[MetricKind]) -> Selection {
        Selection::new(metrics.iter().copied()).unwrap()
    }

    fn opened_types(connector: &ScriptedConnector) -> Vec<String> {
        connector
            .requests()
            .into_iter()
            .map(|request| request.metric_type)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_deselect_leaves_other_client_untouched() {
        let (mut registry, connector, _credential) = registry(Some("abc"));

        registry.sync(&selection(&[MetricKind::Cpu, MetricKind::Memory]));
        settle().await;
        registry.drain();

        assert_eq!(registry.len(), 2);
        assert_eq!(connector.open_count(), 2);
        assert_eq!(registry.status(MetricKind::Cpu), Some(ConnectionStatus::Reconnecting));
        let cpu_id = registry.client(MetricKind::Cpu).unwrap().id();

        registry.sync(&selection(&[MetricKind::Cpu]));
        registry.drain();

        assert_eq!(registry.metrics().collect::<Vec<_>>(), vec![MetricKind::Cpu]);
        assert_eq!(registry.client(MetricKind::Cpu).unwrap().id(), cpu_id);
        assert_eq!(registry.retry_state(MetricKind::Cpu).unwrap().attempts, 1);
        assert_eq!(registry.status(MetricKind::Cpu), Some(ConnectionStatus::Reconnecting));

        // Only cpu retries
        advance(Duration::from_secs(1)).await;
        assert_eq!(opened_types(&connector), vec!["cpu", "memory", "cpu"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_same_selection_is_noop() {
        let (mut registry, connector, _credential) = registry(Some("abc"));
        let _cpu = connector.accept();

        let chosen = selection(&[MetricKind::Cpu]);
        registry.sync(&chosen);
        settle().await;
        let id = registry.client(MetricKind::Cpu).unwrap().id();

        registry.sync(&chosen);
        settle().await;

        assert_eq!(connector.open_count(), 1);
        assert_eq!(registry.client(MetricKind::Cpu).unwrap().id(), id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_become_latest_points() {
        let (mut registry, connector, _credential) = registry(Some("abc"));
        let remote = connector.accept();

        registry.sync(&selection(&[MetricKind::Cpu]));
        settle().await;
        registry.drain();

        remote.push(r#"{"timestamp":"2024-01-01T00:00:00Z","value":42,"type":"cpu"}"#);
        remote.push(r#"{"timestamp":"2024-01-01T00:00:01Z","value":7,"type":"memory"}"#);
        remote.push("{oops");
        settle().await;

        let updates = registry.drain();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], RegistryUpdate::Point { metric: MetricKind::Cpu });
        assert!(matches!(
            &updates[1],
            RegistryUpdate::Rejected { metric: MetricKind::Cpu, error: PayloadError::Malformed(_) }
        ));

        let latest = registry.latest(MetricKind::Cpu).unwrap();
        assert_eq!(latest.value, 42.0);
        assert_eq!(registry.status(MetricKind::Cpu), Some(ConnectionStatus::Connected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_from_replaced_client_dropped() {
        let (mut registry, connector, _credential) = registry(Some("abc"));
        let _first = connector.accept();
        let _memory = connector.accept();
        let _second = connector.accept();

        registry.sync(&selection(&[MetricKind::Cpu]));
        settle().await;
        registry.sync(&selection(&[MetricKind::Memory]));
        registry.sync(&selection(&[MetricKind::Cpu]));

        // The old cpu client's "closed" is still queued
        let updates = registry.drain();
        assert!(!updates.contains(&RegistryUpdate::Status {
            metric: MetricKind::Cpu,
            status: ConnectionStatus::Closed,
        }));
        assert_eq!(registry.status(MetricKind::Cpu), Some(ConnectionStatus::Connecting));

        settle().await;
        registry.drain();
        assert_eq!(registry.status(MetricKind::Cpu), Some(ConnectionStatus::Connected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_fails_every_stream() {
        let (mut registry, connector, credential) = registry(None);

        registry.sync(&selection(&[MetricKind::Cpu, MetricKind::Disk]));
        let updates = registry.drain();

        assert_eq!(connector.open_count(), 0);
        assert_eq!(registry.status(MetricKind::Cpu), Some(ConnectionStatus::Failed));
        assert_eq!(registry.status(MetricKind::Disk), Some(ConnectionStatus::Failed));
        assert!(updates.contains(&RegistryUpdate::Error {
            metric: MetricKind::Disk,
            error: StreamError::MissingCredential,
        }));

        credential.set("abc");
        let _cpu = connector.accept();
        let _disk = connector.accept();
        assert_eq!(registry.reconnect_failed(), 2);
        settle().await;
        registry.drain();

        assert_eq!(connector.open_count(), 2);
        assert_eq!(registry.status(MetricKind::Cpu), Some(ConnectionStatus::Connected));
        assert_eq!(registry.status(MetricKind::Disk), Some(ConnectionStatus::Connected));
        assert!(!registry.any_reconnecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reconnect_unknown_metric() {
        let (mut registry, _connector, _credential) = registry(Some("abc"));
        assert!(!registry.reconnect(MetricKind::Network));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_everything() {
        let (mut registry, connector, _credential) = registry(Some("abc"));
        let remote = connector.accept();

        registry.sync(&selection(&[MetricKind::Cpu, MetricKind::Memory]));
        settle().await;
        registry.drain();
        assert!(registry.any_reconnecting());

        registry.shutdown();
        settle().await;
        assert!(registry.is_empty());
        assert!(remote.was_closed());

        advance(Duration::from_secs(60)).await;
        assert_eq!(connector.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_everything() {
        let (mut registry, connector, _credential) = registry(Some("abc"));
        let remote = connector.accept();

        registry.sync(&selection(&[MetricKind::Network]));
        settle().await;
        drop(registry);
        settle().await;

        assert!(remote.was_closed());
    }
}
