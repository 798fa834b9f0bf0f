//! Resilient stream client.
//!
//! Keeps one logical stream alive for one metric type. A background driver
//! task owns the physical connection and the reconnect timer; the client
//! handle owns the status, the retry counter and the session number that
//! ties every delivery to the `connect()` call that started it.
//!
//! ```text
//!            connect()                 open ok
//!   Idle ─────────────▶ Connecting ─────────────▶ Connected
//!     │ no credential        │ open failed            │ dropped / error
//!     ▼                      ▼                        ▼
//!   Failed ◀──── budget ─ Reconnecting ◀──────────────┘
//!                 spent     │    ▲
//!                           └────┘ wait min(base·2^(n-1), max), retry
//!
//!   disconnect() from any state ──▶ Closed
//! ```
//!
//! Every observer call happens while the client's state lock is held and only
//! if the caller's session is still current. `disconnect()` bumps the session
//! under that same lock, so once it returns nothing can reach the observer
//! from the old session, whether it was a message, a close or a timer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pulsedash_types::ConnectionStatus;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::credential::CredentialProvider;
use super::policy::ReconnectPolicy;
use super::transport::{auth_message, Connection, Connector, StreamEndpoint};
use crate::error::StreamError;

/// Receives everything a stream client reports.
///
/// Methods are called with the client's internal lock held: implementations
/// must return quickly and must not call back into the client.
pub trait StreamObserver: Send + Sync {
    fn on_status(&self, status: ConnectionStatus);

    /// Non-fatal failure notice. Status changes are reported separately.
    fn on_error(&self, error: &StreamError);

    /// Raw payload of one received message, unparsed.
    fn on_message(&self, payload: String);
}

/// Process-unique identity of a stream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Retry bookkeeping owned by one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryState {
    /// Consecutive failures since the last successful open.
    pub attempts: u32,
    /// Set by `disconnect()`, cleared by `connect()`.
    pub manual_close: bool,
}

/// Where to connect and how hard to try.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub endpoint: StreamEndpoint,
    pub policy: ReconnectPolicy,
}

struct State {
    status: ConnectionStatus,
    retry: RetryState,
    session: u64,
}

struct Shared {
    metric_type: String,
    observer: Arc<dyn StreamObserver>,
    state: Mutex<State>,
}

impl Shared {
    fn transition(&self, state: &mut State, status: ConnectionStatus) {
        if state.status != status {
            debug!(metric = %self.metric_type, from = %state.status, to = %status, "Stream status");
            state.status = status;
            self.observer.on_status(status);
        }
    }

    fn fail(&self, state: &mut State, error: StreamError) {
        warn!(metric = %self.metric_type, error = %error, "Stream failed");
        self.transition(state, ConnectionStatus::Failed);
        self.observer.on_error(&error);
    }
}

/// Stop signal for a running driver task.
struct DriverHandle {
    stop_tx: watch::Sender<bool>,
}

impl DriverHandle {
    fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}

/// One auto-recovering stream for one metric type.
///
/// `connect()` and `disconnect()` never fail: all outcomes are reported to the
/// [`StreamObserver`] given at construction.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pulsedash::stream::{
///     HandshakeMode, ReconnectPolicy, SharedCredential, StreamClient, StreamConfig,
///     StreamEndpoint, StreamObserver, WebSocketConnector,
/// };
/// use pulsedash::StreamError;
/// use pulsedash_types::ConnectionStatus;
///
/// struct Print;
///
/// impl StreamObserver for Print {
///     fn on_status(&self, status: ConnectionStatus) { println!("status: {status}"); }
///     fn on_error(&self, error: &StreamError) { eprintln!("error: {error}"); }
///     fn on_message(&self, payload: String) { println!("{payload}"); }
/// }
///
/// # tokio_test::block_on(async {
/// let endpoint = StreamEndpoint::new(
///     "ws://localhost:8000/ws/metrics".parse().unwrap(),
///     HandshakeMode::Both,
/// );
/// let config = StreamConfig { endpoint, policy: ReconnectPolicy::default() };
/// let mut client = StreamClient::new(
///     "cpu",
///     config,
///     Arc::new(WebSocketConnector::default()),
///     Arc::new(SharedCredential::new(Some("token".into()))),
///     Arc::new(Print),
/// );
/// client.connect();
/// # });
/// ```
pub struct StreamClient {
    id: ClientId,
    config: StreamConfig,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    shared: Arc<Shared>,
    driver: Option<DriverHandle>,
}

impl StreamClient {
    pub fn new(
        metric_type: impl Into<String>,
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
        observer: Arc<dyn StreamObserver>,
    ) -> Self {
        Self::with_id(
            ClientId::next(),
            metric_type,
            config,
            connector,
            credentials,
            observer,
        )
    }

    /// Build a client under an id allocated ahead of time, so the observer
    /// can tag what it forwards.
    pub(crate) fn with_id(
        id: ClientId,
        metric_type: impl Into<String>,
        config: StreamConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
        observer: Arc<dyn StreamObserver>,
    ) -> Self {
        Self {
            id,
            config,
            connector,
            credentials,
            shared: Arc::new(Shared {
                metric_type: metric_type.into(),
                observer,
                state: Mutex::new(State {
                    status: ConnectionStatus::Idle,
                    retry: RetryState::default(),
                    session: 0,
                }),
            }),
            driver: None,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn metric_type(&self) -> &str {
        &self.shared.metric_type
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    pub fn retry_state(&self) -> RetryState {
        self.shared.state.lock().retry
    }

    /// Start (or restart) the stream.
    ///
    /// A no-op while connecting or connected. From any other state this
    /// resets the retry counter, cancels a pending reconnect and starts a
    /// fresh attempt. Without a credential the client fails immediately and
    /// no connection is attempted.
    pub fn connect(&mut self) {
        let mut state = self.shared.state.lock();
        if matches!(
            state.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            return;
        }

        state.session += 1;
        state.retry = RetryState::default();
        if let Some(driver) = self.driver.take() {
            driver.stop();
        }

        if self.credentials.current().is_none() {
            self.shared.fail(&mut state, StreamError::MissingCredential);
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            self.shared.fail(&mut state, StreamError::Runtime);
            return;
        };

        self.shared.transition(&mut state, ConnectionStatus::Connecting);
        let session = state.session;
        drop(state);

        let (stop_tx, stop_rx) = watch::channel(false);
        let driver = Driver {
            session: Session {
                shared: self.shared.clone(),
                id: session,
            },
            config: self.config.clone(),
            connector: self.connector.clone(),
            credentials: self.credentials.clone(),
            stop: stop_rx,
        };
        runtime.spawn(driver.run());
        self.driver = Some(DriverHandle { stop_tx });
    }

    /// Stop the stream for good (until the next `connect()`).
    ///
    /// Cancels any pending reconnect, detaches the observer from the running
    /// session, closes the transport and reports `Closed`. Idempotent.
    pub fn disconnect(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.session += 1;
            state.retry.manual_close = true;
            self.shared.transition(&mut state, ConnectionStatus::Closed);
        }
        if let Some(driver) = self.driver.take() {
            driver.stop();
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.shared.state.lock().session += 1;
        if let Some(driver) = self.driver.take() {
            driver.stop();
        }
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("StreamClient")
            .field("id", &self.id)
            .field("metric_type", &self.shared.metric_type)
            .field("status", &state.status)
            .field("retry", &state.retry)
            .finish()
    }
}

/// What the driver should do after a connection ends.
enum Next {
    Retry(std::time::Duration),
    Stop,
}

/// A driver's view of the client state, valid for one `connect()` call.
struct Session {
    shared: Arc<Shared>,
    id: u64,
}

impl Session {
    /// Run `f` against the state if this session is still current.
    fn with_current<R>(&self, f: impl FnOnce(&Shared, &mut State) -> R) -> Option<R> {
        let mut state = self.shared.state.lock();
        if state.session != self.id {
            return None;
        }
        Some(f(&self.shared, &mut state))
    }

    fn opened(&self) -> bool {
        self.with_current(|shared, state| {
            state.retry.attempts = 0;
            shared.transition(state, ConnectionStatus::Connected);
        })
        .is_some()
    }

    fn message(&self, payload: String) -> bool {
        self.with_current(|shared, _| shared.observer.on_message(payload))
            .is_some()
    }

    fn error(&self, error: &StreamError) -> bool {
        self.with_current(|shared, _| shared.observer.on_error(error))
            .is_some()
    }

    fn fail(&self, error: StreamError) {
        self.with_current(|shared, state| shared.fail(state, error));
    }

    /// Count one more consecutive failure and decide whether to retry.
    fn connection_lost(&self, policy: &ReconnectPolicy) -> Next {
        self.with_current(|shared, state| {
            if state.retry.manual_close {
                return Next::Stop;
            }
            if !policy.should_retry(state.retry.attempts) {
                let attempts = state.retry.attempts;
                shared.fail(state, StreamError::RetriesExhausted { attempts });
                return Next::Stop;
            }
            state.retry.attempts += 1;
            shared.transition(state, ConnectionStatus::Reconnecting);
            Next::Retry(policy.delay(state.retry.attempts))
        })
        .unwrap_or(Next::Stop)
    }
}

/// How a served connection ended.
enum Served {
    /// Closed or failed from the transport side.
    Dropped,
    /// Superseded or stopped by the caller.
    Stopped,
}

/// Background task owning the physical connection and the reconnect timer.
struct Driver {
    session: Session,
    config: StreamConfig,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialProvider>,
    stop: watch::Receiver<bool>,
}

impl Driver {
    async fn run(mut self) {
        let metric = self.session.shared.metric_type.clone();

        loop {
            let Some(token) = self.credentials.current() else {
                self.session.fail(StreamError::MissingCredential);
                return;
            };

            let request = self.config.endpoint.request(&metric, &token);
            info!(metric = %metric, url = %request.redacted_url(), "Connecting stream");

            let opened = tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => return,
                opened = self.connector.open(&request) => opened,
            };

            match opened {
                Ok(mut connection) => {
                    if !self.session.opened() {
                        connection.close().await;
                        return;
                    }
                    info!(metric = %metric, "Stream connected");

                    let served = self.serve(connection.as_mut()).await;
                    connection.close().await;
                    if let Served::Stopped = served {
                        debug!(metric = %metric, "Stream driver stopped");
                        return;
                    }
                }
                Err(error) => {
                    warn!(metric = %metric, error = %error, "Stream open failed");
                    if !self.session.error(&error) {
                        return;
                    }
                }
            }

            let delay = match self.session.connection_lost(&self.config.policy) {
                Next::Retry(delay) => delay,
                Next::Stop => return,
            };
            info!(metric = %metric, delay_ms = delay.as_millis() as u64, "Reconnecting stream");

            tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Authenticate, then deliver messages until the connection ends.
    async fn serve(&mut self, connection: &mut dyn Connection) -> Served {
        if self.config.endpoint.handshake.sends_message() {
            // Re-read on every open so a refreshed token is used
            let Some(token) = self.credentials.current() else {
                self.session.fail(StreamError::MissingCredential);
                return Served::Stopped;
            };
            if let Err(error) = connection.send_text(auth_message(&token)).await {
                return self.dropped(error);
            }
        }

        loop {
            let frame = tokio::select! {
                biased;
                _ = stopped(&mut self.stop) => return Served::Stopped,
                frame = connection.recv_text() => frame,
            };

            match frame {
                Some(Ok(payload)) => {
                    if !self.session.message(payload) {
                        return Served::Stopped;
                    }
                }
                Some(Err(error)) => return self.dropped(error),
                None => {
                    debug!(metric = %self.session.shared.metric_type, "Stream closed by peer");
                    return Served::Dropped;
                }
            }
        }
    }

    fn dropped(&self, error: StreamError) -> Served {
        warn!(metric = %self.session.shared.metric_type, error = %error, "Stream transport error");
        if self.session.error(&error) {
            Served::Dropped
        } else {
            Served::Stopped
        }
    }
}

/// Resolves once the stop flag is raised or its sender is gone.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
