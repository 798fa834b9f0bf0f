//! In-memory transport and observer used by the stream tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pulsedash_types::ConnectionStatus;
use tokio::sync::mpsc;

use super::client::StreamObserver;
use super::transport::{Connection, Connector, OpenRequest};
use crate::error::StreamError;

/// What the next `open()` call does.
enum Script {
    Refuse(String),
    Accept(ScriptedConnection),
}

/// Connector that replays a queue of scripted outcomes and records requests.
///
/// Once the queue is empty every open is refused.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    requests: Arc<Mutex<Vec<OpenRequest>>>,
}

impl std::fmt::Debug for ScriptedConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedConnector")
            .field("queued", &self.scripts.lock().len())
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a refused open.
    pub fn refuse(&self, reason: &str) {
        self.scripts.lock().push_back(Script::Refuse(reason.to_string()));
    }

    /// Queue a successful open and return the server side of it.
    pub fn accept(&self) -> RemoteEnd {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let remote = RemoteEnd {
            frames: frames_tx,
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(false)),
        };
        let connection = ScriptedConnection {
            frames: frames_rx,
            sent: remote.sent.clone(),
            closed: remote.closed.clone(),
        };
        self.scripts.lock().push_back(Script::Accept(connection));
        remote
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<OpenRequest> {
        self.requests.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, request: &OpenRequest) -> Result<Box<dyn Connection>, StreamError> {
        self.requests.lock().push(request.clone());
        let next = self.scripts.lock().pop_front();
        match next {
            Some(Script::Accept(connection)) => Ok(Box::new(connection)),
            Some(Script::Refuse(reason)) => Err(StreamError::Transport(reason)),
            None => Err(StreamError::Transport("connection refused".to_string())),
        }
    }
}

/// Server side of a scripted connection.
#[derive(Clone)]
pub struct RemoteEnd {
    frames: mpsc::UnboundedSender<Option<Result<String, StreamError>>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

impl RemoteEnd {
    /// Push a text frame to the client.
    pub fn push(&self, text: &str) {
        let _ = self.frames.send(Some(Ok(text.to_string())));
    }

    /// Fail the connection with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.frames.send(Some(Err(StreamError::Transport(reason.to_string()))));
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        let _ = self.frames.send(None);
    }

    /// Messages the client sent over this connection.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Whether the client closed this connection.
    pub fn was_closed(&self) -> bool {
        *self.closed.lock()
    }
}

struct ScriptedConnection {
    frames: mpsc::UnboundedReceiver<Option<Result<String, StreamError>>>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.sent.lock().push(text);
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, StreamError>> {
        // A dropped remote end reads as a hang-up
        self.frames.recv().await.flatten()
    }

    async fn close(&mut self) {
        *self.closed.lock() = true;
    }
}

/// Everything an observer was told, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Status(ConnectionStatus),
    Error(StreamError),
    Message(String),
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().clone()
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<StreamError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Observed::Message(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl StreamObserver for RecordingObserver {
    fn on_status(&self, status: ConnectionStatus) {
        self.events.lock().push(Observed::Status(status));
    }

    fn on_error(&self, error: &StreamError) {
        self.events.lock().push(Observed::Error(error.clone()));
    }

    fn on_message(&self, payload: String) {
        self.events.lock().push(Observed::Message(payload));
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time by `duration` and let tasks react.
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}
