//! The physical connection seam.
//!
//! A [`Connector`] opens one duplex, message-oriented [`Connection`] for one
//! metric type. The stream client only ever talks to these traits, so the
//! WebSocket implementation can be swapped for an in-memory one in tests.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::error::StreamError;

/// How the credential is presented to the streaming endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeMode {
    /// Send `{"type":"auth","token":...}` as the first message after open.
    Message,
    /// Pass the token as a `token` query parameter when connecting.
    Query,
    /// Both of the above.
    #[default]
    Both,
}

impl HandshakeMode {
    pub fn sends_message(&self) -> bool {
        matches!(self, HandshakeMode::Message | HandshakeMode::Both)
    }

    pub fn uses_query(&self) -> bool {
        matches!(self, HandshakeMode::Query | HandshakeMode::Both)
    }
}

/// Base address of the streaming endpoint plus the handshake style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    pub base_url: Url,
    pub handshake: HandshakeMode,
}

impl StreamEndpoint {
    pub fn new(base_url: Url, handshake: HandshakeMode) -> Self {
        Self {
            base_url,
            handshake,
        }
    }

    /// Build the open request for one metric type.
    pub fn request(&self, metric_type: &str, token: &str) -> OpenRequest {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("type", metric_type);
            if self.handshake.uses_query() {
                query.append_pair("token", token);
            }
        }
        OpenRequest {
            metric_type: metric_type.to_string(),
            url,
        }
    }
}

/// Everything a connector needs to open one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub metric_type: String,
    pub url: Url,
}

impl OpenRequest {
    /// The URL with any token value masked, for logging.
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        let pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "token" { "***".to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        url.to_string()
    }
}

/// The authentication message sent right after a connection opens.
pub fn auth_message(token: &str) -> String {
    serde_json::json!({ "type": "auth", "token": token }).to_string()
}

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    async fn open(&self, request: &OpenRequest) -> Result<Box<dyn Connection>, StreamError>;
}

/// One open duplex connection.
#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError>;

    /// The next text message. `None` once the peer has closed the connection.
    async fn recv_text(&mut self) -> Option<Result<String, StreamError>>;

    /// Close the connection. Never fails; a broken connection is already closed.
    async fn close(&mut self);
}
