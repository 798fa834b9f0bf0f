//! Live metric streams.
//!
//! - [`transport`]: the [`Connector`]/[`Connection`] seam and endpoint addressing
//! - [`websocket`]: the production connector over `tokio-tungstenite`
//! - [`policy`]: reconnect backoff
//! - [`credential`]: where the auth token comes from
//! - [`client`]: one self-healing stream ([`StreamClient`])
//! - [`registry`]: one client per selected metric ([`StreamRegistry`])

pub mod client;
pub mod credential;
pub mod policy;
pub mod registry;
pub mod transport;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ClientId, RetryState, StreamClient, StreamConfig, StreamObserver};
pub use credential::{CredentialProvider, SharedCredential};
pub use policy::ReconnectPolicy;
pub use registry::{RegistryUpdate, StreamEvent, StreamEventKind, StreamRegistry};
pub use transport::{auth_message, Connection, Connector, HandshakeMode, OpenRequest, StreamEndpoint};
pub use websocket::WebSocketConnector;
