//! WebSocket transport built on tokio-tungstenite.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::transport::{Connection, Connector, OpenRequest};
use crate::error::StreamError;

/// Default time allowed for the TCP + WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens WebSocket connections.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, request: &OpenRequest) -> Result<Box<dyn Connection>, StreamError> {
        debug!(url = %request.redacted_url(), "Opening WebSocket");

        let (stream, _response) =
            tokio::time::timeout(self.connect_timeout, connect_async(request.url.as_str()))
                .await
                .map_err(|_| StreamError::Transport("connect timed out".to_string()))?
                .map_err(|e| StreamError::Transport(e.to_string()))?;

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| StreamError::Transport(e.to_string()))
    }

    async fn recv_text(&mut self) -> Option<Result<String, StreamError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Peer closed WebSocket");
                    return None;
                }
                // Ping/pong replies are handled by tungstenite
                Ok(_) => continue,
                Err(e) => return Some(Err(StreamError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use url::Url;

    use super::*;
    use crate::stream::transport::{auth_message, HandshakeMode, StreamEndpoint};

    fn endpoint(url: &str) -> StreamEndpoint {
        StreamEndpoint::new(Url::parse(url).unwrap(), HandshakeMode::Both)
    }

    #[tokio::test]
    async fn wss_reaches_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // Plain HTTP where a TLS server hello is expected
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
            }
        });

        let request = endpoint(&format!("wss://127.0.0.1:{port}/ws/metrics")).request("cpu", "abc");
        let result = WebSocketConnector::new(Duration::from_secs(2)).open(&request).await;

        match result {
            Ok(_) => panic!("handshake against a plain socket should fail"),
            Err(StreamError::Transport(message)) => {
                assert!(!message.contains("TLS support not compiled in"), "{message}");
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn ws_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            let auth = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text(r#"{"value":1.5}"#.to_string())).await.unwrap();
            ws.close(None).await.unwrap();
            auth
        });

        let request = endpoint(&format!("ws://127.0.0.1:{port}/ws/metrics")).request("cpu", "abc");
        let mut connection = match WebSocketConnector::new(Duration::from_secs(2)).open(&request).await {
            Ok(connection) => connection,
            Err(e) => panic!("open failed: {e}"),
        };

        connection.send_text(auth_message("abc")).await.unwrap();
        let text = connection.recv_text().await.unwrap().unwrap();
        assert_eq!(text, r#"{"value":1.5}"#);
        assert!(connection.recv_text().await.is_none());

        let auth = server.await.unwrap();
        assert_eq!(auth, Message::Text(auth_message("abc")));
    }
}
