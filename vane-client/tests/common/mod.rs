//! Shared test utilities for client integration tests
//!
//! Provides a lightweight mock WebSocket server speaking the event
//! envelope protocol, so client behavior can be exercised without a
//! real backend.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use vane_core::Envelope;

/// What the mock server does with one incoming envelope
pub struct ServerReply {
    frames: Vec<String>,
    disconnect: bool,
}

impl ServerReply {
    /// Send these frames and keep the connection open
    pub fn frames(frames: Vec<String>) -> Self {
        Self {
            frames,
            disconnect: false,
        }
    }

    /// Drop the connection without a closing handshake
    ///
    /// Any frames are sent first, then the socket halves are dropped,
    /// which the client observes as an abrupt connection loss.
    #[allow(dead_code)]
    pub fn disconnect(frames: Vec<String>) -> Self {
        Self {
            frames,
            disconnect: true,
        }
    }
}

/// Mock WebSocket server for client testing
///
/// Accepts connections on an ephemeral port and answers each incoming
/// envelope with whatever frames the handler returns, in order. A
/// handler returning no frames leaves the request unanswered.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: Option<mpsc::Receiver<Envelope>>,
}

impl MockWsServer {
    /// Start a mock server with a custom envelope handler
    ///
    /// The handler receives each decoded request envelope and returns
    /// the text frames to send back over the same connection.
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Envelope) -> Vec<String> + Send + Sync + 'static,
    {
        Self::with_reply_handler(move |env| ServerReply::frames(handler(env))).await
    }

    /// Start a mock server whose handler controls the connection too
    ///
    /// Like [`with_handler`](Self::with_handler), but the handler can
    /// also sever the connection after its frames are sent.
    pub async fn with_reply_handler<F>(handler: F) -> Self
    where
        F: Fn(&Envelope) -> ServerReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (msg_tx, msg_rx) = mpsc::channel::<Envelope>(100);
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                    accept_result = listener.accept() => {
                        if let Ok((stream, _)) = accept_result {
                            let msg_tx = msg_tx.clone();
                            let handler = handler.clone();

                            tokio::spawn(async move {
                                if let Ok(ws_stream) = accept_async(stream).await {
                                    let (mut write, mut read) = ws_stream.split();

                                    while let Some(Ok(msg)) = read.next().await {
                                        if let Message::Text(text) = msg {
                                            let env = match Envelope::decode(&text) {
                                                Ok(env) => env,
                                                Err(_) => continue,
                                            };
                                            // Expose to the test for verification
                                            let _ = msg_tx.send(env.clone()).await;

                                            let reply = handler(&env);
                                            for frame in reply.frames {
                                                let _ = write.send(Message::Text(frame)).await;
                                            }
                                            if reply.disconnect {
                                                // Drop both halves without a
                                                // closing handshake
                                                return;
                                            }
                                        }
                                    }
                                }
                            });
                        }
                    }
                }
            }
        });

        // Give the accept loop a moment to come up
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Self {
            addr,
            shutdown_tx,
            message_rx: Some(msg_rx),
        }
    }

    /// Server address as `host:port`, suitable for `ConnectionOptions`
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Wait for the next request envelope received by the server
    #[allow(dead_code)]
    pub async fn wait_for_request(&mut self) -> Option<Envelope> {
        if let Some(rx) = &mut self.message_rx {
            tokio::time::timeout(tokio::time::Duration::from_secs(5), rx.recv())
                .await
                .ok()
                .flatten()
        } else {
            None
        }
    }

    /// Shut down the mock server
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }
}

/// Build a response frame for the given request id
pub fn mock_response(id: u64, event: &str, data: serde_json::Value) -> String {
    serde_json::json!({
        "id": id,
        "event": event,
        "data": data,
    })
    .to_string()
}

/// Build an error frame carrying a server error body
#[allow(dead_code)]
pub fn mock_error(id: u64, http_code: u16, description: &str) -> String {
    mock_response(
        id,
        "response/error",
        serde_json::json!({
            "http_code": http_code,
            "description": description,
            "timestamp": "2024-05-01T12:00:00Z",
        }),
    )
}

/// Build an unsolicited reading frame for a device
#[allow(dead_code)]
pub fn mock_reading(id: u64, device: &str, value: i64) -> String {
    mock_response(
        id,
        "response/reading",
        serde_json::json!({
            "device": device,
            "timestamp": "2024-05-01T12:00:00Z",
            "type": "temperature",
            "device_type": "temperature",
            "value": value,
            "unit": {"name": "celsius", "symbol": "C"},
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_creation() {
        let server = MockWsServer::with_handler(|_| vec![]).await;
        assert!(server.address().starts_with("127.0.0.1:"));
        server.shutdown().await;
    }

    #[test]
    fn test_mock_response_format() {
        let frame = mock_response(1, "response/status", serde_json::json!({"status": "ok"}));
        let env = Envelope::decode(&frame).unwrap();
        assert_eq!(env.id, 1);
        assert_eq!(env.event, "response/status");
    }

    #[test]
    fn test_mock_error_format() {
        let frame = mock_error(7, 500, "boom");
        let env = Envelope::decode(&frame).unwrap();
        assert!(env.is_error());
        assert_eq!(env.data["http_code"], 500);
    }
}
